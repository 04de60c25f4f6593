//! End-to-end playbook runs against the mock diagnostic service

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::assert_ok;

use holmes_playbooks::domain::{Block, FindingSource, ResourceEvent, ResourceObject, ResourceTarget};
use holmes_playbooks::integrations::{CollectingSink, FanoutSink, KubeEvent, WebhookSink};
use holmes_playbooks::playbooks::PlaybookRegistry;

use super::support::{
    context, not_ready_node, pod_target, silent_listener, waiting_pod, FakeCluster, MockHolmes,
    Reply,
};

fn registry() -> PlaybookRegistry {
    PlaybookRegistry::with_builtins(&HashMap::new())
}

#[tokio::test]
async fn test_crash_loop_pod_end_to_end() {
    let analysis = "## Root cause\nThe app crashes on start.\n```bash\nkubectl logs api-0\n```\n\
                    Fix the config.\n## External Links\n- https://k8s.io";
    let holmes = MockHolmes::start(MockHolmes::analysis(analysis)).await;

    let previous = format!("{}panic: missing DATABASE_URL", "x".repeat(1500));
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("api-0", "prod", "CrashLoopBackOff", 7)],
        previous_logs: HashMap::from([("app".to_string(), previous)]),
        events: vec![KubeEvent::new(
            "Warning",
            "BackOff",
            "Back-off restarting failed container",
        )],
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), cluster.clone(), &sink);

    let finding = assert_ok!(
        registry()
            .trigger(
                "holmes_pod_issue",
                &pod_target("api-0", "prod"),
                &ctx,
                FindingSource::Manual
            )
            .await
    )
    .expect("finding");

    assert_eq!(finding.title, "🔍 CrashLoopBackOff - HolmesGPT: prod/api-0");
    assert_eq!(finding.aggregation_key, "HolmesGPT_prod_api-0");
    assert_eq!(finding.blocks.len(), 1);
    assert_eq!(
        finding.blocks[0],
        Block::markdown(
            "## 🤖 HolmesGPT analysis\n\n**Root cause**\nThe app crashes on start.\n\
             Fix the config.\n\n💰 Tokens: 1500 | Estimated cost: $0.0600"
        )
    );
    assert_eq!(sink.len(), 1);

    // previous instance logs of the crashing container are read first
    assert_eq!(cluster.log_requests(), vec![(Some("app".to_string()), true)]);

    let requests = holmes.requests();
    assert_eq!(requests.len(), 1);
    let (path, body) = &requests[0];
    assert_eq!(path, "/api/investigate");
    assert_eq!(body["source"], "holmes-playbooks");
    assert_eq!(body["title"], "🔍 CrashLoopBackOff - HolmesGPT: prod/api-0");
    assert_eq!(body["subject"], json!({"name": "api-0", "namespace": "prod", "kind": "Pod"}));

    let description = body["description"].as_str().unwrap();
    assert!(description
        .starts_with("Analyze the CrashLoopBackOff problem of Kubernetes Pod prod/api-0"));
    assert!(description.contains("Respond in Spanish"));
    assert!(description.contains("at most 150 words"));

    let logs = body["context"]["logs"].as_str().unwrap();
    assert_eq!(logs.chars().count(), 1000);
    assert!(logs.ends_with("panic: missing DATABASE_URL"));
    assert_eq!(body["context"]["events"][0]["reason"], "BackOff");
    assert_eq!(body["context"]["phase"], "Running");
    assert_eq!(body["context"]["containerStatuses"][0]["restartCount"], 7);
}

#[tokio::test]
async fn test_service_error_still_emits_finding() {
    let holmes = MockHolmes::start(Reply::Status(500, "model overloaded".to_string())).await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("api-0", "prod", "CrashLoopBackOff", 2)],
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), cluster, &sink);

    let finding = assert_ok!(
        registry()
            .trigger(
                "holmes_pod_issue",
                &pod_target("api-0", "prod"),
                &ctx,
                FindingSource::Manual
            )
            .await
    )
    .expect("finding");

    let text = finding.markdown_text();
    assert!(
        text.contains("❌ Error communicating with HolmesGPT: API error: 500 - model overloaded")
    );
    assert!(!text.contains("Collected context"));
    assert!(!text.contains("💰"));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_timeout_reports_collected_context() {
    let holmes = MockHolmes::start(Reply::Slow(Duration::from_secs(3))).await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("worker-5", "batch", "CrashLoopBackOff", 4)],
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(
        holmes.client_with_timeout(Duration::from_millis(200)),
        cluster,
        &sink,
    );

    let finding = assert_ok!(
        registry()
            .trigger(
                "analyze_with_holmesgpt",
                &pod_target("worker-5", "batch"),
                &ctx,
                FindingSource::Manual
            )
            .await
    )
    .expect("finding");

    let text = finding.markdown_text();
    assert!(text.contains("❌ Error communicating with HolmesGPT: HTTP request failed"));
    assert!(text.contains("Collected context:\nProblem detected in cluster prod-eu:"));
    assert!(text.contains("No logs available"));
}

#[tokio::test]
async fn test_image_pull_uses_ask_api() {
    let holmes = MockHolmes::start(Reply::Json(json!({
        "answer": "The tag 9.9 does not exist in the registry.",
        "analysis": null
    })))
    .await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("cart-7f9c", "shop", "ImagePullBackOff", 0)],
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), cluster.clone(), &sink);

    let finding = assert_ok!(
        registry()
            .trigger(
                "analyze_image_pull_backoff_with_holmes",
                &pod_target("cart-7f9c", "shop"),
                &ctx,
                FindingSource::Manual
            )
            .await
    )
    .expect("finding");

    assert_eq!(finding.title, "🔍 ImagePullBackOff - HolmesGPT: shop/cart-7f9c");
    assert_eq!(finding.blocks.len(), 3);
    assert_eq!(
        finding.blocks[1],
        Block::markdown("## 🤖 HolmesGPT analysis\n\nThe tag 9.9 does not exist in the registry.")
    );
    match &finding.blocks[2] {
        Block::Table { name, rows, .. } => {
            assert_eq!(name, "Affected containers");
            assert_eq!(rows[0][0], "app");
            assert_eq!(rows[0][2], "ImagePullBackOff");
        }
        other => panic!("expected table, got {:?}", other),
    }

    // no crash loop, so only the current logs are requested
    assert_eq!(cluster.log_requests(), vec![(Some("app".to_string()), false)]);

    let requests = holmes.requests();
    let (path, body) = &requests[0];
    assert_eq!(path, "/api/ask");
    assert_eq!(body["resource_type"], "pod");
    assert_eq!(body["resource_name"], "cart-7f9c");
    assert_eq!(body["namespace"], "shop");
    assert!(body["ask"].as_str().unwrap().contains("registry credentials"));
    assert!(body["context"].as_str().unwrap().contains("- Problem: ImagePullBackOff"));
}

#[tokio::test]
async fn test_node_issue() {
    let holmes = MockHolmes::start(MockHolmes::analysis("Kubelet is down.")).await;
    let cluster = Arc::new(FakeCluster {
        nodes: vec![not_ready_node("worker-1")],
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), cluster.clone(), &sink);
    let target = ResourceTarget {
        kind: "Node".to_string(),
        name: "worker-1".to_string(),
        namespace: None,
        api_version: None,
    };

    let finding = assert_ok!(
        registry()
            .trigger("holmes_node_issue", &target, &ctx, FindingSource::KubernetesApiServer)
            .await
    )
    .expect("finding");

    assert_eq!(finding.title, "🔍 NotReady - HolmesGPT: worker-1");
    assert_eq!(finding.aggregation_key, "HolmesGPT_worker-1");
    assert!(cluster.log_requests().is_empty());

    let requests = holmes.requests();
    let body = &requests[0].1;
    assert_eq!(body["subject"]["namespace"], "cluster-scoped");
    assert_eq!(body["context"]["logs"], "");
    assert_eq!(body["context"]["conditions"][1]["reason"], "NodeStatusUnknown");
}

#[tokio::test]
async fn test_pushed_resource_event() {
    let holmes =
        MockHolmes::start(MockHolmes::analysis("Replicas cannot be scheduled.")).await;
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), Arc::new(FakeCluster::default()), &sink);
    let event = ResourceEvent::Resource(ResourceObject {
        kind: "Deployment".to_string(),
        name: "web".to_string(),
        namespace: Some("shop".to_string()),
        status: Some(json!({
            "conditions": [{
                "type": "Available",
                "status": "False",
                "reason": "MinimumReplicasUnavailable",
                "message": "Deployment does not have minimum availability."
            }]
        })),
    });

    let finding = assert_ok!(
        registry()
            .dispatch("holmes_resource_issue", &event, &ctx, FindingSource::Webhook)
            .await
    )
    .expect("finding");

    assert_eq!(finding.title, "🔍 ResourceIssue - HolmesGPT: shop/web");
    assert_eq!(finding.source, FindingSource::Webhook);
    assert_eq!(sink.findings()[0].aggregation_key, "HolmesGPT_shop_web");

    let body = &holmes.requests()[0].1;
    assert_eq!(body["subject"]["kind"], "Deployment");
    assert_eq!(body["context"]["conditions"][0]["type"], "Available");
    assert_eq!(body["context"]["logs"], "");
}

#[tokio::test]
async fn test_event_listing_failure_sends_empty_events() {
    let holmes = MockHolmes::start(MockHolmes::analysis("Probable bad config.")).await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("api-0", "prod", "CrashLoopBackOff", 3)],
        fail_events: true,
        ..Default::default()
    });
    let sink = CollectingSink::new();
    let ctx = context(holmes.client(), cluster, &sink);

    let finding = assert_ok!(
        registry()
            .trigger(
                "holmes_pod_issue",
                &pod_target("api-0", "prod"),
                &ctx,
                FindingSource::Manual
            )
            .await
    )
    .expect("finding");

    assert_eq!(finding.title, "🔍 CrashLoopBackOff - HolmesGPT: prod/api-0");
    assert_eq!(sink.len(), 1);

    let body = &holmes.requests()[0].1;
    assert_eq!(body["context"]["events"], json!([]));
    assert_eq!(body["context"]["containerStatuses"][0]["restartCount"], 3);
}

#[tokio::test]
async fn test_silent_webhook_does_not_stall_invocation() {
    let holmes = MockHolmes::start(MockHolmes::analysis("Wrong image tag.")).await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("api-0", "prod", "ErrImagePull", 0)],
        ..Default::default()
    });
    let collected = CollectingSink::new();
    let mut ctx = context(holmes.client(), cluster, &collected);

    let hook = format!("http://{}/hook", silent_listener().await);
    let webhook = WebhookSink::new(hook, Duration::from_millis(200)).unwrap();
    ctx.sink = Arc::new(
        FanoutSink::new()
            .with_sink(Arc::new(webhook))
            .with_sink(Arc::new(collected.clone())),
    );

    let registry = registry();
    let target = pod_target("api-0", "prod");
    let run = registry.trigger(
        "holmes_pod_issue",
        &target,
        &ctx,
        FindingSource::Manual,
    );
    let finding = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("invocation stalled on the webhook")
        .unwrap()
        .expect("finding");

    assert_eq!(finding.aggregation_key, "HolmesGPT_prod_api-0");
    assert_eq!(collected.len(), 1);
}
