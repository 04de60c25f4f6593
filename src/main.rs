//! holmes-playbooks - Kubernetes diagnostic playbooks backed by HolmesGPT

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holmes_playbooks::{
    api::{build_router, AppState},
    config::{default_config_path, load_config, Config},
    domain::{FindingSource, ResourceTarget},
    integrations::{FanoutSink, FindingSink, HolmesClient, KubernetesService, LogSink, WebhookSink},
    playbooks::{PlaybookContext, PlaybookRegistry},
};

#[derive(Parser)]
#[command(name = "holmes-playbooks")]
#[command(version)]
#[command(about = "Kubernetes diagnostic playbooks that forward resource context to HolmesGPT")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/holmes-playbooks/config.toml)
    #[arg(short, long, global = true, env = "HOLMES_PLAYBOOKS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one playbook against a live resource and print the finding
    Analyze {
        /// Resource kind (Pod, Node, Deployment, ...)
        kind: String,

        /// Resource name
        name: String,

        /// Namespace of the resource
        #[arg(short, long)]
        namespace: Option<String>,

        /// apiVersion for kinds other than Pod and Node
        #[arg(long)]
        api_version: Option<String>,

        /// Playbook to run (defaults to the playbook registered for the kind)
        #[arg(long)]
        playbook: Option<String>,
    },
    /// List registered playbooks
    Playbooks,
    /// Show the effective configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "holmes_playbooks=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let registry = PlaybookRegistry::with_builtins(&config.playbook_overrides());

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            run_server(&config, registry, &host, port).await
        }
        Commands::Analyze {
            kind,
            name,
            namespace,
            api_version,
            playbook,
        } => {
            let target = ResourceTarget {
                kind,
                name,
                namespace,
                api_version,
            };
            analyze(&config, registry, target, playbook).await
        }
        Commands::Playbooks => {
            for info in registry.list() {
                println!(
                    "{:<42} {:<9} {}",
                    info.name,
                    info.trigger.to_string(),
                    info.description
                );
            }
            Ok(())
        }
        Commands::Config => {
            let path = cli.config.unwrap_or_else(default_config_path);
            println!("# Config file: {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn holmes_client(config: &Config) -> anyhow::Result<HolmesClient> {
    let timeout = Duration::from_secs(config.holmes.timeout_secs);
    HolmesClient::with_base_url(&config.holmes.base_url, timeout)
        .context("Failed to build HolmesGPT client")
}

/// Sinks configured for the server: log and optional webhook
fn configured_sinks(config: &Config) -> anyhow::Result<FanoutSink> {
    let mut sinks = FanoutSink::new();
    if config.notify.log_findings {
        sinks = sinks.with_sink(Arc::new(LogSink));
    }
    if let Some(url) = &config.notify.webhook_url {
        let timeout = Duration::from_secs(config.notify.timeout_secs);
        let webhook = WebhookSink::new(url, timeout).context("Failed to build webhook sink")?;
        sinks = sinks.with_sink(Arc::new(webhook));
    }
    Ok(sinks)
}

async fn playbook_context(
    config: &Config,
    sink: Arc<dyn FindingSink>,
) -> anyhow::Result<PlaybookContext> {
    let cluster = KubernetesService::new()
        .await
        .context("Failed to connect to the Kubernetes cluster")?;

    Ok(PlaybookContext {
        client: Arc::new(holmes_client(config)?),
        source: Arc::new(cluster),
        sink,
        cluster_name: config.cluster_name().to_string(),
        language: config.holmes.language.clone(),
    })
}

async fn run_server(
    config: &Config,
    registry: PlaybookRegistry,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let sinks = configured_sinks(config)?;
    if sinks.is_empty() {
        tracing::warn!("No finding sinks configured, findings are only returned to callers");
    }

    let ctx = playbook_context(config, Arc::new(sinks)).await?;
    let state = AppState::new(registry, ctx);
    let app = build_router(state, config.server.cors_enabled);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!(
        "Starting server on {} (HolmesGPT at {})",
        addr,
        config.holmes.base_url
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn analyze(
    config: &Config,
    registry: PlaybookRegistry,
    target: ResourceTarget,
    playbook: Option<String>,
) -> anyhow::Result<()> {
    let kind = target.event_kind();
    let name = match playbook {
        Some(name) => name,
        None => registry
            .default_for(kind)
            .with_context(|| format!("No playbook registered for {} resources", kind))?,
    };

    let ctx = playbook_context(config, Arc::new(configured_sinks(config)?)).await?;

    match registry
        .trigger(&name, &target, &ctx, FindingSource::Manual)
        .await?
    {
        Some(finding) => {
            println!("{}", finding.to_markdown());
            Ok(())
        }
        None => anyhow::bail!("{} {} not found", target.kind, target.name),
    }
}
