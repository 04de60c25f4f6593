//! Cleanup of the analysis text returned by the AI service.
//!
//! Each pass is a function `&str -> String` applied in sequence. Link removal
//! runs before heading conversion and truncation so that no link is cut in
//! half and headings end up with plain text.

use std::sync::LazyLock;

use regex::Regex;

use crate::integrations::{DiagnosticResult, Usage};

/// Longest analysis kept in a finding, in characters
pub const MAX_ANALYSIS_CHARS: usize = 1000;

pub const ELLIPSIS: &str = "...";

/// Run the full cleanup pipeline on an analysis
pub fn format_analysis(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let mut result = strip_external_links(&text);

    result = strip_inline_links(&result);
    result = flatten_headings(&result);
    result = strip_shell_blocks(&result);
    result = collapse_blank_lines(&result);
    result = truncate(result.trim());

    result.trim().to_string()
}

/// Token usage and cost estimate line
pub fn usage_line(usage: &Usage) -> String {
    format!(
        "💰 Tokens: {} | Estimated cost: ${:.4}",
        usage.total(),
        usage.estimated_cost_usd()
    )
}

/// Text shown in the finding for a diagnostic result.
///
/// Analyses are cleaned up and get a usage line; failures are shown as-is.
pub fn render(result: &DiagnosticResult) -> String {
    match result {
        DiagnosticResult::Analysis { text, usage } => {
            let mut out = format_analysis(text);
            if let Some(usage) = usage {
                out.push_str("\n\n");
                out.push_str(&usage_line(usage));
            }
            out
        }
        DiagnosticResult::Failure { message } => message.clone(),
    }
}

/// Drop an `External Links` section and everything after it
fn strip_external_links(md: &str) -> String {
    static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^#{1,2}[ \t]*External[ \t]+(?i:links)\b[\s\S]*\z").expect("valid regex")
    });

    SECTION_RE.replace(md, "").to_string()
}

/// `[text](url)` -> `text`
fn strip_inline_links(md: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid regex"));

    LINK_RE.replace_all(md, "${1}").to_string()
}

/// Level 1-3 headings become a single bold line
fn flatten_headings(md: &str) -> String {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#{1,3}[ \t]+(.+?)[ \t]*$").expect("valid regex"));

    HEADING_RE.replace_all(md, "**${1}**").to_string()
}

/// Remove fenced blocks tagged `bash`, `shell` or untagged.
///
/// Fences are tracked line by line so that the closing fence of a kept
/// block is never mistaken for the opening of a dropped one. An unclosed
/// fence is kept as it is.
fn strip_shell_blocks(md: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut fence: Option<bool> = None; // Some(drop?) while inside a block

    for line in md.split('\n') {
        let trimmed = line.trim_start();
        match fence {
            None if trimmed.starts_with("```") => {
                let tag = trimmed.trim_start_matches('`').trim();
                fence = Some(matches!(tag, "" | "bash" | "shell"));
                pending.push(line);
            }
            None => out.push(line),
            Some(drop) => {
                pending.push(line);
                let closing = trimmed.starts_with("```")
                    && trimmed.trim_start_matches('`').trim().is_empty();
                if closing {
                    if !drop {
                        out.append(&mut pending);
                    }
                    pending.clear();
                    fence = None;
                }
            }
        }
    }

    out.append(&mut pending);
    out.join("\n")
}

/// Collapse runs of 3+ newlines into exactly 2
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

/// Cut to [`MAX_ANALYSIS_CHARS`] characters plus an ellipsis
fn truncate(md: &str) -> String {
    match md.char_indices().nth(MAX_ANALYSIS_CHARS) {
        Some((idx, _)) => format!("{}{}", &md[..idx], ELLIPSIS),
        None => md.to_string(),
    }
}
