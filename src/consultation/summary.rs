//! Consultation summaries and titles
//!
//! Both go through the chat-completion service when one is configured. The
//! deterministic fallbacks keep a finished consultation useful without it.

use super::extract::{strip_triggers, Triggers};
use crate::llm::{LlmError, LlmRequest, LlmService};
use chrono::Utc;
use std::time::Duration;
use tokio::time::timeout;

const SUMMARY_PROMPT: &str = "You are a trademark law expert. Write a structured summary of this \
trademark consultation. Silently correct obvious speech recognition errors and technical terms \
(for example \"Nissa\" -> \"Nice\", \"DBMA\" -> \"DPMA\"). Use these sections:\n\
1) Topics discussed\n2) Key findings\n3) Recommendations\n4) Next steps";

const TITLE_PROMPT: &str = "Write a short, precise title (at most 50 characters) for this \
trademark consultation. Output only the title, without quotes or extra text.";

const TITLE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TITLE_CHARS: usize = 60;
const MAX_PROMPT_CHARS: usize = 24_000;

/// Summarize a transcript, falling back to [`fallback_summary`] on any failure
pub async fn generate_summary(
    llm: Option<&dyn LlmService>,
    transcript: &str,
    triggers: &Triggers,
    limit: Duration,
) -> String {
    let clean = strip_triggers(transcript);
    if clean.is_empty() {
        return fallback_summary(&clean, triggers);
    }
    let Some(llm) = llm else {
        return fallback_summary(&clean, triggers);
    };

    let request = LlmRequest::new(SUMMARY_PROMPT)
        .user(format!("Conversation:\n{}", truncate_chars(&clean, MAX_PROMPT_CHARS)))
        .max_tokens(2048);

    match complete_text(llm, &request, limit).await {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => fallback_summary(&clean, triggers),
        Err(e) => {
            tracing::warn!(error = %e, "Summary generation failed, using fallback");
            fallback_summary(&clean, triggers)
        }
    }
}

/// Generate a short title from a summary; `None` when the model is unavailable
pub async fn generate_title(llm: &dyn LlmService, summary: &str) -> Option<String> {
    let request = LlmRequest::new(TITLE_PROMPT)
        .user(format!("Summary:\n{}", truncate_chars(summary, 4000)))
        .max_tokens(100);

    match complete_text(llm, &request, TITLE_TIMEOUT).await {
        Ok(text) => Some(sanitize_title(&text)).filter(|t| !t.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Title generation failed");
            None
        }
    }
}

/// Title used when none could be generated
pub fn fallback_title(triggers: &Triggers) -> String {
    match &triggers.trademark_name {
        Some(name) => format!("Consultation on \"{name}\""),
        None => format!("Trademark consultation {}", Utc::now().format("%Y-%m-%d")),
    }
}

/// Whether `title` is one [`fallback_title`] produced, so it may be replaced
pub fn is_generated_title(title: &str) -> bool {
    title.starts_with("Consultation on \"") || title.starts_with("Trademark consultation ")
}

/// Deterministic summary built from the collected facts
pub fn fallback_summary(transcript: &str, triggers: &Triggers) -> String {
    let mut lines = vec!["Trademark consultation.".to_string()];

    if let Some(name) = &triggers.trademark_name {
        lines.push(format!("Trademark: {name}"));
    }
    if !triggers.countries.is_empty() {
        lines.push(format!("Countries: {}", triggers.countries.join(", ")));
    }
    if !triggers.nice_classes.is_empty() {
        let classes: Vec<String> = triggers.nice_classes.iter().map(u8::to_string).collect();
        lines.push(format!("Nice classes: {}", classes.join(", ")));
    }

    let exchanges = transcript
        .lines()
        .filter(|l| l.starts_with(super::USER_PREFIX))
        .count();
    lines.push(format!("Questions asked: {exchanges}"));

    if !triggers.is_complete() {
        lines.push("Next step: complete the missing details before starting a search.".into());
    }
    lines.join("\n")
}

async fn complete_text(
    llm: &dyn LlmService,
    request: &LlmRequest,
    limit: Duration,
) -> Result<String, LlmError> {
    let response = timeout(limit, llm.complete(request))
        .await
        .map_err(|_| LlmError::timeout(limit))??;
    Ok(response.text.trim().to_string())
}

fn sanitize_title(title: &str) -> String {
    let cleaned = title
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim();
    truncate_chars(cleaned, MAX_TITLE_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
