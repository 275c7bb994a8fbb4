//! Server-rendered HTML pages
//!
//! Plain string templates. Every value that came from a user or the store
//! goes through [`escape`].

use crate::db::{Case, Consultation};
use crate::workflow::{derive_view, StepName, StepStatus, WorkflowView};
use std::fmt::Write;

/// Minimal HTML escaping for text and attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Trademark Desk</title>
<link rel="stylesheet" href="/assets/dashboard.css">
</head>
<body>
<header class="topbar"><a href="/" class="brand">Trademark Desk</a><nav><a href="/dashboard">Cases</a><a href="/dashboard/copilot">Copilot</a></nav></header>
<main>
{body}
</main>
<script src="/assets/desk.js" defer></script>
</body>
</html>"#,
        title = escape(title)
    )
}

pub fn landing() -> String {
    let mut steps = String::new();
    for step in StepName::ALL {
        let _ = write!(
            steps,
            "<li><strong>{}</strong> {}</li>",
            step.label(),
            escape(step.description())
        );
    }
    layout(
        "Protect your brand",
        &format!(
            r#"<section class="hero">
<h1>Protect your brand, step by step</h1>
<p>Talk to the trademark copilot, search for conflicting marks, review the risk and file with the office. Your case remembers where you left off.</p>
<p><button class="primary" data-new-case="consultation">Start with a consultation</button>
<button data-new-case="search">Go straight to search</button></p>
</section>
<section><h2>How it works</h2><ol class="steps-intro">{steps}</ol></section>"#
        ),
    )
}

pub fn dashboard(cases: &[Case]) -> String {
    let mut rows = String::new();
    for case in cases {
        let view = derive_view(&case.steps);
        let current = view.current().map_or("Done", StepName::label);
        let _ = write!(
            rows,
            r#"<tr><td><a href="/dashboard/cases/{id}">{number}</a></td><td>{name}</td><td>{status}</td><td>{current}</td><td><progress max="100" value="{pct}">{pct}%</progress></td></tr>"#,
            id = escape(&case.id),
            number = escape(&case.case_number),
            name = escape(case.trademark_name.as_deref().unwrap_or("-")),
            status = case.status,
            pct = view.progress_percent(),
        );
    }

    let table = if cases.is_empty() {
        "<p class=\"empty\">No cases yet.</p>".to_string()
    } else {
        format!(
            "<table class=\"cases\"><thead><tr><th>Case</th><th>Trademark</th><th>Status</th>\
             <th>Current step</th><th>Progress</th></tr></thead><tbody>{rows}</tbody></table>"
        )
    };

    layout(
        "Cases",
        &format!(
            "<h1>Your cases</h1>\
             <p><button class=\"primary\" data-new-case=\"consultation\">New case</button></p>{table}"
        ),
    )
}

/// The workflow stepper; pending steps render without a link
pub fn stepper(case_id: &str, view: &WorkflowView) -> String {
    let mut out = String::from("<ol class=\"stepper\">");
    for step in &view.steps {
        let class = match step.status {
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
            StepStatus::InProgress => "current",
            StepStatus::Pending => "pending",
        };
        let label = if step.is_clickable() {
            format!(
                r#"<a href="/dashboard/cases/{id}/steps/{name}">{label}</a> <a class="help" href="/dashboard/cases/{id}/steps/{name}?prompt=1" title="Ask the copilot">?</a>"#,
                id = escape(case_id),
                name = step.name.as_str(),
                label = step.label,
            )
        } else {
            step.label.to_string()
        };
        let _ = write!(
            out,
            r#"<li class="step {class}" data-step="{name}"><span class="marker"></span>{label}<small>{description}</small></li>"#,
            name = step.name.as_str(),
            description = escape(step.description),
        );
    }
    out.push_str("</ol>");
    out
}

pub fn case_page(case: &Case, consultations: &[Consultation]) -> String {
    let view = derive_view(&case.steps);
    let title = case
        .trademark_name
        .as_deref()
        .map_or_else(|| case.case_number.clone(), |name| format!("\"{name}\""));

    let mut list = String::new();
    for c in consultations {
        let _ = write!(
            list,
            "<li><strong>{}</strong> <span class=\"badge\">{}</span><p>{}</p></li>",
            escape(&c.title),
            c.status,
            escape(c.summary.as_deref().unwrap_or("No summary yet."))
        );
    }
    if list.is_empty() {
        list.push_str("<li class=\"empty\">No consultations recorded.</li>");
    }

    layout(
        &case.case_number,
        &format!(
            r#"<h1>{title} <small>{number}</small></h1>
<p>Status: <span class="badge">{status}</span> · {pct}% done</p>
{stepper}
<section><h2>Consultations</h2><ul class="consultations">{list}</ul></section>"#,
            title = escape(&title),
            number = escape(&case.case_number),
            status = case.status,
            pct = view.progress_percent(),
            stepper = stepper(&case.id, &view),
        ),
    )
}

/// Workspace page for one step; the consultation step carries the session controls
pub fn step_page(step: StepName, case: Option<&Case>, prompt: Option<&str>) -> String {
    let mut body = format!(
        "<h1>{}</h1><p>{}</p>",
        step.label(),
        escape(step.description())
    );

    if let Some(case) = case {
        let view = derive_view(&case.steps);
        let _ = write!(
            body,
            r#"<p><a href="/dashboard/cases/{id}">Back to case {number}</a></p>{stepper}"#,
            id = escape(&case.id),
            number = escape(&case.case_number),
            stepper = stepper(&case.id, &view),
        );
    }

    let case_attr = case.map(|c| escape(&c.id)).unwrap_or_default();
    let brand_attr = case
        .and_then(|c| c.trademark_name.as_deref())
        .map(escape)
        .unwrap_or_default();
    let prompt_text = prompt.map(escape).unwrap_or_default();

    if step == StepName::Consultation {
        let _ = write!(
            body,
            r#"<section id="copilot" data-case="{case_attr}" data-brand="{brand_attr}">
<div class="controls"><button class="primary" data-session="start">Start conversation</button><button data-session="stop" disabled>End</button><span class="connection" data-connection>disconnected</span></div>
<ul class="transcript" data-transcript></ul>
<form data-ask><textarea name="prompt" rows="3" placeholder="Ask the copilot">{prompt_text}</textarea><button type="submit">Send</button></form>
</section>
<script src="/assets/session.js" defer></script>"#
        );
    } else {
        if step == StepName::Search {
            let _ = write!(
                body,
                r#"<section class="search" data-case="{case_attr}">
<form data-search-form><label>Trademark <input name="search_term" required value="{brand_attr}"></label>
<label>Countries <input name="countries" value="DE" placeholder="DE, EU"></label>
<label>Nice classes <input name="classes" placeholder="9, 35, 42"></label>
<button class="primary" type="submit">Search</button></form>
<div class="search-result" data-search-result></div>
</section>"#
            );
        }
        let _ = write!(
            body,
            r#"<section class="workspace" data-case="{case_attr}" data-step="{step}">
<form data-ask action="/dashboard/copilot" method="get"><input type="hidden" name="case" value="{case_attr}"><textarea name="prompt" rows="3" placeholder="Ask the copilot about this step">{prompt_text}</textarea><button type="submit">Ask the copilot</button></form>
</section>"#,
            step = step.as_str(),
        );
    }

    layout(step.label(), &body)
}

pub fn not_found(message: &str) -> String {
    layout(
        "Not found",
        &format!(
            "<h1>Not found</h1><p>{}</p><p><a href=\"/dashboard\">Back to your cases</a></p>",
            escape(message)
        ),
    )
}
