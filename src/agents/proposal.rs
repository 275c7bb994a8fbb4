//! Rendering a proposal and interpreting the user's answer

use super::FinalProposal;
use serde::Serialize;
use std::fmt::Write;

const MAX_BENEFITS: usize = 5;
const MAX_RISKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
    Modify,
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalReply {
    pub decision: Decision,
    pub message: String,
}

/// Markdown rendering shown to the user
pub fn render_proposal(proposal: &FinalProposal) -> String {
    let mut out = format!(
        "## Proposal for: \"{}\"\n\n{}\n\n---\n\n### Changes",
        proposal.request, proposal.summary
    );

    if !proposal.files.is_empty() {
        let _ = write!(out, "\n\n**Files ({}):**", proposal.files.len());
        for file in &proposal.files {
            let _ = write!(
                out,
                "\n{} `{}` - {}",
                file_icon(&file.path),
                file.path,
                file.description
            );
        }
    }

    if !proposal.database.is_empty() {
        let _ = write!(out, "\n\n**Database ({}):**", proposal.database.len());
        for change in &proposal.database {
            let _ = write!(out, "\n🔧 `{}` - {}", change.table, change.description);
        }
    }

    if !proposal.tests.is_empty() {
        let _ = write!(out, "\n\n**Tests ({}):**", proposal.tests.len());
        for test in &proposal.tests {
            let _ = write!(out, "\n✅ `{}` - {}", test.file, test.description);
        }
    }

    push_capped(&mut out, "Benefits", &proposal.benefits, MAX_BENEFITS);
    push_capped(&mut out, "Risks", &proposal.risks, MAX_RISKS);

    let _ = write!(
        out,
        "\n\n### Estimated time: {} minutes\n\n---\n\n\
         ## Decision\n\n\
         **Do you want to implement this proposal?**\n\n\
         Reply with:\n\
         - **\"Yes\"** to implement all changes\n\
         - **\"No\"** to discard the proposal\n\
         - **\"Change\"** plus your notes to adjust the proposal",
        proposal.estimated_minutes
    );
    out
}

fn push_capped(out: &mut String, title: &str, items: &[String], max: usize) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n\n### {title}");
    for item in items.iter().take(max) {
        let _ = write!(out, "\n• {item}");
    }
    if items.len() > max {
        let _ = write!(out, "\n• ... and {} more", items.len() - max);
    }
}

fn file_icon(path: &str) -> &'static str {
    if path.contains("pages.rs") {
        "📄"
    } else if path.contains("component") {
        "🧩"
    } else if path.contains("api/") {
        "🔌"
    } else if path.contains("schema.rs") {
        "🗄️"
    } else if path.contains("test") {
        "🧪"
    } else if path.contains("types") {
        "📝"
    } else if path.contains(".css") {
        "🎨"
    } else {
        "📁"
    }
}

/// Interpret the user's answer to a proposal
pub fn respond(answer: &str, proposal: &FinalProposal) -> ProposalReply {
    let normalized = answer.trim().to_lowercase();

    let (decision, message) = match normalized.as_str() {
        "yes" | "y" | "ja" | "j" => (Decision::Accepted, confirmation_message(proposal)),
        "no" | "n" | "nein" => (
            Decision::Rejected,
            "**Proposal discarded**\n\nNothing was changed. \
             Would you like an alternative or an adjusted proposal?"
                .to_string(),
        ),
        n if is_modification(n) => (
            Decision::Modify,
            format!(
                "**Adjusting the proposal...**\n\nYour feedback: \"{}\"\n\n\
                 I will take your notes into account and prepare a new proposal.",
                answer.trim()
            ),
        ),
        _ => (
            Decision::Unclear,
            format!(
                "**Unclear answer**\n\nPlease reply with:\n\
                 - **\"Yes\"** to implement the proposal\n\
                 - **\"No\"** to discard it\n\
                 - **\"Change\"** plus your notes to adjust it\n\n\
                 Your answer: \"{}\"",
                answer.trim()
            ),
        ),
    };

    ProposalReply { decision, message }
}

fn is_modification(normalized: &str) -> bool {
    const PREFIXES: [&str; 4] = ["change", "adjust", "ändern", "anpassen"];
    PREFIXES.iter().any(|p| normalized.starts_with(p))
        || normalized
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == "but" || word == "aber")
}

fn confirmation_message(proposal: &FinalProposal) -> String {
    format!(
        "**Implementing the proposal...**\n\n\
         Planned work:\n\
         - {} file changes\n\
         - {} database changes\n\
         - {} tests\n\n\
         Estimated time: {} minutes",
        proposal.files.len(),
        proposal.database.len(),
        proposal.tests.len(),
        proposal.estimated_minutes
    )
}
