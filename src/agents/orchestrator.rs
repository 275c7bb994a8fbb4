//! Fan-out, cross-review and merge

use super::specialists::{
    CodeSpecialist, DesignSpecialist, QaSpecialist, Specialist, WorkflowSpecialist,
};
use super::{
    AgentKind, AgentRequest, AgentResponse, ChangeType, CrossReviewComment, DatabaseChange,
    FileChange, FinalProposal, Severity, TestChange,
};
use chrono::Utc;
use std::collections::HashSet;

#[derive(Default)]
pub struct Orchestrator {
    code: CodeSpecialist,
    design: DesignSpecialist,
    workflow: WorkflowSpecialist,
    qa: QaSpecialist,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze, cross-review and merge a change request into one proposal
    pub async fn process_request(&self, prompt: &str) -> FinalProposal {
        let request = AgentRequest {
            id: new_request_id(),
            prompt: prompt.trim().to_string(),
            received_at: Utc::now(),
        };

        // Specialists share nothing; run them side by side
        let (code, design, workflow, qa) = tokio::join!(
            self.code.analyze(&request),
            self.design.analyze(&request),
            self.workflow.analyze(&request),
            self.qa.analyze(&request),
        );
        let responses = [code, design, workflow, qa];

        let reviews = cross_review(&responses);
        tracing::debug!(
            request_id = %request.id,
            reviews = reviews.len(),
            "Specialist analysis complete"
        );

        merge(&request, &responses, reviews)
    }
}

fn new_request_id() -> String {
    format!("req-{}", uuid::Uuid::new_v4().simple())
}

fn touches(response: Option<&AgentResponse>, needle: &str) -> bool {
    response.is_some_and(|r| r.files.iter().any(|f| f.contains(needle)))
}

fn find(responses: &[AgentResponse], kind: AgentKind) -> Option<&AgentResponse> {
    responses.iter().find(|r| r.kind == kind)
}

/// Fixed review rules between specialists
pub(crate) fn cross_review(responses: &[AgentResponse]) -> Vec<CrossReviewComment> {
    let code = find(responses, AgentKind::Code);
    let design = find(responses, AgentKind::Design);
    let workflow = find(responses, AgentKind::Workflow);

    let mut reviews = Vec::new();
    let mut comment = |from, to, text: &str, severity| {
        reviews.push(CrossReviewComment {
            from,
            to,
            comment: text.to_string(),
            severity,
        });
    };

    if touches(design, "component") {
        comment(
            AgentKind::Code,
            AgentKind::Design,
            "UI components need typed props for type safety",
            Severity::Medium,
        );
    }
    if touches(workflow, "api") {
        comment(
            AgentKind::Code,
            AgentKind::Workflow,
            "API routes need error handling and validation",
            Severity::High,
        );
    }
    if touches(code, "component") {
        comment(
            AgentKind::Design,
            AgentKind::Code,
            "Components need ARIA labels for accessibility",
            Severity::Medium,
        );
    }
    if touches(code, "api") {
        comment(
            AgentKind::Workflow,
            AgentKind::Code,
            "API changes must update the case_steps table",
            Severity::High,
        );
    }
    for response in responses.iter().filter(|r| r.kind != AgentKind::Qa) {
        comment(
            AgentKind::Qa,
            response.kind,
            "Every change needs matching unit tests",
            Severity::Medium,
        );
    }

    reviews
}

fn merge(
    request: &AgentRequest,
    responses: &[AgentResponse],
    reviews: Vec<CrossReviewComment>,
) -> FinalProposal {
    let mut seen = HashSet::new();
    let files = responses
        .iter()
        .flat_map(|r| r.files.iter())
        .filter(|f| seen.insert(f.as_str()))
        .map(|path| FileChange {
            path: path.clone(),
            change_type: ChangeType::Modify,
            description: describe_file(path),
        })
        .collect();

    let database = if touches(find(responses, AgentKind::Workflow), "schema.rs") {
        vec![DatabaseChange {
            table: "case_steps".to_string(),
            operation: "alter".to_string(),
            description: "New columns for workflow metadata".to_string(),
        }]
    } else {
        Vec::new()
    };

    let tests = if touches(find(responses, AgentKind::Qa), "test") {
        vec![
            TestChange {
                file: "tests/components/new_feature.rs".to_string(),
                kind: "unit".to_string(),
                description: "Unit tests for the new components".to_string(),
            },
            TestChange {
                file: "tests/api/new_feature.rs".to_string(),
                kind: "integration".to_string(),
                description: "Integration tests for the API routes".to_string(),
            },
        ]
    } else {
        Vec::new()
    };

    FinalProposal {
        id: request.id.clone(),
        request: request.prompt.clone(),
        summary: summarize(&request.prompt, responses),
        files,
        database,
        tests,
        reviews,
        risks: responses.iter().flat_map(|r| r.concerns.clone()).collect(),
        benefits: responses.iter().flat_map(|r| r.suggestions.clone()).collect(),
        estimated_minutes: responses.iter().map(|r| r.estimated_minutes).sum(),
        requires_confirmation: true,
    }
}

fn summarize(prompt: &str, responses: &[AgentResponse]) -> String {
    let count = |kind| find(responses, kind).map_or(0, |r| r.files.len());
    format!(
        "Proposal for: \"{prompt}\"\n\n\
         Implementation:\n\
         - {} code files (pages, API routes)\n\
         - {} design files (UI, styling)\n\
         - {} workflow files (steps, logic)\n\
         - {} test files (unit, integration)\n\n\
         All changes were cross-reviewed.",
        count(AgentKind::Code),
        count(AgentKind::Design),
        count(AgentKind::Workflow),
        count(AgentKind::Qa),
    )
}

fn describe_file(path: &str) -> String {
    let mut parts = Vec::new();
    if path.contains("pages.rs") {
        parts.push("Server-rendered page with UI logic");
    }
    if path.contains("api/") {
        parts.push("API route with business logic");
    }
    if path.contains("schema.rs") {
        parts.push("Database schema change");
    }
    if path.contains("test") {
        parts.push("Test implementation");
    }
    if parts.is_empty() {
        "Code change".to_string()
    } else {
        parts.join(", ")
    }
}
