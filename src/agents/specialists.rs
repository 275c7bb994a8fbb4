//! The four static specialists

use super::{AgentKind, AgentRequest, AgentResponse};
use async_trait::async_trait;

#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn analyze(&self, request: &AgentRequest) -> AgentResponse;
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Base minutes plus a fixed cost per touched file
fn estimate(base: u32, per_file: u32, files: &[String]) -> u32 {
    let count = u32::try_from(files.len()).unwrap_or(u32::MAX);
    base.saturating_add(per_file.saturating_mul(count))
}

#[derive(Default)]
pub struct CodeSpecialist;

#[async_trait]
impl Specialist for CodeSpecialist {
    fn kind(&self) -> AgentKind {
        AgentKind::Code
    }

    async fn analyze(&self, request: &AgentRequest) -> AgentResponse {
        let files = strings(&[
            "src/api/pages.rs",
            "src/api/handlers.rs",
            "src/db/schema.rs",
            "static/components/stepper.js",
            "src/api/types.rs",
        ]);
        AgentResponse {
            kind: self.kind(),
            analysis: format!(
                "Code analysis for: \"{}\"\n\n\
                 Required pieces:\n- page rendering for the new UI\n- API routes for the backend logic\n\
                 - typed request and response structs\n- state handling for the data flow",
                request.prompt
            ),
            suggestions: strings(&[
                "Add a new page section to the dashboard",
                "Implement an API route in src/api",
                "Define typed structs for the payloads",
                "Map every failure to a clear error response",
                "Show loading states while requests run",
                "Write unit tests for the new functions",
            ]),
            concerns: strings(&[
                "Types must stay consistent between API and UI",
                "API error handling must be implemented",
                "Check performance with large result sets",
                "Follow accessibility standards (WCAG)",
                "Security: input validation is required",
            ]),
            estimated_minutes: estimate(10, 5, &files),
            files,
        }
    }
}

#[derive(Default)]
pub struct DesignSpecialist;

#[async_trait]
impl Specialist for DesignSpecialist {
    fn kind(&self) -> AgentKind {
        AgentKind::Design
    }

    async fn analyze(&self, request: &AgentRequest) -> AgentResponse {
        let files = strings(&[
            "static/components/accordion.js",
            "static/components/button.js",
            "static/components/modal.js",
            "src/api/pages.rs",
            "static/dashboard.css",
            "static/theme.css",
        ]);
        AgentResponse {
            kind: self.kind(),
            analysis: format!(
                "Design analysis for: \"{}\"\n\n\
                 UI/UX requirements:\n- consistent with the existing components\n\
                 - responsive on mobile and desktop\n- WCAG 2.1 AA compliant\n- minimal clicks to the goal",
                request.prompt
            ),
            suggestions: strings(&[
                "Use a modal dialog for the new feature",
                "Loading skeletons for perceived speed",
                "Toast notifications for success messages",
                "Tooltips for complex interactions",
                "Progress indicator for multi-step flows",
                "Implement keyboard navigation",
                "Check dark mode support",
            ]),
            concerns: strings(&[
                "Check color contrast ratios",
                "Add screen reader labels",
                "Optimize touch target sizes",
                "Focus states for keyboard navigation",
                "Validate responsive breakpoints",
                "Keep animations cheap",
            ]),
            estimated_minutes: estimate(8, 3, &files),
            files,
        }
    }
}

#[derive(Default)]
pub struct WorkflowSpecialist;

#[async_trait]
impl Specialist for WorkflowSpecialist {
    fn kind(&self) -> AgentKind {
        AgentKind::Workflow
    }

    async fn analyze(&self, request: &AgentRequest) -> AgentResponse {
        let files = strings(&[
            "src/api/pages.rs",
            "src/api/handlers.rs",
            "src/workflow/step.rs",
            "src/db/schema.rs",
            "src/workflow/tracker.rs",
            "src/api/types.rs",
        ]);
        AgentResponse {
            kind: self.kind(),
            analysis: format!(
                "Workflow analysis for: \"{}\"\n\n\
                 Process integration:\n- existing steps: consultation, search, risk analysis, filing, watchlist\n\
                 - data flow between steps\n- state persisted across sessions\n- every change logged as a case event",
                request.prompt
            ),
            suggestions: strings(&[
                "Define the new step in the step list",
                "Store status changes in case_steps",
                "Update statuses automatically",
                "Log events for traceability",
                "Allow skipping optional steps",
                "Add conditional branches",
                "Run independent steps in parallel",
            ]),
            concerns: strings(&[
                "Status consistency across several API calls",
                "Race conditions between parallel operations",
                "Data integrity on aborted flows",
                "Rollback options on failure",
                "Performance with many steps",
                "Permissions for step transitions",
            ]),
            estimated_minutes: estimate(12, 7, &files),
            files,
        }
    }
}

#[derive(Default)]
pub struct QaSpecialist;

#[async_trait]
impl Specialist for QaSpecialist {
    fn kind(&self) -> AgentKind {
        AgentKind::Qa
    }

    async fn analyze(&self, request: &AgentRequest) -> AgentResponse {
        let files = strings(&[
            "tests/components/",
            "tests/api/",
            "tests/e2e/",
            "Cargo.toml",
            "clippy.toml",
            "rustfmt.toml",
            ".github/workflows/ci.yml",
        ]);
        AgentResponse {
            kind: self.kind(),
            analysis: format!(
                "QA analysis for: \"{}\"\n\n\
                 Quality gates:\n- clean build without warnings\n- unit test coverage above 80%\n\
                 - integration tests for the API routes\n- end-to-end tests for critical flows",
                request.prompt
            ),
            suggestions: strings(&[
                "Write unit tests for the new components",
                "Add API integration tests",
                "Add end-to-end tests for the flow",
                "Type payloads strictly",
                "Handle every error path explicitly",
                "Add performance monitoring",
                "Run security scans",
            ]),
            concerns: strings(&[
                "Build failures from type errors",
                "Test coverage too low",
                "Memory growth in long sessions",
                "Race conditions between API calls",
                "Check browser compatibility",
                "Run accessibility tests",
            ]),
            estimated_minutes: estimate(15, 4, &files),
            files,
        }
    }
}
