//! Risk assessment of a search result list

use super::types::{office_name, Trademark};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Results considered for the assessment
pub const MAX_RESULTS: usize = 20;
const TOP_CONFLICTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Any hit at 85+ is high; two hits in 70..85 or five hits overall is medium
    pub fn from_results(results: &[Trademark]) -> Self {
        let high = results.iter().filter(|r| r.accuracy >= 85).count();
        let medium = results
            .iter()
            .filter(|r| (70..85).contains(&r.accuracy))
            .count();

        if high >= 1 {
            RiskLevel::High
        } else if medium >= 2 || results.len() >= 5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub name: String,
    pub similarity: u8,
    pub office: String,
    pub nice_classes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub search_term: String,
    pub total_results: usize,
    pub risk_level: RiskLevel,
    pub top_conflicts: Vec<Conflict>,
    pub summary: String,
}

impl SearchSummary {
    /// Text fed back into the live conversation
    pub fn to_context_text(&self) -> String {
        let mut text = format!("Trademark search result: {}", self.summary);
        if !self.top_conflicts.is_empty() {
            text.push_str(" Closest marks: ");
            let parts: Vec<String> = self
                .top_conflicts
                .iter()
                .map(|c| format!("{} ({}%, {})", c.name, c.similarity, c.office))
                .collect();
            text.push_str(&parts.join("; "));
            text.push('.');
        }
        text
    }
}

/// Assess the first [`MAX_RESULTS`] hits for `term`
pub fn summarize(term: &str, results: &[Trademark]) -> SearchSummary {
    let considered = &results[..results.len().min(MAX_RESULTS)];
    let risk_level = RiskLevel::from_results(considered);

    let top_conflicts: Vec<Conflict> = considered
        .iter()
        .take(TOP_CONFLICTS)
        .map(|r| Conflict {
            name: r.name.clone(),
            similarity: r.accuracy,
            office: office_name(&r.office).to_string(),
            nice_classes: r.nice_classes.clone(),
        })
        .collect();

    let summary = summary_line(term, considered.len(), risk_level, top_conflicts.first());

    SearchSummary {
        search_term: term.to_string(),
        total_results: considered.len(),
        risk_level,
        top_conflicts,
        summary,
    }
}

fn summary_line(term: &str, total: usize, risk: RiskLevel, top: Option<&Conflict>) -> String {
    if total == 0 {
        return format!("No similar trademarks were found for \"{term}\". The risk appears low.");
    }

    let mut line = format!(
        "Found {total} similar trademark{} for \"{term}\". The collision risk is {risk}.",
        if total == 1 { "" } else { "s" }
    );
    if let Some(top) = top.filter(|t| t.similarity >= 70) {
        line.push_str(&format!(
            " The closest match ({}%) is \"{}\".",
            top.similarity, top.name
        ));
    }
    if risk == RiskLevel::High {
        line.push_str(" A detailed review is recommended.");
    }
    line
}
