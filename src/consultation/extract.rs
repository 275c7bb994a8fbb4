//! Trigger tags the advisor embeds in its replies
//!
//! The assistant marks collected facts inline, e.g. `[MARKE: Nova]`,
//! `[KLASSEN: 9, 42]`, `[LAENDER: DE, EU]`. English aliases are accepted too.
//! Tags are machine-readable only and are removed before display.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const MAX_NICE_CLASS: u8 = 45;

static TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(MARKE|BRAND|KLASSEN|CLASSES|LAENDER|LÄNDER|COUNTRIES)\s*:\s*([^\]]*)\]")
        .unwrap()
});

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[\s*(?:MARKE|BRAND|KLASSEN|CLASSES|LAENDER|LÄNDER|COUNTRIES|ART|GOTO|SYSTEM)\s*:[^\]]*\]",
        r"|\[(?:LOGO_GENERIEREN|RECHERCHE_STARTEN)\]",
    ))
    .unwrap()
});

static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Facts collected from trigger tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triggers {
    pub trademark_name: Option<String>,
    pub countries: Vec<String>,
    pub nice_classes: Vec<u8>,
}

impl Triggers {
    /// All three facts needed to start a search are known
    pub fn is_complete(&self) -> bool {
        self.trademark_name.is_some() && !self.countries.is_empty() && !self.nice_classes.is_empty()
    }
}

/// Collect trigger tags from `text`.
///
/// A later brand tag overrides an earlier one; classes and countries
/// accumulate in first-seen order without duplicates.
pub fn extract_triggers(text: &str) -> Triggers {
    let mut triggers = Triggers::default();

    for caps in TRIGGER.captures_iter(text) {
        let (Some(tag), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let value = value.as_str().trim();

        match tag.as_str() {
            "MARKE" | "BRAND" => {
                let name = value.trim_matches(|c: char| c == '"' || c == '\'').trim();
                if !name.is_empty() {
                    triggers.trademark_name = Some(name.to_string());
                }
            }
            "KLASSEN" | "CLASSES" => {
                for class in parse_classes(value) {
                    if !triggers.nice_classes.contains(&class) {
                        triggers.nice_classes.push(class);
                    }
                }
            }
            _ => {
                for country in parse_countries(value) {
                    if !triggers.countries.contains(&country) {
                        triggers.countries.push(country);
                    }
                }
            }
        }
    }

    triggers
}

/// Remove all machine tags and collapse the leftover whitespace
pub fn strip_triggers(text: &str) -> String {
    let stripped = ANY_TAG.replace_all(text, "");
    MULTI_SPACE.replace_all(&stripped, " ").trim().to_string()
}

fn parse_classes(value: &str) -> impl Iterator<Item = u8> + '_ {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse::<u8>().ok())
        .filter(|class| (1..=MAX_NICE_CLASS).contains(class))
}

fn parse_countries(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c == ',' || c == ';' || c == '/' || c.is_whitespace())
        .map(|part| part.trim().to_uppercase())
        .filter(|code| code.chars().count() >= 2 && code.chars().all(char::is_alphabetic))
}
