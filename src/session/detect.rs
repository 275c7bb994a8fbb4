//! Pattern matchers run over every transcript message
//!
//! The offer matcher looks for the assistant proposing a trademark search and
//! pulls out the brand name it proposed to search for. The confirmation
//! matcher decides whether a user reply is an affirmative answer.

use regex::Regex;
use std::sync::LazyLock;

const MAX_BRAND_LEN: usize = 60;

static OFFER_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        // "Shall I run a trademark search ...", "Should I check ..."
        r"(?:shall|should|can|may)\s+i\s+(?:(?:run|start|do|perform|begin)\s+)?(?:(?:a|an|the)\s+)?(?:quick\s+)?(?:trademark\s+)?(?:search|check|look\s?up|research)",
        // "Would you like me to search ...", "Do you want me to run a check ..."
        r"|(?:do\s+you\s+want|would\s+you\s+like|want)\s+me\s+to\s+(?:(?:run|start|do)\s+)?(?:(?:a|the)\s+)?(?:trademark\s+)?(?:search|check|look\s+up)",
        // "Soll ich eine Recherche für ... starten?", "Soll ich nach ... suchen?"
        r"|soll(?:en)?\s+ich\b[^.?!]*?\b(?:recherche|suche|suchen|prüfen|überprüfen|recherchieren|nachsehen)",
        r")",
    ))
    .unwrap()
});

static DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“„»«]([^"“”„»«]{1,60})["“”»«]"#).unwrap());

static SINGLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"‘([^‘’]{1,60})’|(?:^|\s)'([^']{1,60})'(?:[\s?.!,:;]|$)").unwrap()
});

static NAMED_AFTER_PREPOSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i:\b(?:for|named|called|name|nach|für|namen|marke)\s+(?:the\s+)?",
        r"(?:(?:brand|name|trademark|mark|marke|namen|die\s+marke|den\s+namen)\s+)?)",
        r"([\p{Lu}\p{N}][\p{L}\p{N}&\-.]*(?:\s+[\p{Lu}\p{N}][\p{L}\p{N}&\-.]*){0,3})",
    ))
    .unwrap()
});

static AFFIRMATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^[\s\p{P}]*(?:",
        r"yes|yeah|yep|yup|sure|ok(?:ay)?|of\s+course|please(?:\s+do)?|go\s+ahead|do\s+it|absolutely|definitely|let'?s\s+do\s+it",
        r"|ja|jawohl|gerne|gern|klar|natürlich|genau|mach(?:e)?\s+(?:das|es|mal)|bitte|auf\s+jeden\s+fall|los",
        r")\b",
    ))
    .unwrap()
});

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:no|nope|not|don'?t|never|later|nein|nicht|noch\s+nicht|später)\b")
        .unwrap()
});

/// Words that follow "for"/"für" in an offer without being a brand name
const NOT_A_BRAND: &[&str] = &[
    "you", "your", "it", "that", "this", "me", "us", "them", "sie", "ihre", "ihren", "ihr",
    "dich", "dir", "du", "eine", "einen", "die", "den", "das", "marken", "ähnliche", "similar",
    "trademarks", "conflicts", "konflikte",
];

/// Detect an offer to run a search and extract the candidate brand.
///
/// Returns `Some(brand)` only when the text contains an offer phrase. The brand
/// comes from the message itself; `fallback` (usually the case's trademark
/// name) is used when the message names none.
pub fn detect_offer(text: &str, fallback: Option<&str>) -> Option<String> {
    if !OFFER_PHRASE.is_match(text) {
        return None;
    }

    extract_brand(text).or_else(|| {
        fallback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
    })
}

/// Whether a user reply affirms a pending offer
pub fn is_confirmation(text: &str) -> bool {
    AFFIRMATIVE.is_match(text) && !NEGATION.is_match(text)
}

fn extract_brand(text: &str) -> Option<String> {
    let quoted = DOUBLE_QUOTED
        .captures(text)
        .and_then(|c| c.get(1))
        .or_else(|| {
            SINGLE_QUOTED
                .captures(text)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
        })
        .map(|m| m.as_str());

    if let Some(brand) = quoted.and_then(clean_brand) {
        return Some(brand);
    }

    NAMED_AFTER_PREPOSITION
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| clean_brand(m.as_str()))
}

fn clean_brand(candidate: &str) -> Option<String> {
    let trimmed = candidate
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '-' || c == '&')
        .trim();

    if trimmed.is_empty() || trimmed.chars().count() > MAX_BRAND_LEN {
        return None;
    }

    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if NOT_A_BRAND.contains(&first_word.as_str()) {
        return None;
    }

    Some(trimmed.to_string())
}
