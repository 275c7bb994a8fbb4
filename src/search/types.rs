//! Raw API payloads and their normalised form

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// EU member states; EUIPO marks are in force in each of them
pub const EU_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

const IMAGE_BASE_URL: &str = "https://img.tmsearch.ai/img/210";

/// Display name of a trademark office, falling back to the code itself
pub fn office_name(code: &str) -> &str {
    match code {
        "WO" => "WIPO",
        "EU" | "EM" => "EUIPO",
        "DE" => "DPMA",
        "US" => "USPTO",
        "UK" | "GB" => "UKIPO",
        "FR" | "BR" => "INPI",
        "ES" => "OEPM",
        "IT" => "UIBM",
        "CH" => "IGE",
        "AT" => "ÖPA",
        "TR" => "TÜRKPATENT",
        "CN" => "CNIPA",
        "JP" => "JPO",
        "KR" => "KIPO",
        "AU" => "IP Australia",
        "CA" => "CIPO",
        "RU" => "ROSPATENT",
        "IN" => "CGPDTM",
        other => other,
    }
}

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Deserialize)]
pub(super) struct RawSearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub result: Vec<RawTrademark>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTrademark {
    pub mid: u64,
    #[serde(default)]
    pub verbal: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub class: Vec<u8>,
    /// Filing office (sic)
    #[serde(default)]
    pub submition: Option<String>,
    #[serde(default)]
    pub protection: Vec<String>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub reg: Option<String>,
    #[serde(default)]
    pub date: RawDates,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawDates {
    pub applied: Option<String>,
    pub granted: Option<String>,
    pub expiration: Option<String>,
}

// ============================================================
// Normalised types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrademarkStatus {
    Active,
    Expired,
    Unknown,
}

impl TrademarkStatus {
    fn from_api(status: Option<&str>) -> Self {
        match status {
            Some("LIVE") => TrademarkStatus::Active,
            Some("DEAD") => TrademarkStatus::Expired,
            _ => TrademarkStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trademark {
    pub mid: u64,
    pub name: String,
    pub status: TrademarkStatus,
    /// Filing office code
    pub office: String,
    pub designation_countries: Vec<String>,
    pub nice_classes: Vec<u8>,
    pub application_number: String,
    pub registration_number: String,
    pub application_date: Option<NaiveDate>,
    pub registration_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    /// Similarity score, 0..=100
    pub accuracy: u8,
}

impl From<RawTrademark> for Trademark {
    fn from(raw: RawTrademark) -> Self {
        let name = raw
            .verbal
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("TM-{}", raw.mid));

        Self {
            mid: raw.mid,
            name,
            status: TrademarkStatus::from_api(raw.status.as_deref()),
            office: raw.submition.unwrap_or_default(),
            designation_countries: raw.protection,
            nice_classes: raw.class,
            application_number: raw.app.unwrap_or_default(),
            registration_number: raw.reg.unwrap_or_default(),
            application_date: parse_date(raw.date.applied.as_deref()),
            registration_date: parse_date(raw.date.granted.as_deref()),
            expiry_date: parse_date(raw.date.expiration.as_deref()),
            image_url: raw
                .img
                .filter(|i| !i.is_empty())
                .map(|i| format!("{IMAGE_BASE_URL}/{i}")),
            accuracy: clamp_accuracy(raw.accuracy),
        }
    }
}

/// Normalised search response
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Total hit count reported by the API (before filtering)
    pub total: u64,
    pub results: Vec<Trademark>,
    /// Number of hits removed by local filters
    pub filtered: usize,
}

/// API dates are `YYYYMMDD`
fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?, "%Y%m%d").ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=100 first
fn clamp_accuracy(value: Option<f64>) -> u8 {
    value
        .filter(|v| v.is_finite())
        .map_or(0, |v| v.round().clamp(0.0, 100.0) as u8)
}
