use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginHub {
    Kutaisi,
    Tbilisi,
    Batumi,
}

impl OriginHub {
    pub const ALL: [OriginHub; 3] = [Self::Kutaisi, Self::Tbilisi, Self::Batumi];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "kutaisi" | "kut" | "кутаиси" => Some(Self::Kutaisi),
            "tbilisi" | "tbs" | "тбилиси" => Some(Self::Tbilisi),
            "batumi" | "bus" | "батуми" => Some(Self::Batumi),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Kutaisi => "kutaisi",
            Self::Tbilisi => "tbilisi",
            Self::Batumi => "batumi",
        }
    }

    pub fn display_name(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Kutaisi, Language::En) => "Kutaisi",
            (Self::Kutaisi, Language::Ru) => "Кутаиси",
            (Self::Tbilisi, Language::En) => "Tbilisi",
            (Self::Tbilisi, Language::Ru) => "Тбилиси",
            (Self::Batumi, Language::En) => "Batumi",
            (Self::Batumi, Language::Ru) => "Батуми",
        }
    }
}

impl fmt::Display for OriginHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn from_optional_str(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "ru" || v == "ru-ru" || v == "russian" => Self::Ru,
            _ => Self::En,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }
}

/// Trip parameters collected from the user for one planning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub origin_hub: OriginHub,
    pub duration_label: String,
    #[serde(default)]
    pub interest_tags: BTreeSet<String>,
    #[serde(default)]
    pub free_text_wish: Option<String>,
    #[serde(default)]
    pub language: Language,
    pub travel_date: NaiveDate,
}

impl PlanRequest {
    /// A request is plannable once it names at least one interest or carries a wish.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_tag = self.interest_tags.iter().any(|tag| !tag.trim().is_empty());
        let has_wish = self
            .free_text_wish
            .as_deref()
            .map(|wish| !wish.trim().is_empty())
            .unwrap_or(false);

        if has_tag || has_wish {
            Ok(())
        } else {
            Err(ValidationError::MissingPreferences)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("plan request needs at least one interest tag or a free-text wish")]
    MissingPreferences,
}

impl ValidationError {
    pub fn user_message(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::MissingPreferences, Language::En) => {
                "Pick at least one interest or tell us what you would like to see."
            }
            (Self::MissingPreferences, Language::Ru) => {
                "Выберите хотя бы один интерес или опишите, что хотите увидеть."
            }
        }
    }
}

/// Multi-stop itinerary. `stops` is display order; the first and last entries are the endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub stops: Vec<String>,
    #[serde(default)]
    pub total_distance_km: f64,
    #[serde(default)]
    pub duration_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Route {
    pub const MIN_STOPS: usize = 2;

    pub fn is_structurally_valid(&self) -> bool {
        self.stops.len() >= Self::MIN_STOPS
            && self.stops.iter().all(|stop| !stop.trim().is_empty())
            && self.total_distance_km.is_finite()
            && self.total_distance_km >= 0.0
    }

    pub fn start(&self) -> Option<&str> {
        self.stops.first().map(String::as_str)
    }

    pub fn end(&self) -> Option<&str> {
        self.stops.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Missing or invalid credentials/configuration. Retrying cannot help.
    #[error("fatal inference error: {0}")]
    Fatal(String),
    #[error("transient inference error: {0}")]
    Transient(String),
    #[error("inference call exceeded its {}ms deadline", .0.as_millis())]
    Timeout(Duration),
}

impl CallError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fatal(_) => "fatal",
            Self::Transient(_) => "transient",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Raw model text on success, classified failure otherwise.
pub type CallOutcome = Result<String, CallError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    fixed_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, fixed_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            fixed_delay,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn fixed_delay(&self) -> Duration {
        self.fixed_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000))
    }
}
