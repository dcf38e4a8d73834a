//! Tolerant extraction of a [`Route`] from free-form model output.
//!
//! Models wrap JSON in prose or markdown fences, so the matcher is permissive
//! about *where* the object sits and strict about its shape once found:
//!
//! 1. [`find_fenced_block`]: a fenced block tagged `json`.
//! 2. [`find_first_object`]: otherwise the first balanced `{ ... }` span.
//!
//! The candidate is parsed with `serde_json` and validated by [`route_from_value`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::Route;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[ \t]*json\b[ \t]*\r?\n?(.*?)```").expect("valid fenced block regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("no JSON object found in response")]
    NoObject,
    #[error("response JSON is malformed: {0}")]
    Malformed(String),
    #[error("response JSON is not an object")]
    NotAnObject,
    #[error("route has no stops")]
    MissingStops,
    #[error("route stops are invalid: {0}")]
    InvalidStops(String),
}

pub fn extract_route(raw: &str) -> Result<Route, ExtractionFailure> {
    let candidate = find_fenced_block(raw)
        .or_else(|| find_first_object(raw))
        .ok_or(ExtractionFailure::NoObject)?;

    let value: Value = serde_json::from_str(candidate)
        .map_err(|err| ExtractionFailure::Malformed(err.to_string()))?;

    route_from_value(&value)
}

/// Body of the first ```` ```json ```` fenced block, trimmed.
pub fn find_fenced_block(raw: &str) -> Option<&str> {
    FENCED_JSON
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim())
}

/// First top-level `{ ... }` span. Braces inside string literals are ignored.
pub fn find_first_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in raw[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

pub fn route_from_value(value: &Value) -> Result<Route, ExtractionFailure> {
    let object = value.as_object().ok_or(ExtractionFailure::NotAnObject)?;

    let items = match object.get("stops") {
        None | Some(Value::Null) => return Err(ExtractionFailure::MissingStops),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ExtractionFailure::InvalidStops(format!(
                "expected an array, got {other}"
            )))
        }
    };

    if items.is_empty() {
        return Err(ExtractionFailure::MissingStops);
    }

    let stops = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::trim)
                .filter(|stop| !stop.is_empty())
                .map(ToString::to_string)
                .ok_or_else(|| ExtractionFailure::InvalidStops(format!("unusable stop {item}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if stops.len() < Route::MIN_STOPS {
        return Err(ExtractionFailure::InvalidStops(format!(
            "need at least {} stops, got {}",
            Route::MIN_STOPS,
            stops.len()
        )));
    }

    let total_distance_km = field(object, &["totalDistanceKm", "total_distance_km"])
        .and_then(number_from)
        .filter(|km| km.is_finite() && *km > 0.0)
        .unwrap_or(0.0);

    let duration_label = field(object, &["durationLabel", "duration_label"])
        .and_then(Value::as_str)
        .map(|label| label.trim().to_string())
        .unwrap_or_default();

    let reasoning = field(object, &["reasoning"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string);

    Ok(Route {
        stops,
        total_distance_km,
        duration_label,
        reasoning,
    })
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .trim_end_matches("km")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }
}
