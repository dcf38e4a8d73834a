use serde_json::json;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Language, PlanRequest};

/// Upper bound on gazetteer names embedded in one prompt.
pub const MAX_KNOWN_LOCATIONS: usize = 30;
pub const MAX_WISH_GRAPHEMES: usize = 500;

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn truncate_graphemes(input: &str, max: usize) -> String {
    input.graphemes(true).take(max).collect()
}

pub fn build_route_prompt(req: &PlanRequest, known_locations: &[String]) -> String {
    let hub = req.origin_hub.display_name(req.language);

    let allowed = known_locations
        .iter()
        .take(MAX_KNOWN_LOCATIONS)
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    let allowed = if allowed.is_empty() {
        "any well-known place reachable from the start".to_string()
    } else {
        allowed.join(", ")
    };

    let tags = req
        .interest_tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>();
    let tags = if tags.is_empty() {
        "none".to_string()
    } else {
        tags.join(", ")
    };

    let wish = req
        .free_text_wish
        .as_deref()
        .map(normalize_text)
        .filter(|wish| !wish.is_empty())
        .map(|wish| truncate_graphemes(&wish, MAX_WISH_GRAPHEMES))
        .unwrap_or_else(|| "none".to_string());

    let output_language = match req.language {
        Language::En => "English",
        Language::Ru => "Russian",
    };

    let example = json!({
        "stops": [hub, "First sight", "Second sight", hub],
        "totalDistanceKm": 120,
        "durationLabel": req.duration_label,
        "reasoning": "One or two sentences on why this route fits the traveller."
    });

    format!(
        "You are a local tour planner. Build one driving day-trip route.\n\
         Start hub: {hub}\n\
         Duration: {duration}\n\
         Travel date: {date}\n\
         Interests: {tags}\n\
         Traveller wish: {wish}\n\
         Allowed locations: {allowed}\n\
         \n\
         Requirements:\n\
         - The route must start and end at {hub}.\n\
         - Use only the allowed locations for intermediate stops.\n\
         - Write stop names and reasoning in {output_language}.\n\
         - Respond ONLY with a JSON object of exactly this shape and field types, no prose:\n\
         {example:#}",
        duration = req.duration_label,
        date = req.travel_date.format("%Y-%m-%d"),
    )
}
