use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Language, OriginHub, PlanRequest, Route};

/// Canned itinerary served when the model path produces nothing usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stops: Vec<String>,
    pub total_distance_km: f64,
    pub duration_label: String,
    pub reasoning_en: String,
    pub reasoning_ru: String,
}

impl CatalogEntry {
    pub fn to_route(&self, language: Language) -> Route {
        let reasoning = match language {
            Language::En => &self.reasoning_en,
            Language::Ru => &self.reasoning_ru,
        };

        Route {
            stops: self.stops.clone(),
            total_distance_km: self.total_distance_km,
            duration_label: self.duration_label.clone(),
            reasoning: Some(reasoning.clone()),
        }
    }

    fn check(&self, hub: OriginHub) -> Result<(), CatalogError> {
        if self.stops.len() < Route::MIN_STOPS || self.stops.iter().any(|s| s.trim().is_empty()) {
            return Err(CatalogError::TooFewStops(hub));
        }
        if !self.total_distance_km.is_finite() || self.total_distance_km < 0.0 {
            return Err(CatalogError::InvalidDistance(hub));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("fallback route for {0} needs at least two non-blank stops")]
    TooFewStops(OriginHub),
    #[error("fallback route for {0} has a negative or non-finite distance")]
    InvalidDistance(OriginHub),
}

/// Read-only hub -> route mapping. The default hub's entry always exists, so
/// synthesis cannot fail.
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    default_hub: OriginHub,
    default_entry: CatalogEntry,
    entries: HashMap<OriginHub, CatalogEntry>,
}

impl FallbackCatalog {
    pub fn new(default_hub: OriginHub, default_entry: CatalogEntry) -> Result<Self, CatalogError> {
        default_entry.check(default_hub)?;
        Ok(Self {
            default_hub,
            default_entry,
            entries: HashMap::new(),
        })
    }

    pub fn with_entry(mut self, hub: OriginHub, entry: CatalogEntry) -> Result<Self, CatalogError> {
        entry.check(hub)?;
        if hub == self.default_hub {
            self.default_entry = entry;
        } else {
            self.entries.insert(hub, entry);
        }
        Ok(self)
    }

    /// Built-in Georgian day trips, Kutaisi as the default hub.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            OriginHub::Tbilisi,
            entry(
                &["Tbilisi", "Mtskheta", "Ananuri", "Stepantsminda", "Tbilisi"],
                310.0,
                "Classic Georgian Military Road loop: the old capital, a fortress above the reservoir and the Kazbegi views.",
                "Классика Военно-Грузинской дороги: древняя столица, крепость над водохранилищем и виды Казбеги.",
            ),
        );
        entries.insert(
            OriginHub::Batumi,
            entry(
                &["Batumi", "Gonio Fortress", "Makhuntseti Waterfall", "Batumi"],
                70.0,
                "A short Adjara loop mixing Roman ruins, a mountain waterfall and the seaside.",
                "Короткая петля по Аджарии: римская крепость, горный водопад и море.",
            ),
        );

        Self {
            default_hub: OriginHub::Kutaisi,
            default_entry: entry(
                &["Kutaisi", "Prometheus Cave", "Martvili Canyon", "Kutaisi"],
                130.0,
                "A compact Imereti nature day: karst caves in the morning, canyon boats after lunch.",
                "Компактный день природы Имеретии: карстовые пещеры утром, лодки в каньоне после обеда.",
            ),
            entries,
        }
    }

    pub fn default_hub(&self) -> OriginHub {
        self.default_hub
    }

    pub fn entry(&self, hub: OriginHub) -> &CatalogEntry {
        if hub == self.default_hub {
            return &self.default_entry;
        }
        self.entries.get(&hub).unwrap_or(&self.default_entry)
    }

    pub fn synthesize(&self, req: &PlanRequest) -> Route {
        self.entry(req.origin_hub).to_route(req.language)
    }
}

fn entry(stops: &[&str], km: f64, reasoning_en: &str, reasoning_ru: &str) -> CatalogEntry {
    CatalogEntry {
        stops: stops.iter().map(|stop| stop.to_string()).collect(),
        total_distance_km: km,
        duration_label: "1 day".to_string(),
        reasoning_en: reasoning_en.to_string(),
        reasoning_ru: reasoning_ru.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(hub: OriginHub, language: Language) -> PlanRequest {
        PlanRequest {
            origin_hub: hub,
            duration_label: "1 day".to_string(),
            interest_tags: ["nature".to_string()].into_iter().collect(),
            free_text_wish: None,
            language,
            travel_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        }
    }

    #[test]
    fn builtin_entries_are_valid() {
        let catalog = FallbackCatalog::builtin();
        for hub in OriginHub::ALL {
            assert!(catalog.entry(hub).check(hub).is_ok());
            assert!(catalog
                .synthesize(&request(hub, Language::En))
                .is_structurally_valid());
        }
    }

    #[test]
    fn kutaisi_fallback_matches_catalog() {
        let route = FallbackCatalog::builtin().synthesize(&request(OriginHub::Kutaisi, Language::En));
        assert_eq!(
            route.stops,
            vec!["Kutaisi", "Prometheus Cave", "Martvili Canyon", "Kutaisi"]
        );
        assert_eq!(route.total_distance_km, 130.0);
    }

    #[test]
    fn synthesis_is_deterministic_and_localized() {
        let catalog = FallbackCatalog::builtin();
        let en = request(OriginHub::Batumi, Language::En);
        assert_eq!(catalog.synthesize(&en), catalog.synthesize(&en));

        let ru = catalog.synthesize(&request(OriginHub::Batumi, Language::Ru));
        assert_eq!(ru.stops, catalog.synthesize(&en).stops);
        assert_ne!(ru.reasoning, catalog.synthesize(&en).reasoning);
    }

    #[test]
    fn missing_hub_uses_default_entry() {
        let catalog = FallbackCatalog::new(
            OriginHub::Tbilisi,
            entry(&["Tbilisi", "Sighnaghi", "Tbilisi"], 230.0, "wine", "вино"),
        )
        .unwrap();
        let route = catalog.synthesize(&request(OriginHub::Batumi, Language::En));
        assert_eq!(route.stops, vec!["Tbilisi", "Sighnaghi", "Tbilisi"]);
        assert_eq!(route.reasoning.as_deref(), Some("wine"));
    }

    #[test]
    fn rejects_invalid_entries() {
        let short = entry(&["Batumi"], 10.0, "", "");
        assert_eq!(
            FallbackCatalog::new(OriginHub::Batumi, short).unwrap_err(),
            CatalogError::TooFewStops(OriginHub::Batumi)
        );
        let negative = entry(&["Batumi", "Kobuleti"], -1.0, "", "");
        assert!(FallbackCatalog::builtin()
            .with_entry(OriginHub::Batumi, negative)
            .is_err());
    }
}
