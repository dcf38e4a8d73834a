use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Language;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownLocation {
    pub name_localized: String,
}

/// Static reference data the planner may suggest as stops.
pub trait Gazetteer: Send + Sync {
    fn list_known_locations(&self, language: Language) -> Vec<KnownLocation>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub en: String,
    pub ru: String,
}

#[derive(Debug, Clone)]
pub struct StaticGazetteer {
    entries: Vec<GazetteerEntry>,
}

impl StaticGazetteer {
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        Self { entries }
    }

    /// Loads a JSON array of `{ "en": ..., "ru": ... }` objects.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading gazetteer {}", path.display()))?;
        let entries: Vec<GazetteerEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing gazetteer {}", path.display()))?;
        Ok(Self::new(entries))
    }

    pub fn georgia() -> Self {
        let pairs = [
            ("Kutaisi", "Кутаиси"),
            ("Tbilisi", "Тбилиси"),
            ("Batumi", "Батуми"),
            ("Prometheus Cave", "Пещера Прометея"),
            ("Martvili Canyon", "Каньон Мартвили"),
            ("Okatse Canyon", "Каньон Окаце"),
            ("Sataplia", "Сатаплия"),
            ("Gelati Monastery", "Монастырь Гелати"),
            ("Motsameta", "Моцамета"),
            ("Bagrati Cathedral", "Храм Баграти"),
            ("Tskaltubo", "Цхалтубо"),
            ("Kinchkha Waterfall", "Водопад Кинчха"),
            ("Mtskheta", "Мцхета"),
            ("Jvari Monastery", "Монастырь Джвари"),
            ("Ananuri", "Ананури"),
            ("Gudauri", "Гудаури"),
            ("Stepantsminda", "Степанцминда"),
            ("Gergeti Trinity Church", "Церковь Гергети"),
            ("Uplistsikhe", "Уплисцихе"),
            ("Gori", "Гори"),
            ("Borjomi", "Боржоми"),
            ("Vardzia", "Вардзия"),
            ("Sighnaghi", "Сигнахи"),
            ("Telavi", "Телави"),
            ("Kvareli", "Кварели"),
            ("David Gareja", "Давид Гареджи"),
            ("Gonio Fortress", "Крепость Гонио"),
            ("Makhuntseti Waterfall", "Водопад Махунцети"),
            ("Batumi Botanical Garden", "Батумский ботанический сад"),
            ("Mtirala National Park", "Национальный парк Мтирала"),
            ("Kobuleti", "Кобулети"),
            ("Ureki", "Уреки"),
            ("Mestia", "Местиа"),
            ("Ushguli", "Ушгули"),
            ("Zugdidi", "Зугдиди"),
            ("Enguri Dam", "Ингури ГЭС"),
            ("Chiatura", "Чиатура"),
            ("Katskhi Pillar", "Кацхийский столп"),
            ("Racha", "Рача"),
            ("Shaori Lake", "Озеро Шаори"),
        ];

        Self::new(
            pairs
                .iter()
                .map(|(en, ru)| GazetteerEntry {
                    en: en.to_string(),
                    ru: ru.to_string(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Gazetteer for StaticGazetteer {
    fn list_known_locations(&self, language: Language) -> Vec<KnownLocation> {
        self.entries
            .iter()
            .map(|entry| KnownLocation {
                name_localized: match language {
                    Language::En => entry.en.clone(),
                    Language::Ru => entry.ru.clone(),
                },
            })
            .collect()
    }
}
