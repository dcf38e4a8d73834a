pub mod extract;
pub mod fallback;
pub mod gazetteer;
pub mod models;
pub mod prompt;

pub use extract::{extract_route, ExtractionFailure};
pub use fallback::{CatalogEntry, CatalogError, FallbackCatalog};
pub use gazetteer::{Gazetteer, GazetteerEntry, KnownLocation, StaticGazetteer};
pub use models::*;
pub use prompt::{build_route_prompt, normalize_text, MAX_KNOWN_LOCATIONS};
