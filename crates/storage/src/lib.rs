use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use waypoint_core::{Language, OriginHub, Route};

/// A route the traveller committed to for a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: String,
    pub origin_hub: OriginHub,
    pub language: Language,
    pub travel_date: NaiveDate,
    pub route: Route,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    pub fn accepted(
        origin_hub: OriginHub,
        language: Language,
        travel_date: NaiveDate,
        route: Route,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            origin_hub,
            language,
            travel_date,
            route,
            created_at: Utc::now(),
        }
    }
}

pub trait TourRepository: Send + Sync {
    async fn save(&self, tour: &Tour) -> Result<()>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Tour>>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tours: Arc<RwLock<Vec<Tour>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TourRepository for MemoryStore {
    async fn save(&self, tour: &Tour) -> Result<()> {
        let mut tours = self.tours.write();
        match tours.iter_mut().find(|existing| existing.id == tour.id) {
            Some(existing) => *existing = tour.clone(),
            None => tours.push(tour.clone()),
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Tour>> {
        let mut tours = self.tours.read().clone();
        tours.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tours)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // every in-memory connection is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tours (
              id TEXT PRIMARY KEY,
              origin_hub TEXT NOT NULL,
              language TEXT NOT NULL,
              travel_date TEXT NOT NULL,
              route_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl TourRepository for SqliteStore {
    async fn save(&self, tour: &Tour) -> Result<()> {
        let route_json = serde_json::to_string(&tour.route)?;

        sqlx::query(
            r#"
            INSERT INTO tours (id, origin_hub, language, travel_date, route_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
              origin_hub=excluded.origin_hub,
              language=excluded.language,
              travel_date=excluded.travel_date,
              route_json=excluded.route_json
            "#,
        )
        .bind(&tour.id)
        .bind(tour.origin_hub.as_code())
        .bind(tour.language.as_code())
        .bind(tour.travel_date.format("%Y-%m-%d").to_string())
        .bind(route_json)
        .bind(tour.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Tour>> {
        let rows = sqlx::query(
            r#"
            SELECT id, origin_hub, language, travel_date, route_json, created_at
            FROM tours
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<Tour> {
                let id: String = row.get("id");
                let hub: String = row.get("origin_hub");
                let origin_hub = OriginHub::parse(&hub)
                    .with_context(|| format!("tour {} has unknown origin hub {}", id, hub))?;
                let language =
                    Language::from_optional_str(Some(row.get::<String, _>("language").as_str()));
                let travel_date = NaiveDate::parse_from_str(
                    row.get::<String, _>("travel_date").as_str(),
                    "%Y-%m-%d",
                )
                .with_context(|| format!("tour {} has a malformed travel date", id))?;
                let route_json: String = row.get("route_json");
                let route = serde_json::from_str(&route_json)
                    .with_context(|| format!("tour {} has a malformed route", id))?;
                let created_at = DateTime::parse_from_rfc3339(
                    row.get::<String, _>("created_at").as_str(),
                )
                .with_context(|| format!("tour {} has a malformed created_at", id))?
                .with_timezone(&Utc);

                Ok(Tour {
                    id,
                    origin_hub,
                    language,
                    travel_date,
                    route,
                    created_at,
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }
}

impl TourRepository for Store {
    async fn save(&self, tour: &Tour) -> Result<()> {
        match self {
            Store::Memory(store) => store.save(tour).await,
            Store::Sqlite(store) => store.save(tour).await,
        }
    }

    async fn list(&self) -> Result<Vec<Tour>> {
        match self {
            Store::Memory(store) => store.list().await,
            Store::Sqlite(store) => store.list().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tour(hub: OriginHub, minutes_ago: i64) -> Tour {
        let mut tour = Tour::accepted(
            hub,
            Language::En,
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            Route {
                stops: vec!["Kutaisi".to_string(), "Gelati Monastery".to_string()],
                total_distance_km: 22.0,
                duration_label: "half day".to_string(),
                reasoning: None,
            },
        );
        tour.created_at = Utc::now() - Duration::minutes(minutes_ago);
        tour
    }

    #[tokio::test]
    async fn memory_store_lists_newest_first() {
        let store = Store::memory();
        let older = tour(OriginHub::Kutaisi, 10);
        let newer = tour(OriginHub::Batumi, 1);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        store.save(&older).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_tours() {
        let store = Store::sqlite("sqlite::memory:").await.unwrap();
        let saved = tour(OriginHub::Tbilisi, 5);
        store.save(&saved).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].origin_hub, OriginHub::Tbilisi);
        assert_eq!(listed[0].route, saved.route);
        assert_eq!(listed[0].travel_date, saved.travel_date);
    }

    #[tokio::test]
    async fn sqlite_store_rejects_corrupt_timestamps() {
        let sqlite = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let saved = tour(OriginHub::Batumi, 3);
        sqlite.save(&saved).await.unwrap();

        sqlx::query("UPDATE tours SET created_at = 'yesterday-ish' WHERE id = ?1")
            .bind(&saved.id)
            .execute(sqlite.pool())
            .await
            .unwrap();

        let err = sqlite.list().await.unwrap_err();
        assert!(format!("{err:#}").contains("malformed created_at"));
    }
}
