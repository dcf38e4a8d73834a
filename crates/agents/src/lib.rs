pub mod config;
pub mod deadline;
pub mod inference;
pub mod retry;
pub mod session;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, instrument, warn};
use waypoint_core::{
    build_route_prompt, extract_route, CallError, FallbackCatalog, Gazetteer, PlanRequest, Route,
    ValidationError,
};
use waypoint_observability::AppMetrics;

pub use config::{InferenceConfig, PlannerSettings};
pub use deadline::race;
pub use inference::{InferenceClient, OpenAiInference};
pub use retry::{call_with_retry, RetryableError};
pub use session::{fallback_notice, PlanningSession, SessionError, SessionPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Fatal,
    Transient,
    Timeout,
    Extraction,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Extraction => "extraction",
        }
    }
}

impl From<&CallError> for FallbackReason {
    fn from(err: &CallError) -> Self {
        match err {
            CallError::Fatal(_) => Self::Fatal,
            CallError::Transient(_) => Self::Transient,
            CallError::Timeout(_) => Self::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Model,
    Fallback(FallbackReason),
}

/// Builds a route for a request: model first, canned catalog entry on any failure.
#[derive(Clone)]
pub struct RoutePlanner {
    inference: Arc<dyn InferenceClient>,
    gazetteer: Arc<dyn Gazetteer>,
    catalog: Arc<FallbackCatalog>,
    metrics: Arc<AppMetrics>,
    settings: PlannerSettings,
}

impl RoutePlanner {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        gazetteer: Arc<dyn Gazetteer>,
        catalog: Arc<FallbackCatalog>,
        metrics: Arc<AppMetrics>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            inference,
            gazetteer,
            catalog,
            metrics,
            settings,
        }
    }

    /// OpenAI-backed planner configured from `WAYPOINT_*` environment variables.
    pub fn from_env(metrics: Arc<AppMetrics>) -> Result<Self> {
        let inference = OpenAiInference::new(InferenceConfig::from_env())?;
        if !inference.is_configured() {
            warn!("inference credential missing or malformed; every plan will use the fallback catalog");
        }

        Ok(Self::new(
            Arc::new(inference),
            config::gazetteer_from_env()?,
            Arc::new(FallbackCatalog::builtin()),
            metrics,
            PlannerSettings::from_env(),
        ))
    }

    pub fn with_settings(mut self, settings: PlannerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &FallbackCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    /// Resolves to a structurally valid route for every valid request. The only
    /// error is a validation failure, raised before any call is attempted.
    pub async fn plan(&self, req: &PlanRequest) -> Result<Route, ValidationError> {
        self.plan_with_source(req).await.map(|(route, _)| route)
    }

    #[instrument(skip(self, req), fields(hub = %req.origin_hub, language = req.language.as_code()))]
    pub async fn plan_with_source(
        &self,
        req: &PlanRequest,
    ) -> Result<(Route, RouteSource), ValidationError> {
        if let Err(err) = req.validate() {
            self.metrics.inc_validation_rejection();
            info!(error = %err, "plan request rejected");
            return Err(err);
        }

        let started = Instant::now();
        self.metrics.inc_plan();

        let (route, source) = match self.request_model_route(req).await {
            Ok(route) => {
                self.metrics.inc_model_route();
                (route, RouteSource::Model)
            }
            Err(reason) => {
                self.metrics.inc_fallback(reason.as_str());
                (self.catalog.synthesize(req), RouteSource::Fallback(reason))
            }
        };

        self.metrics.observe_latency(started.elapsed());
        info!(
            source = ?source,
            stops = route.stops.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route planned"
        );

        Ok((route, source))
    }

    async fn request_model_route(&self, req: &PlanRequest) -> Result<Route, FallbackReason> {
        let known_locations = self
            .gazetteer
            .list_known_locations(req.language)
            .into_iter()
            .take(self.settings.max_known_locations)
            .map(|location| location.name_localized)
            .collect::<Vec<_>>();
        let prompt = build_route_prompt(req, &known_locations);
        let language = req.language;
        let deadline = self.settings.deadline;

        let raw = call_with_retry(&self.settings.retry, || {
            self.metrics.inc_call_attempt();
            let inference = Arc::clone(&self.inference);
            let metrics = Arc::clone(&self.metrics);
            let prompt = prompt.clone();

            async move {
                let outcome = race(
                    async move { inference.invoke(&prompt, language).await },
                    deadline,
                )
                .await;
                if let Err(err) = &outcome {
                    record_call_error(&metrics, err);
                }
                outcome
            }
        })
        .await
        .map_err(|err| {
            if err.is_fatal() {
                error!(error = %err, "inference misconfigured, serving fallback");
            } else {
                warn!(kind = err.kind(), error = %err, "inference unavailable, serving fallback");
            }
            FallbackReason::from(&err)
        })?;

        let mut route = extract_route(&raw).map_err(|failure| {
            self.metrics.inc_extraction_failure();
            warn!(error = %failure, "model reply is not a usable route, serving fallback");
            FallbackReason::Extraction
        })?;

        if route.duration_label.is_empty() {
            route.duration_label = req.duration_label.clone();
        }

        Ok(route)
    }
}

fn record_call_error(metrics: &AppMetrics, err: &CallError) {
    match err {
        CallError::Fatal(_) => metrics.inc_fatal_error(),
        CallError::Transient(_) => metrics.inc_transient_error(),
        CallError::Timeout(_) => metrics.inc_timeout(),
    }
}
