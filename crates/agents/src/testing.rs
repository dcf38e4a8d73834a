use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::{self, BoxFuture, FutureExt};
use waypoint_core::{
    CallError, CallOutcome, FallbackCatalog, Language, OriginHub, PlanRequest, RetryPolicy,
    StaticGazetteer,
};
use waypoint_observability::AppMetrics;

use crate::config::PlannerSettings;
use crate::inference::InferenceClient;
use crate::RoutePlanner;

#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(CallError),
    Hang,
}

/// Plays `steps` in order; the last step repeats once the script runs out.
pub struct ScriptedInference {
    steps: Vec<Step>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl InferenceClient for ScriptedInference {
    fn invoke<'a>(&'a self, prompt: &'a str, _language: Language) -> BoxFuture<'a, CallOutcome> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let step = self
            .steps
            .get(index)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Step::Hang);

        match step {
            Step::Reply(text) => future::ready(Ok(text)).boxed(),
            Step::Fail(err) => future::ready(Err(err)).boxed(),
            Step::Hang => future::pending().boxed(),
        }
    }
}

pub fn fast_settings() -> PlannerSettings {
    PlannerSettings {
        retry: RetryPolicy::new(3, Duration::from_millis(5)),
        deadline: Duration::from_millis(50),
        ..PlannerSettings::default()
    }
}

pub fn planner_with(inference: Arc<ScriptedInference>) -> (RoutePlanner, Arc<AppMetrics>) {
    let metrics = AppMetrics::shared();
    let planner = RoutePlanner::new(
        inference,
        Arc::new(StaticGazetteer::georgia()),
        Arc::new(FallbackCatalog::builtin()),
        Arc::clone(&metrics),
        fast_settings(),
    );
    (planner, metrics)
}

pub fn nature_request(hub: OriginHub, language: Language) -> PlanRequest {
    PlanRequest {
        origin_hub: hub,
        duration_label: "1 day".to_string(),
        interest_tags: ["nature".to_string()].into_iter().collect(),
        free_text_wish: None,
        language,
        travel_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
    }
}
