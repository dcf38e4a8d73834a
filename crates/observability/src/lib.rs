use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    plans_total: AtomicU64,
    model_routes_total: AtomicU64,
    fallback_total: AtomicU64,
    call_attempts_total: AtomicU64,
    fatal_errors_total: AtomicU64,
    transient_errors_total: AtomicU64,
    timeouts_total: AtomicU64,
    extraction_failures_total: AtomicU64,
    validation_rejections_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub plans_total: u64,
    pub model_routes_total: u64,
    pub fallback_total: u64,
    pub call_attempts_total: u64,
    pub fatal_errors_total: u64,
    pub transient_errors_total: u64,
    pub timeouts_total: u64,
    pub extraction_failures_total: u64,
    pub validation_rejections_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_plan(&self) {
        self.plans_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_plans_total").increment(1);
    }

    pub fn inc_model_route(&self) {
        self.model_routes_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_model_routes_total").increment(1);
    }

    pub fn inc_fallback(&self, reason: &'static str) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_fallback_total", "reason" => reason).increment(1);
    }

    pub fn inc_call_attempt(&self) {
        self.call_attempts_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_call_attempts_total").increment(1);
    }

    pub fn inc_fatal_error(&self) {
        self.fatal_errors_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_call_errors_total", "kind" => "fatal").increment(1);
    }

    pub fn inc_transient_error(&self) {
        self.transient_errors_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_call_errors_total", "kind" => "transient").increment(1);
    }

    pub fn inc_timeout(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_call_errors_total", "kind" => "timeout").increment(1);
    }

    pub fn inc_extraction_failure(&self) {
        self.extraction_failures_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_extraction_failures_total").increment(1);
    }

    pub fn inc_validation_rejection(&self) {
        self.validation_rejections_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("waypoint_validation_rejections_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("waypoint_plan_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let plans = self.plans_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            plans_total: plans,
            model_routes_total: self.model_routes_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            call_attempts_total: self.call_attempts_total.load(Ordering::Relaxed),
            fatal_errors_total: self.fatal_errors_total.load(Ordering::Relaxed),
            transient_errors_total: self.transient_errors_total.load(Ordering::Relaxed),
            timeouts_total: self.timeouts_total.load(Ordering::Relaxed),
            extraction_failures_total: self.extraction_failures_total.load(Ordering::Relaxed),
            validation_rejections_total: self.validation_rejections_total.load(Ordering::Relaxed),
            avg_latency_millis: if plans == 0 {
                0.0
            } else {
                latency as f64 / plans as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,waypoint_api=info,waypoint_agents=info",
                service_name
            ))
        });

        // stdout belongs to command output
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();

        tracing::debug!(service = service_name, "tracing initialised");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_over_plans() {
        let metrics = AppMetrics::default();
        metrics.inc_plan();
        metrics.inc_plan();
        metrics.inc_fallback("timeout");
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.plans_total, 2);
        assert_eq!(snapshot.fallback_total, 1);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }
}
