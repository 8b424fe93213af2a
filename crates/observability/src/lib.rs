use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    chat_requests_total: AtomicU64,
    chat_fallback_total: AtomicU64,
    typo_corrections_total: AtomicU64,
    submissions_total: AtomicU64,
    submissions_rejected_total: AtomicU64,
    insights_refresh_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub chat_requests_total: u64,
    pub chat_fallback_total: u64,
    pub typo_corrections_total: u64,
    pub submissions_total: u64,
    pub submissions_rejected_total: u64,
    pub insights_refresh_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_chat_request(&self) {
        self.chat_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_chat_fallback(&self) {
        self.chat_fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_typo_corrections(&self, count: u64) {
        self.typo_corrections_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_submission(&self) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_submission_rejected(&self) {
        self.submissions_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_insights_refresh(&self) {
        self.insights_refresh_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.chat_requests_total.load(Ordering::Relaxed)
            + self.submissions_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            chat_requests_total: self.chat_requests_total.load(Ordering::Relaxed),
            chat_fallback_total: self.chat_fallback_total.load(Ordering::Relaxed),
            typo_corrections_total: self.typo_corrections_total.load(Ordering::Relaxed),
            submissions_total: self.submissions_total.load(Ordering::Relaxed),
            submissions_rejected_total: self.submissions_rejected_total.load(Ordering::Relaxed),
            insights_refresh_total: self.insights_refresh_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,verdant_cli=info,verdant_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = AppMetrics::default();
        metrics.inc_chat_request();
        metrics.inc_chat_request();
        metrics.add_typo_corrections(3);
        metrics.inc_submission();
        metrics.inc_submission_rejected();
        metrics.observe_latency(Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chat_requests_total, 2);
        assert_eq!(snapshot.typo_corrections_total, 3);
        assert_eq!(snapshot.submissions_total, 1);
        assert_eq!(snapshot.submissions_rejected_total, 1);
        assert!((snapshot.avg_latency_millis - 10.0).abs() < 1e-9);
    }
}
