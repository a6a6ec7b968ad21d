use crate::error::RollgateError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Request counters for `/manage-traffic`, rendered at `/metrics`.
///
/// All counters are relaxed atomics; the struct is shared by every connection
/// coroutine through an `Arc`.
#[derive(Default)]
pub struct TrafficMetrics {
    requests: AtomicUsize,
    forwarded: AtomicUsize,
    rejected: AtomicUsize,
    method_not_allowed: AtomicUsize,
    upstream_failures: AtomicUsize,
    config_failures: AtomicUsize,
    forward_latency_ns: AtomicU64,
    forward_calls: AtomicU64,
}

impl TrafficMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_method_not_allowed(&self) {
        self.method_not_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed request under the bucket matching its error.
    pub fn record_failure(&self, err: &RollgateError) {
        let counter = match err {
            RollgateError::Validation(_) => &self.rejected,
            e if e.is_upstream() => &self.upstream_failures,
            _ => &self.config_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Time spent in the upstream call, successful or not.
    pub fn record_forward_latency(&self, latency: Duration) {
        self.forward_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.forward_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn forwarded_count(&self) -> usize {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn upstream_failure_count(&self) -> usize {
        self.upstream_failures.load(Ordering::Relaxed)
    }

    /// Mean upstream latency, zero before the first call.
    pub fn average_forward_latency(&self) -> Duration {
        let calls = self.forward_calls.load(Ordering::Relaxed);
        if calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.forward_latency_ns.load(Ordering::Relaxed) / calls)
        }
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        format!(
            "# HELP rollgate_requests_total Requests received on /manage-traffic\n\
             # TYPE rollgate_requests_total counter\n\
             rollgate_requests_total {}\n\
             # HELP rollgate_forwarded_total Instructions accepted by Argo Rollouts\n\
             # TYPE rollgate_forwarded_total counter\n\
             rollgate_forwarded_total {}\n\
             # HELP rollgate_rejected_total Requests rejected as invalid\n\
             # TYPE rollgate_rejected_total counter\n\
             rollgate_rejected_total {}\n\
             # HELP rollgate_method_not_allowed_total Requests with a method other than POST\n\
             # TYPE rollgate_method_not_allowed_total counter\n\
             rollgate_method_not_allowed_total {}\n\
             # HELP rollgate_upstream_failures_total Upstream status, transport and timeout failures\n\
             # TYPE rollgate_upstream_failures_total counter\n\
             rollgate_upstream_failures_total {}\n\
             # HELP rollgate_config_failures_total Requests failed on missing configuration\n\
             # TYPE rollgate_config_failures_total counter\n\
             rollgate_config_failures_total {}\n\
             # HELP rollgate_forward_latency_seconds Average upstream call latency\n\
             # TYPE rollgate_forward_latency_seconds gauge\n\
             rollgate_forward_latency_seconds {}\n",
            self.request_count(),
            self.forwarded_count(),
            self.rejected_count(),
            self.method_not_allowed.load(Ordering::Relaxed),
            self.upstream_failure_count(),
            self.config_failures.load(Ordering::Relaxed),
            self.average_forward_latency().as_secs_f64(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_bucketed() {
        let m = TrafficMetrics::new();
        m.record_failure(&RollgateError::validation("x"));
        m.record_failure(&RollgateError::UpstreamStatus {
            call: "manage Argo Rollouts traffic",
            status: 503,
        });
        m.record_failure(&RollgateError::config("x"));
        assert_eq!(m.rejected_count(), 1);
        assert_eq!(m.upstream_failure_count(), 1);
        assert!(m.render().contains("rollgate_config_failures_total 1\n"));
    }

    #[test]
    fn test_average_latency() {
        let m = TrafficMetrics::new();
        assert_eq!(m.average_forward_latency(), Duration::ZERO);
        m.record_forward_latency(Duration::from_millis(10));
        m.record_forward_latency(Duration::from_millis(30));
        assert_eq!(m.average_forward_latency(), Duration::from_millis(20));
    }
}
