//! Operator alerting. Settlement raises through this when a durable
//! write or publish exhausts its retry budget and must roll back
//! (spec §4.5, §7). Trimmed from the teacher's `monitoring::alerts`
//! (severity levels, structured fields) down to the one sink this core
//! needs; paging/webhook delivery is out of scope per §1's non-goals
//! on peripheral services.

use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Logs every alert via `tracing`. The default sink in any deployment
/// that hasn't wired up an external one.
#[derive(Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Warning => tracing::warn!(message = %alert.message, "operator alert"),
            AlertSeverity::Critical => error!(message = %alert.message, "operator alert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CapturingSink(Arc<Mutex<Vec<Alert>>>);

    impl AlertSink for CapturingSink {
        fn raise(&self, alert: Alert) {
            self.0.lock().unwrap().push(alert);
        }
    }

    #[test]
    fn sink_receives_raised_alerts() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = CapturingSink(captured.clone());
        sink.raise(Alert {
            severity: AlertSeverity::Critical,
            message: "rollback".into(),
        });
        assert_eq!(captured.lock().unwrap().len(), 1);
    }
}
