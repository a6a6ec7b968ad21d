//! The `/manage-traffic` handler.
//!
//! One inbound request becomes at most one upstream call:
//!
//! 1. method other than `POST` → 405, nothing forwarded
//! 2. body decoded and checked → 400 on failure, nothing forwarded
//! 3. instruction forwarded → 200 on success, otherwise the error's own status
//!    (see [`RollgateError::status_code`])

use crate::error::RollgateError;
use crate::instruction::RoutingInstruction;
use crate::metrics::TrafficMetrics;
use crate::upstream::RolloutController;
use std::time::Instant;
use tracing::{info, warn};

/// Body returned when the controller accepted the instruction.
pub const CONFIRMATION: &str = "Argo Rollouts traffic managed successfully.\n";

/// Body returned for any method other than `POST`.
pub const METHOD_NOT_ALLOWED: &str = "Unsupported request method.\n";

/// Status and plain-text body produced by [`manage_traffic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn ok() -> Self {
        Reply {
            status: 200,
            body: CONFIRMATION.to_string(),
        }
    }

    fn error(err: &RollgateError) -> Self {
        Reply {
            status: err.status_code(),
            body: format!("{err}\n"),
        }
    }
}

pub fn manage_traffic(
    method: &str,
    body: &[u8],
    controller: &dyn RolloutController,
    metrics: &TrafficMetrics,
) -> Reply {
    metrics.record_request();

    if method != "POST" {
        metrics.record_method_not_allowed();
        return Reply {
            status: 405,
            body: METHOD_NOT_ALLOWED.to_string(),
        };
    }

    let instruction = match RoutingInstruction::parse(body) {
        Ok(ins) => ins,
        Err(err) => {
            info!(error = %err, "Routing instruction rejected");
            metrics.record_failure(&err);
            return Reply::error(&err);
        }
    };

    let start = Instant::now();
    let outcome = controller.set_weight(&instruction);
    metrics.record_forward_latency(start.elapsed());

    match outcome {
        Ok(()) => {
            metrics.record_forwarded();
            Reply::ok()
        }
        Err(err) => {
            warn!(
                rollout = %instruction,
                error = %err,
                status = err.status_code(),
                "Traffic update failed"
            );
            metrics.record_failure(&err);
            Reply::error(&err)
        }
    }
}
