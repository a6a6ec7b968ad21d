//! Error taxonomy shared by the validator, the upstream clients and the
//! front-end launchers.
//!
//! Every failure the service can produce is one [`RollgateError`] variant, and
//! [`RollgateError::status_code`] is the only place that decides which HTTP
//! status a per-request failure is reported with.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = RollgateError> = std::result::Result<T, E>;

/// Every failure the service can produce.
#[derive(Debug, Error)]
pub enum RollgateError {
    /// A required setting is missing, empty or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The inbound routing instruction could not be decoded or is out of range.
    #[error("invalid routing instruction: {0}")]
    Validation(String),

    /// The controller answered with something other than `200 OK`.
    #[error("{call} failed, upstream status code: {status}")]
    UpstreamStatus {
        /// Which upstream operation failed
        call: &'static str,
        /// Status observed on the upstream response
        status: u16,
    },

    /// Connection refused, DNS failure, reset, or an undecodable response body.
    #[error("upstream transport error: {0}")]
    UpstreamTransport(#[source] reqwest::Error),

    /// The upstream call did not complete before its deadline.
    #[error("upstream call timed out after {0:?}")]
    UpstreamTimeout(std::time::Duration),

    /// An external front-end process failed to start or exited unsuccessfully.
    #[error("{program}: {detail}")]
    Process {
        /// Program that was launched
        program: String,
        /// What went wrong
        detail: String,
    },

    /// Socket or filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RollgateError {
    /// Convenience constructor for [`RollgateError::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        RollgateError::Configuration(msg.into())
    }

    /// Convenience constructor for [`RollgateError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        RollgateError::Validation(msg.into())
    }

    /// Convenience constructor for [`RollgateError::Process`].
    pub fn process(program: impl Into<String>, detail: impl Into<String>) -> Self {
        RollgateError::Process {
            program: program.into(),
            detail: detail.into(),
        }
    }

    /// Map a reqwest failure, keeping deadline expiry distinct from other
    /// transport errors.
    pub fn from_transport(err: reqwest::Error, deadline: std::time::Duration) -> Self {
        if err.is_timeout() {
            RollgateError::UpstreamTimeout(deadline)
        } else {
            RollgateError::UpstreamTransport(err)
        }
    }

    /// HTTP status used when this error ends a `/manage-traffic` request.
    ///
    /// | Variant | Status |
    /// |---|---|
    /// | `Validation` | 400 |
    /// | `Configuration`, `Process`, `Io` | 500 |
    /// | `UpstreamStatus`, `UpstreamTransport` | 502 |
    /// | `UpstreamTimeout` | 504 |
    pub fn status_code(&self) -> u16 {
        match self {
            RollgateError::Validation(_) => 400,
            RollgateError::Configuration(_)
            | RollgateError::Process { .. }
            | RollgateError::Io(_) => 500,
            RollgateError::UpstreamStatus { .. } | RollgateError::UpstreamTransport(_) => 502,
            RollgateError::UpstreamTimeout(_) => 504,
        }
    }

    /// True for the variants that originate at the rollout controller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RollgateError::UpstreamStatus { .. }
                | RollgateError::UpstreamTransport(_)
                | RollgateError::UpstreamTimeout(_)
        )
    }
}
