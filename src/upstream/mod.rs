//! Outbound calls to the Argo control plane.
//!
//! - [`rollouts`] - sets the traffic weight of one rollout (the write path)
//! - [`argocd`] - lists the applications Argo CD knows about (read-only)
//! - [`pool`] - OS threads that run the blocking calls off the `may` workers
//!
//! Both clients share one blocking `reqwest` client built at startup with an
//! explicit request deadline. While serving, traffic updates go through a
//! [`PooledController`] so a slow controller parks only the request's own
//! coroutine. Calls are made exactly once: there is no retry at this layer.

pub mod argocd;
pub mod pool;
pub mod rollouts;

pub use argocd::{ArgoApplication, ArgoCdClient};
pub use pool::{PooledController, UpstreamPool, DEFAULT_UPSTREAM_WORKERS};
pub use rollouts::{RolloutController, RolloutsClient};

use crate::error::Result;
use std::time::Duration;

/// Upper bound on establishing the TCP/TLS connection, independent of the
/// overall request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the shared HTTP client.
///
/// `timeout` bounds the whole request: connect, send, and reading the response.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(concat!("rollgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| crate::error::RollgateError::config(format!("http client: {e}")))?;
    Ok(client)
}
