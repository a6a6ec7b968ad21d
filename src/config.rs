//! # Configuration
//!
//! Everything the service needs is resolved once at startup into a
//! [`ServiceConfig`] and shared by reference afterwards. Nothing reads the
//! process environment after the CLI has been parsed.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `ARGOROLLOUTS_URL` | Argo Rollouts API base URL | required |
//! | `ARGOROLLOUTS_TOKEN` | Bearer token for Argo Rollouts | required |
//! | `ARGOCD_URL` / `ARGOCD_TOKEN` | Argo CD API, `applications` subcommand only | required there |
//! | `PROXY_OPTION` | `tunnel`, `reverse-proxy` or `cert-managed-proxy` | required |
//! | `ROLLGATE_ADDR` | Listen address | `0.0.0.0:8080` |
//! | `ROLLGATE_UPSTREAM_TIMEOUT_SECS` | Deadline for each upstream call | `10` |
//! | `ROLLGATE_STACK_SIZE` | Coroutine stack size, decimal or `0x` hex | `0x8000` |
//!
//! The flag and env wiring lives in [`crate::cli`]; this module only holds the
//! resolved values and their checks.

use crate::error::{Result, RollgateError};
use crate::frontend::FrontEnd;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Default coroutine stack size (32 KB). The blocking HTTP client needs more
/// headroom than a bare echo handler.
pub const DEFAULT_STACK_SIZE: usize = 0x8000;

/// Default deadline for a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URL plus bearer token for one upstream API.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub base_url: String,
    pub token: String,
}

impl UpstreamCredentials {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Non-emptiness check performed before every outbound call.
    ///
    /// `url_var` and `token_var` name the settings in the error message.
    pub fn require(&self, url_var: &str, token_var: &str) -> Result<()> {
        if self.base_url.trim().is_empty() || self.token.trim().is_empty() {
            return Err(RollgateError::config(format!(
                "{url_var} and {token_var} must be set"
            )));
        }
        Ok(())
    }

    /// Startup check: non-empty, and the base URL is an absolute http(s) URL.
    pub fn validate(&self, url_var: &str, token_var: &str) -> Result<()> {
        self.require(url_var, token_var)?;
        let parsed = Url::parse(self.base_url.trim())
            .map_err(|e| RollgateError::config(format!("{url_var} is not a valid URL: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(RollgateError::config(format!(
                "{url_var} must use http or https, got {other}"
            ))),
        }
    }

    /// Base URL with any trailing slash removed, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

// Tokens never reach logs through `{:?}`.
impl fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Coroutine runtime settings.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load from `ROLLGATE_STACK_SIZE`, falling back to [`DEFAULT_STACK_SIZE`].
    pub fn from_env() -> Self {
        let stack_size = env::var("ROLLGATE_STACK_SIZE")
            .ok()
            .and_then(|v| parse_stack_size(&v))
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }

    /// Apply to the global `may` scheduler. Must run before the server starts.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

fn parse_stack_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

/// Fully resolved settings for `rollgate serve`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub rollouts: UpstreamCredentials,
    pub upstream_timeout: Duration,
    /// Size of the thread pool running blocking upstream calls
    pub upstream_workers: usize,
    pub front_end: FrontEnd,
    pub runtime: RuntimeConfig,
}

impl ServiceConfig {
    /// Check everything that must hold before the listener is bound.
    pub fn validate(&self) -> Result<()> {
        self.rollouts.validate("ARGOROLLOUTS_URL", "ARGOROLLOUTS_TOKEN")?;
        if self.upstream_timeout.is_zero() {
            return Err(RollgateError::config("upstream timeout must be greater than zero"));
        }
        if self.upstream_workers == 0 {
            return Err(RollgateError::config("upstream workers must be greater than zero"));
        }
        Ok(())
    }
}
