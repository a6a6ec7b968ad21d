//! # Front-End Selector
//!
//! Exactly one network exposure mechanism is chosen from `PROXY_OPTION` and
//! started before the listener is bound:
//!
//! | Option | Alias | What happens |
//! |---|---|---|
//! | `tunnel` | `ngrok` | spawn the tunnel agent, wait for its public URL, keep it alive while serving |
//! | `reverse-proxy` | `nginx` | run `nginx -c <conf>` and wait for it to exit successfully |
//! | `cert-managed-proxy` | `smallstep` | run `step certificates renew --daemon` and wait for it to exit successfully |
//!
//! Any other value, including an empty one, is a startup error. The choice is
//! made once; there is no switching at runtime.

mod process;
mod tunnel;

pub use process::{run_to_completion, ProcessConfig};
pub use tunnel::{TunnelConfig, TunnelGuard};

use crate::error::{Result, RollgateError};
use std::fmt;
use tracing::info;

/// The recognised `PROXY_OPTION` values, without their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEndKind {
    Tunnel,
    ReverseProxy,
    CertManagedProxy,
}

impl FrontEndKind {
    /// Parse a `PROXY_OPTION` value. Matching ignores case and surrounding
    /// whitespace; the error names the value exactly as given.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tunnel" | "ngrok" => Ok(FrontEndKind::Tunnel),
            "reverse-proxy" | "nginx" => Ok(FrontEndKind::ReverseProxy),
            "cert-managed-proxy" | "smallstep" => Ok(FrontEndKind::CertManagedProxy),
            _ => Err(RollgateError::config(format!(
                "unsupported proxy option: {value:?} (expected tunnel, reverse-proxy or cert-managed-proxy)"
            ))),
        }
    }
}

impl fmt::Display for FrontEndKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrontEndKind::Tunnel => "tunnel",
            FrontEndKind::ReverseProxy => "reverse-proxy",
            FrontEndKind::CertManagedProxy => "cert-managed-proxy",
        })
    }
}

/// A selected front-end together with everything needed to start it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontEnd {
    Tunnel(TunnelConfig),
    ReverseProxy(ProcessConfig),
    CertManagedProxy(ProcessConfig),
}

/// What a started front-end leaves behind for the serving lifetime.
///
/// Only the tunnel holds a live resource; the other two have already run to
/// completion by the time this is returned. Dropping the value releases the
/// tunnel, so the caller keeps it until the server has stopped.
#[derive(Debug)]
pub enum ActiveFrontEnd {
    Tunnel(TunnelGuard),
    ReverseProxy,
    CertManagedProxy,
}

impl FrontEnd {
    pub fn kind(&self) -> FrontEndKind {
        match self {
            FrontEnd::Tunnel(_) => FrontEndKind::Tunnel,
            FrontEnd::ReverseProxy(_) => FrontEndKind::ReverseProxy,
            FrontEnd::CertManagedProxy(_) => FrontEndKind::CertManagedProxy,
        }
    }

    /// Start the front-end. Blocks until the tunnel reports its URL or the
    /// external process exits.
    pub fn launch(&self) -> Result<ActiveFrontEnd> {
        info!(front_end = %self.kind(), "Starting front-end");
        match self {
            FrontEnd::Tunnel(cfg) => {
                let guard = TunnelGuard::open(cfg)?;
                info!(public_url = %guard.public_url(), "Tunnel started");
                Ok(ActiveFrontEnd::Tunnel(guard))
            }
            FrontEnd::ReverseProxy(cfg) => {
                run_to_completion(cfg)?;
                info!(program = %cfg.program, "Reverse proxy started");
                Ok(ActiveFrontEnd::ReverseProxy)
            }
            FrontEnd::CertManagedProxy(cfg) => {
                run_to_completion(cfg)?;
                info!(program = %cfg.program, "Certificate management configured");
                Ok(ActiveFrontEnd::CertManagedProxy)
            }
        }
    }
}

impl ActiveFrontEnd {
    /// Public URL when the front-end is a tunnel.
    pub fn public_url(&self) -> Option<&str> {
        match self {
            ActiveFrontEnd::Tunnel(guard) => Some(guard.public_url()),
            ActiveFrontEnd::ReverseProxy | ActiveFrontEnd::CertManagedProxy => None,
        }
    }
}
