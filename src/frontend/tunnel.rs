use crate::error::{Result, RollgateError};
use serde::Deserialize;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const API_TIMEOUT: Duration = Duration::from_secs(2);

/// How to start the tunnel agent and where to ask it for its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Base URL of the agent's local API, e.g. `http://127.0.0.1:4040`
    pub api_url: String,
    pub startup_timeout: Duration,
}

impl TunnelConfig {
    /// `ngrok http <port>`, queried through its local agent API.
    pub fn ngrok(program: impl Into<String>, api_url: impl Into<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args: vec!["http".to_string(), port.to_string()],
            api_url: api_url.into(),
            startup_timeout: Duration::from_secs(15),
        }
    }

    fn tunnels_url(&self) -> String {
        format!("{}/api/tunnels", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
}

#[derive(Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
}

/// Owns the running tunnel agent.
///
/// The agent stays up for as long as the guard lives and is killed when it
/// drops. Keep the guard alive until the HTTP server has stopped.
#[derive(Debug)]
pub struct TunnelGuard {
    program: String,
    child: Child,
    public_url: String,
}

impl TunnelGuard {
    /// Spawn the agent and wait until it reports a public URL.
    ///
    /// Fails if the agent cannot be spawned, exits early, or reports nothing
    /// before `startup_timeout`. On failure the agent is killed.
    pub fn open(cfg: &TunnelConfig) -> Result<Self> {
        let child = Command::new(&cfg.program)
            .args(&cfg.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RollgateError::process(&cfg.program, format!("failed to start: {e}")))?;
        let mut guard = TunnelGuard {
            program: cfg.program.clone(),
            child,
            public_url: String::new(),
        };
        debug!(pid = guard.child.id(), program = %cfg.program, "Tunnel agent spawned");

        let api = reqwest::blocking::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| RollgateError::process(&cfg.program, format!("agent api client: {e}")))?;
        let tunnels_url = cfg.tunnels_url();
        let deadline = Instant::now() + cfg.startup_timeout;

        loop {
            if let Some(status) = guard.child.try_wait()? {
                return Err(RollgateError::process(
                    &cfg.program,
                    format!("exited before the tunnel came up ({status})"),
                ));
            }
            match fetch_public_url(&api, &tunnels_url) {
                Some(url) => {
                    guard.public_url = url;
                    return Ok(guard);
                }
                None if Instant::now() >= deadline => {
                    return Err(RollgateError::process(
                        &cfg.program,
                        format!(
                            "no public URL reported by {tunnels_url} within {:?}",
                            cfg.startup_timeout
                        ),
                    ));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Whether the agent process is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!(program = %self.program, error = %e, "Failed to stop tunnel agent");
            return;
        }
        let _ = self.child.wait();
        info!(program = %self.program, "Tunnel closed");
    }
}

/// Ask the agent for its tunnels; prefer an https endpoint.
fn fetch_public_url(api: &reqwest::blocking::Client, url: &str) -> Option<String> {
    let response = api.get(url).send().ok()?;
    if !response.status().is_success() {
        return None;
    }
    let list: TunnelList = response.json().ok()?;
    pick_public_url(list.tunnels)
}

fn pick_public_url(tunnels: Vec<TunnelInfo>) -> Option<String> {
    let https = tunnels
        .iter()
        .position(|t| t.proto == "https" && !t.public_url.is_empty());
    let mut tunnels = tunnels;
    match https {
        Some(i) => Some(tunnels.swap_remove(i).public_url),
        None => tunnels
            .into_iter()
            .map(|t| t.public_url)
            .find(|u| !u.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(url: &str, proto: &str) -> TunnelInfo {
        TunnelInfo {
            public_url: url.to_string(),
            proto: proto.to_string(),
        }
    }

    #[test]
    fn test_prefers_https() {
        let picked = pick_public_url(vec![
            info("http://abc.ngrok.io", "http"),
            info("https://abc.ngrok.io", "https"),
        ]);
        assert_eq!(picked.as_deref(), Some("https://abc.ngrok.io"));
    }

    #[test]
    fn test_falls_back_to_any_url() {
        let picked =
            pick_public_url(vec![info("", "https"), info("tcp://0.tcp.ngrok.io:1", "tcp")]);
        assert_eq!(picked.as_deref(), Some("tcp://0.tcp.ngrok.io:1"));
        assert!(pick_public_url(vec![]).is_none());
    }

    #[test]
    fn test_ngrok_config() {
        let cfg = TunnelConfig::ngrok("ngrok", "http://127.0.0.1:4040/", 8080);
        assert_eq!(cfg.args, vec!["http", "8080"]);
        assert_eq!(cfg.tunnels_url(), "http://127.0.0.1:4040/api/tunnels");
    }
}
