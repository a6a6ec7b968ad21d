use crate::config::{ServiceConfig, UpstreamCredentials};
use crate::error::{Result, RollgateError};
use crate::instruction::RoutingInstruction;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Anything that can apply a [`RoutingInstruction`].
///
/// The HTTP handler only depends on this trait, so it can be driven by the
/// real [`RolloutsClient`] or by a stand-in in tests.
pub trait RolloutController: Send + Sync {
    /// Apply one instruction. `Ok(())` means the controller accepted it.
    fn set_weight(&self, instruction: &RoutingInstruction) -> Result<()>;
}

/// Argo Rollouts API client for the traffic endpoint.
///
/// Issues `PUT {base}/api/v1/namespaces/{namespace}/rollouts/{name}/traffic`
/// with a bearer token and the instruction as a JSON body.
#[derive(Clone)]
pub struct RolloutsClient {
    http: reqwest::blocking::Client,
    credentials: UpstreamCredentials,
    timeout: Duration,
}

impl RolloutsClient {
    /// `http` should come from [`super::build_http_client`] with the same
    /// `timeout`, which is only used to report deadline expiry.
    pub fn new(
        http: reqwest::blocking::Client,
        credentials: UpstreamCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            timeout,
        }
    }

    /// Client for the credentials and deadline in `config`, with its own
    /// HTTP client.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(
            super::build_http_client(config.upstream_timeout)?,
            config.rollouts.clone(),
            config.upstream_timeout,
        ))
    }

    /// Target URL for an instruction. Path segments are percent-encoded.
    pub fn traffic_url(&self, instruction: &RoutingInstruction) -> String {
        format!(
            "{}/api/v1/namespaces/{}/rollouts/{}/traffic",
            self.credentials.base(),
            urlencoding::encode(instruction.namespace()),
            urlencoding::encode(instruction.name()),
        )
    }
}

impl RolloutController for RolloutsClient {
    fn set_weight(&self, instruction: &RoutingInstruction) -> Result<()> {
        // Checked per call as well as at startup: a client built with empty
        // credentials must never touch the network.
        self.credentials.require("ARGOROLLOUTS_URL", "ARGOROLLOUTS_TOKEN")?;

        let body = serde_json::to_vec(instruction)
            .map_err(|e| RollgateError::validation(e.to_string()))?;
        let url = self.traffic_url(instruction);
        debug!(url = %url, body_size_bytes = body.len(), "Sending traffic update");

        let start = Instant::now();
        let response = self
            .http
            .put(&url)
            .bearer_auth(self.credentials.token.trim())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| RollgateError::from_transport(e, self.timeout))?;

        let status = response.status().as_u16();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if status != 200 {
            warn!(
                rollout = %instruction,
                status,
                elapsed_ms,
                "Argo Rollouts rejected traffic update"
            );
            return Err(RollgateError::UpstreamStatus {
                call: "manage Argo Rollouts traffic",
                status,
            });
        }

        info!(rollout = %instruction, elapsed_ms, "Traffic weight applied");
        Ok(())
    }
}
