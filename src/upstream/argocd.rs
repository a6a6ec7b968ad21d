use crate::config::UpstreamCredentials;
use crate::error::{Result, RollgateError};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One entry from `GET /api/v1/applications`. Only the name is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArgoApplication {
    pub metadata: ApplicationMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationMetadata {
    pub name: String,
}

impl ArgoApplication {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Deserialize)]
struct ApplicationList {
    // Argo CD sends `"items": null` for an empty list.
    #[serde(default)]
    items: Option<Vec<ArgoApplication>>,
}

/// Read-only Argo CD client used by `rollgate applications`.
pub struct ArgoCdClient {
    http: reqwest::blocking::Client,
    credentials: UpstreamCredentials,
    timeout: Duration,
}

impl ArgoCdClient {
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

    /// List every application visible to the token.
    pub fn list_applications(&self) -> Result<Vec<ArgoApplication>> {
        self.credentials.require("ARGOCD_URL", "ARGOCD_TOKEN")?;

        let url = format!("{}/api/v1/applications", self.credentials.base());
        debug!(url = %url, "Listing Argo CD applications");
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.credentials.token.trim())
            .send()
            .map_err(|e| RollgateError::from_transport(e, self.timeout))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(RollgateError::UpstreamStatus {
                call: "get Argo CD applications",
                status,
            });
        }

        let list: ApplicationList = response
            .json()
            .map_err(|e| RollgateError::from_transport(e, self.timeout))?;
        Ok(list.items.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_application_list() {
        let body = r#"{"items":[{"metadata":{"name":"guestbook","namespace":"argocd"},"spec":{}}]}"#;
        let list: ApplicationList = serde_json::from_str(body).unwrap();
        let items = list.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name(), "guestbook");
    }

    #[test]
    fn test_decode_null_items() {
        let list: ApplicationList = serde_json::from_str(r#"{"items":null}"#).unwrap();
        assert!(list.items.unwrap_or_default().is_empty());
        let list: ApplicationList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_none());
    }
}
