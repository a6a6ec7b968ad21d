//! Inbound routing instructions.
//!
//! A [`RoutingInstruction`] lives for exactly one request. It is decoded from
//! the request body, checked, forwarded, and dropped. Nothing here keeps state.

use crate::error::{Result, RollgateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest traffic percentage the controller accepts.
pub const MAX_WEIGHT: i64 = 100;

/// Desired traffic weight for one rollout.
///
/// Field order matters: the upstream body is serialized in declaration order
/// (`name`, `namespace`, `weight`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingInstruction {
    name: String,
    namespace: String,
    weight: i64,
}

impl RoutingInstruction {
    /// Build an instruction without checking it. Call [`RoutingInstruction::check`]
    /// before forwarding.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, weight: i64) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            weight,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    /// Structural decoding of a request body.
    ///
    /// Unknown fields are ignored. Missing fields, wrong types, empty bodies and
    /// non-JSON input are all [`RollgateError::Validation`]. No semantic checks
    /// happen here.
    pub fn decode(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| RollgateError::validation(e.to_string()))
    }

    /// Semantic checks applied after decoding.
    ///
    /// `name` and `namespace` must be non-blank and must not contain `/` (each
    /// becomes a single URL path segment). `weight` must lie in `0..=100`.
    pub fn check(self) -> Result<Self> {
        check_segment("name", &self.name)?;
        check_segment("namespace", &self.namespace)?;
        if !(0..=MAX_WEIGHT).contains(&self.weight) {
            return Err(RollgateError::validation(format!(
                "weight must be between 0 and {MAX_WEIGHT}, got {}",
                self.weight
            )));
        }
        Ok(self)
    }

    /// Decode and check in one step, as the handler does.
    pub fn parse(body: &[u8]) -> Result<Self> {
        Self::decode(body)?.check()
    }
}

fn check_segment(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RollgateError::validation(format!("{field} must not be empty")));
    }
    if value.contains('/') {
        return Err(RollgateError::validation(format!(
            "{field} must not contain '/': {value}"
        )));
    }
    Ok(())
}

impl fmt::Display for RoutingInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}={}%", self.namespace, self.name, self.weight)
    }
}
