//! # rollgate
//!
//! **rollgate** is a small control-plane shim for progressive delivery. It
//! accepts traffic-weight instructions over HTTP and forwards each one to the
//! Argo Rollouts API as a single authenticated `PUT`.
//!
//! ## Architecture
//!
//! - **[`instruction`]** - decoding and checking inbound routing instructions
//! - **[`upstream`]** - Argo Rollouts (write) and Argo CD (read-only) clients
//! - **[`server`]** - the `may_minihttp` service and the `/manage-traffic` handler
//! - **[`frontend`]** - tunnel, reverse proxy or certificate-managed proxy, chosen once at startup
//! - **[`config`]** - settings resolved once at startup
//! - **[`error`]** - the error taxonomy and its HTTP status mapping
//! - **[`cli`]** - `rollgate serve` and `rollgate applications`
//! - **[`logging`]**, **[`metrics`]**, **[`ids`]** - structured logs, counters, request ids
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as TrafficService<br/>(may_minihttp)
//!     participant Validator as RoutingInstruction
//!     participant Upstream as RolloutsClient
//!     participant Argo as Argo Rollouts
//!
//!     Client->>Server: POST /manage-traffic
//!     alt method is not POST
//!         Server-->>Client: 405 Method Not Allowed
//!     end
//!     Server->>Validator: parse(body)
//!     alt malformed or out of range
//!         Validator-->>Client: 400 Bad Request
//!     end
//!     Server->>Upstream: set_weight(instruction)
//!     Upstream->>Argo: PUT /api/v1/namespaces/{ns}/rollouts/{name}/traffic
//!     alt 200 OK
//!         Server-->>Client: 200 confirmation
//!     else non-200 / transport error
//!         Server-->>Client: 502 Bad Gateway
//!     else deadline exceeded
//!         Server-->>Client: 504 Gateway Timeout
//!     end
//! ```
//!
//! ## Runtime Considerations
//!
//! The server runs on the `may` coroutine runtime, one coroutine per
//! connection. The upstream call is a blocking `reqwest` call bounded by a
//! configurable deadline. It runs on a separate thread pool
//! ([`upstream::UpstreamPool`]) while the connection's coroutine waits, so a
//! stalled controller never holds up the scheduler's worker threads.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rollgate::config::UpstreamCredentials;
//! use rollgate::metrics::TrafficMetrics;
//! use rollgate::server::{HttpServer, TrafficService};
//! use rollgate::upstream::{build_http_client, RolloutsClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_secs(10);
//! let client = RolloutsClient::new(
//!     build_http_client(timeout).unwrap(),
//!     UpstreamCredentials::new("https://rollouts.internal", "token"),
//!     timeout,
//! );
//! let service = TrafficService::new(Arc::new(client), Arc::new(TrafficMetrics::new()));
//! let handle = HttpServer(service).start("0.0.0.0:8080").unwrap();
//! handle.join().unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod frontend;
pub mod ids;
pub mod instruction;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod upstream;

pub use error::{Result, RollgateError};
pub use instruction::RoutingInstruction;
