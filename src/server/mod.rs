pub mod http_server;
pub mod request;
pub mod response;
pub mod service;
pub mod traffic;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, ParsedRequest};
pub use service::{health_endpoint, metrics_endpoint, TrafficService, MANAGE_TRAFFIC_PATH};
pub use traffic::{manage_traffic, Reply, CONFIRMATION, METHOD_NOT_ALLOWED};
