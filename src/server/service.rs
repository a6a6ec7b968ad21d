use super::request::{parse_request, ParsedRequest};
use super::response::{write_json, write_text};
use super::traffic::manage_traffic;
use crate::ids::RequestId;
use crate::metrics::TrafficMetrics;
use crate::upstream::RolloutController;
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::info_span;

/// Path of the routing endpoint.
pub const MANAGE_TRAFFIC_PATH: &str = "/manage-traffic";

/// The `may_minihttp` service: `/manage-traffic`, `/health` and `/metrics`.
///
/// Cloned once per connection; clones share the controller and the counters.
#[derive(Clone)]
pub struct TrafficService {
    controller: Arc<dyn RolloutController>,
    metrics: Arc<TrafficMetrics>,
}

impl TrafficService {
    pub fn new(controller: Arc<dyn RolloutController>, metrics: Arc<TrafficMetrics>) -> Self {
        Self {
            controller,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<TrafficMetrics> {
        &self.metrics
    }
}

/// Liveness probe returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) {
    write_json(res, 200, json!({ "status": "ok" }));
}

/// Counters in Prometheus text format.
pub fn metrics_endpoint(res: &mut Response, metrics: &TrafficMetrics) {
    write_text(res, 200, metrics.render());
}

impl HttpService for TrafficService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let ParsedRequest {
            method,
            path,
            headers,
            body,
        } = parse_request(req);

        let request_id =
            RequestId::from_header_or_new(headers.get("x-request-id").map(String::as_str));
        let span = info_span!("request", request_id = %request_id, method = %method, path = %path);
        let _entered = span.enter();

        match (method.as_str(), path.as_str()) {
            (_, MANAGE_TRAFFIC_PATH) => {
                let reply = manage_traffic(&method, &body, self.controller.as_ref(), &self.metrics);
                if reply.status == 405 {
                    res.header("Allow: POST");
                }
                write_text(res, reply.status, reply.body);
            }
            ("GET", "/health") => health_endpoint(res),
            ("GET", "/metrics") => metrics_endpoint(res, &self.metrics),
            _ => write_json(
                res,
                404,
                json!({ "error": "Not Found", "method": method, "path": path }),
            ),
        }
        Ok(())
    }
}
