use may_minihttp::Request;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// The parts of an inbound request the service looks at.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    /// HTTP method as sent (GET, POST, ...)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Raw request body; decoding is up to the handler
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Strip the query string from a request target.
pub fn path_without_query(raw: &str) -> &str {
    raw.split('?').next().unwrap_or("/")
}

/// Extract method, path, headers and body from a `may_minihttp::Request`.
///
/// The body is read last because reading it consumes the request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let path = path_without_query(req.path()).to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let mut body = Vec::new();
    if let Err(e) = req.body().read_to_end(&mut body) {
        // A truncated body fails decoding later and is reported as a 400.
        debug!(error = %e, "Request body read failed");
    }

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        body,
    }
}
