use http::StatusCode;
use may_minihttp::Response;
use serde_json::Value;

fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Write a `text/plain` response.
pub fn write_text(res: &mut Response, status: u16, body: String) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: text/plain; charset=utf-8");
    res.body_vec(body.into_bytes());
}

/// Write an `application/json` response.
pub fn write_json(res: &mut Response, status: u16, body: Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(502), "Bad Gateway");
        assert_eq!(status_reason(504), "Gateway Timeout");
        assert_eq!(status_reason(799), "Unknown");
    }
}
