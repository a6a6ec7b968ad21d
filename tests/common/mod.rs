#![allow(dead_code)]

pub mod http {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Status, lowercase headers and body of a raw HTTP response.
    pub struct RawResponse {
        pub status: u16,
        pub headers: HashMap<String, String>,
        pub body: String,
    }

    /// Send a raw request and read one response, honouring Content-Length.
    pub fn send_request(addr: &SocketAddr, req: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let mut buf = Vec::new();
        let mut header_end = None;
        let mut expected_len = None;
        // Upstream timeouts in tests run for a few seconds; allow for them.
        for _ in 0..40 {
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if header_end.is_some() {
                        break;
                    }
                    continue;
                }
                Err(e) => panic!("read error: {:?}", e),
            }
            if header_end.is_none() {
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    header_end = Some(pos + 4);
                    let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                    expected_len = head.lines().find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.trim()
                            .eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    });
                }
            }
            if let (Some(end), Some(len)) = (header_end, expected_len) {
                if buf.len() >= end + len {
                    break;
                }
            }
        }
        parse_response(&String::from_utf8_lossy(&buf))
    }

    pub fn parse_response(resp: &str) -> RawResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        RawResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    pub fn request(addr: &SocketAddr, method: &str, path: &str, body: &str) -> RawResponse {
        let req = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        send_request(addr, &req)
    }

    pub fn post_json(addr: &SocketAddr, path: &str, body: &str) -> RawResponse {
        request(addr, "POST", path, body)
    }
}

pub mod upstream {
    use std::io::Read;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// One request as seen by the mock controller.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: String,
        pub url: String,
        pub authorization: Option<String>,
        pub content_type: Option<String>,
        pub body: String,
    }

    /// A `tiny_http` stand-in for Argo Rollouts / Argo CD / the tunnel agent
    /// API. Answers every request with a fixed status and body and records
    /// what it received.
    pub struct MockUpstream {
        addr: SocketAddr,
        server: Arc<tiny_http::Server>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        thread: Option<JoinHandle<()>>,
    }

    impl MockUpstream {
        pub fn start(status: u16) -> Self {
            Self::start_with(status, "{}", Duration::ZERO)
        }

        pub fn start_with_body(status: u16, body: &str) -> Self {
            Self::start_with(status, body, Duration::ZERO)
        }

        pub fn start_with_delay(status: u16, delay: Duration) -> Self {
            Self::start_with(status, "{}", delay)
        }

        fn start_with(status: u16, body: &str, delay: Duration) -> Self {
            let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
            let addr = server.server_addr().to_ip().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let srv = Arc::clone(&server);
            let recorded = Arc::clone(&requests);
            let body = body.to_string();
            let thread = thread::spawn(move || {
                for mut rq in srv.incoming_requests() {
                    let mut req_body = String::new();
                    let _ = rq.as_reader().read_to_string(&mut req_body);
                    let header = |name: &str| {
                        rq.headers()
                            .iter()
                            .find(|h| h.field.equiv(name))
                            .map(|h| h.value.as_str().to_string())
                    };
                    let entry = RecordedRequest {
                        method: rq.method().to_string(),
                        url: rq.url().to_string(),
                        authorization: header("Authorization"),
                        content_type: header("Content-Type"),
                        body: req_body,
                    };
                    recorded.lock().unwrap().push(entry);
                    let response = tiny_http::Response::from_string(body.clone())
                        .with_status_code(status)
                        .with_header(
                            "Content-Type: application/json"
                                .parse::<tiny_http::Header>()
                                .unwrap(),
                        );
                    if delay.is_zero() {
                        let _ = rq.respond(response);
                    } else {
                        // Delayed answers must not hold up the next request.
                        thread::spawn(move || {
                            thread::sleep(delay);
                            let _ = rq.respond(response);
                        });
                    }
                }
            });
            Self {
                addr,
                server,
                requests,
                thread: Some(thread),
            }
        }

        pub fn base_url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Drop for MockUpstream {
        fn drop(&mut self) {
            self.server.unblock();
            if let Some(t) = self.thread.take() {
                let _ = t.join();
            }
        }
    }
}

pub mod test_server {
    use rollgate::config::UpstreamCredentials;
    use rollgate::metrics::TrafficMetrics;
    use rollgate::server::{HttpServer, ServerHandle, TrafficService};
    use rollgate::upstream::{
        build_http_client, PooledController, RolloutController, RolloutsClient, UpstreamPool,
    };
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Once};
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// A running `TrafficService` on an ephemeral port, stopped on drop.
    pub struct TestServer {
        handle: Option<ServerHandle>,
        addr: SocketAddr,
        pub metrics: Arc<TrafficMetrics>,
    }

    impl TestServer {
        pub fn with_controller(controller: Arc<dyn RolloutController>) -> Self {
            setup_may_runtime();
            let metrics = Arc::new(TrafficMetrics::new());
            let service = TrafficService::new(controller, Arc::clone(&metrics));
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let handle = HttpServer(service).start(addr).unwrap();
            handle.wait_ready().unwrap();
            Self {
                handle: Some(handle),
                addr,
                metrics,
            }
        }

        /// Serve with a real `RolloutsClient` pointed at `base_url`, run on an
        /// upstream pool as `rollgate serve` does.
        pub fn forwarding_to(base_url: &str, token: &str, timeout: Duration) -> Self {
            Self::forwarding_with_workers(base_url, token, timeout, 4)
        }

        pub fn forwarding_with_workers(
            base_url: &str,
            token: &str,
            timeout: Duration,
            workers: usize,
        ) -> Self {
            let client = RolloutsClient::new(
                build_http_client(timeout).unwrap(),
                UpstreamCredentials::new(base_url, token),
                timeout,
            );
            let pool = Arc::new(UpstreamPool::new(workers).unwrap());
            Self::with_controller(Arc::new(PooledController::new(Arc::new(client), pool)))
        }

        pub fn addr(&self) -> SocketAddr {
            self.addr
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }
}
