//! Single-threaded HTTP stub used by the API client and provider tests.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct MockResponse {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: String,
}

impl MockResponse {
    pub fn json(status: u16, reason: &'static str, body: &str) -> Self {
        Self {
            status,
            reason,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn html(status: u16, reason: &'static str, body: &str) -> Self {
        Self {
            status,
            reason,
            content_type: "text/html",
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: thread::JoinHandle<()>,
}

impl MockServer {
    pub fn spawn(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for response in responses {
                let start = Instant::now();
                let mut stream = loop {
                    match listener.accept() {
                        Ok((stream, _)) => break stream,
                        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                            if start.elapsed() > Duration::from_secs(3) {
                                panic!("mock server timed out waiting for request");
                            }
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(error) => panic!("mock server accept failed: {error}"),
                    }
                };
                stream.set_nonblocking(false).expect("blocking stream");

                let cloned = stream.try_clone().expect("clone stream");
                let mut reader = BufReader::new(cloned);
                let mut request = CapturedRequest::default();

                let mut first = true;
                loop {
                    let mut line = String::new();
                    let bytes = reader.read_line(&mut line).expect("read line");
                    if bytes == 0 || line == "\r\n" {
                        break;
                    }
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    if first {
                        request.request_line = line;
                        first = false;
                    } else if let Some((key, value)) = line.split_once(':') {
                        request
                            .headers
                            .push((key.trim().to_string(), value.trim().to_string()));
                    }
                }

                let content_length = request
                    .header("content-length")
                    .and_then(|value| value.parse::<usize>().ok())
                    .unwrap_or(0);
                if content_length > 0 {
                    let mut body = vec![0_u8; content_length];
                    reader.read_exact(&mut body).expect("read body");
                    request.body = String::from_utf8_lossy(&body).into_owned();
                }

                captured.lock().expect("request lock").push(request);

                let response_head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.reason,
                    response.content_type,
                    response.body.len()
                );

                stream
                    .write_all(response_head.as_bytes())
                    .and_then(|_| stream.write_all(response.body.as_bytes()))
                    .expect("write response");
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("request lock").clone()
    }

    pub fn join(self) {
        self.handle.join().expect("mock server thread");
    }
}
