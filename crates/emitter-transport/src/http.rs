//! HTTP transport over reqwest.

use crate::{Request, RequestOutcome, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use emitter_config::{HttpMethod, NetworkConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// `Accept` value sent with every request.
pub const ACCEPT_CONTENT: &str =
    "text/html, application/x-www-form-urlencoded, text/plain, image/gif";
/// `Content-Type` of POST bodies.
pub const POST_CONTENT_TYPE: &str = "application/json; charset=utf-8";
/// Header asking the collector not to record IP and network user id.
pub const ANONYMOUS_HEADER: &str = "SP-Anonymous";

/// Delivers requests to a collector over HTTP(S).
///
/// One call to [`Transport::send`] is one HTTP exchange. The client enforces
/// the configured timeout; redirects and non-2xx responses are reported as
/// status codes, never retried here.
pub struct HttpTransport {
    client: Client,
    get_url: Url,
    post_url: Url,
    method: HttpMethod,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig) -> TransportResult<Self> {
        let get_url = NetworkConfig {
            method: HttpMethod::Get,
            ..config.clone()
        }
        .collector_url()?;
        let post_url = NetworkConfig {
            method: HttpMethod::Post,
            ..config.clone()
        }
        .collector_url()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.request_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            get_url,
            post_url,
            method: config.method,
            headers,
        })
    }

    /// URL requests of `method` are sent to.
    pub fn url(&self, method: HttpMethod) -> &Url {
        match method {
            HttpMethod::Get => &self.get_url,
            HttpMethod::Post => &self.post_url,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn method(&self) -> HttpMethod {
        self.method
    }

    async fn send(&self, request: &Request) -> RequestOutcome {
        let builder = match request.method {
            HttpMethod::Get => {
                let mut url = self.get_url.clone();
                url.set_query(Some(&request.get_query()));
                self.client.get(url)
            }
            HttpMethod::Post => {
                let body = match request.post_body() {
                    Ok(body) => body,
                    Err(e) => return RequestOutcome::transport_failure(request, e.to_string()),
                };
                self.client
                    .post(self.post_url.clone())
                    .header(CONTENT_TYPE, POST_CONTENT_TYPE)
                    .body(body)
            }
        };

        let mut builder = builder
            .header(ACCEPT, ACCEPT_CONTENT)
            .headers(self.headers.clone());
        if request.anonymous {
            builder = builder.header(ANONYMOUS_HEADER, "*");
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(
                    request_id = %request.request_id,
                    method = %request.method,
                    events = request.len(),
                    status,
                    "Request sent"
                );
                RequestOutcome::from_status(request, status)
            }
            Err(e) => {
                warn!(
                    request_id = %request.request_id,
                    events = request.len(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "Request got no response"
                );
                RequestOutcome::transport_failure(request, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::Payload;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 collector: records each raw request and answers
    /// with `status` (or never answers when `hang` is set).
    struct MockCollector {
        addr: std::net::SocketAddr,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockCollector {
        async fn start(status: u16, hang: bool) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = requests.clone();

            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let raw = read_request(&mut socket).await;
                        recorded.lock().unwrap().push(raw);
                        if hang {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            return;
                        }
                        let response = format!(
                            "HTTP/1.1 {status} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { addr, requests }
        }

        fn endpoint(&self) -> String {
            format!("http://{}", self.addr)
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn payload() -> Payload {
        Payload::new().with("e", "pv").with("url", "https://a.example/page")
    }

    #[tokio::test]
    async fn test_post_sends_envelope_and_headers() {
        let collector = MockCollector::start(200, false).await;
        let mut config = NetworkConfig::new(collector.endpoint(), HttpMethod::Post);
        config
            .request_headers
            .insert("X-Tenant".to_string(), "acme".to_string());
        let transport = HttpTransport::new(&config).unwrap();

        let request =
            Request::new(HttpMethod::Post, vec![(1, payload()), (2, payload())]).with_anonymous(true);
        let outcome = transport.send(&request).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.event_ids, vec![1, 2]);

        let raw = &collector.requests()[0];
        assert!(raw.starts_with("POST /com.snowplowanalytics.snowplow/tp2 HTTP/1.1"));
        let lower = raw.to_ascii_lowercase();
        assert!(lower.contains("content-type: application/json; charset=utf-8"));
        assert!(lower.contains("sp-anonymous: *"));
        assert!(lower.contains("x-tenant: acme"));
        assert!(raw.contains(crate::PAYLOAD_DATA_SCHEMA));
    }

    #[tokio::test]
    async fn test_get_sends_query() {
        let collector = MockCollector::start(200, false).await;
        let config = NetworkConfig::new(collector.endpoint(), HttpMethod::Get);
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.method(), HttpMethod::Get);

        let request = Request::new(HttpMethod::Get, vec![(5, payload())]);
        let outcome = transport.send(&request).await;
        assert!(outcome.succeeded());

        let raw = &collector.requests()[0];
        assert!(raw.starts_with("GET /i?e=pv&url=https%3A%2F%2Fa.example%2Fpage HTTP/1.1"));
        assert!(!raw.to_ascii_lowercase().contains("sp-anonymous"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_retried() {
        let collector = MockCollector::start(503, false).await;
        let config = NetworkConfig::new(collector.endpoint(), HttpMethod::Post);
        let transport = HttpTransport::new(&config).unwrap();

        let request = Request::new(HttpMethod::Post, vec![(1, payload())]);
        let outcome = transport.send(&request).await;

        assert_eq!(outcome.status_code, Some(503));
        assert!(!outcome.succeeded());
        assert_eq!(collector.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let collector = MockCollector::start(200, true).await;
        let config = NetworkConfig {
            timeout_secs: 1,
            ..NetworkConfig::new(collector.endpoint(), HttpMethod::Post)
        };
        let transport = HttpTransport::new(&config).unwrap();

        let outcome = transport
            .send(&Request::new(HttpMethod::Post, vec![(1, payload())]))
            .await;
        assert!(outcome.is_transport_failure());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = NetworkConfig::new(format!("http://{addr}"), HttpMethod::Get);
        let transport = HttpTransport::new(&config).unwrap();
        let outcome = transport
            .send(&Request::new(HttpMethod::Get, vec![(1, payload())]))
            .await;
        assert!(outcome.is_transport_failure());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = NetworkConfig::new("c.example.com", HttpMethod::Post);
        config
            .request_headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_urls_for_both_methods() {
        let config = NetworkConfig::new("c.example.com", HttpMethod::Post);
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url(HttpMethod::Get).as_str(), "https://c.example.com/i");
        assert_eq!(
            transport.url(HttpMethod::Post).as_str(),
            "https://c.example.com/com.snowplowanalytics.snowplow/tp2"
        );
    }
}
