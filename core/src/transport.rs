//! Executes `HttpRequest`s over the network.
//!
//! # Design
//! `Transport` is the only place that does I/O. `UreqTransport` turns off
//! ureq's status-as-error behavior so 4xx/5xx responses come back as data and
//! status interpretation stays with `ReadingRequests`.
//!
//! The exchange runs on its own thread while the calling thread waits on a
//! channel and checks the call context between waits, so a cancel or a passed
//! deadline returns at once even while ureq is blocked on the socket. The
//! context's remaining time is also the request's global timeout, which ends
//! the abandoned exchange on the worker side. Bodies are read up to a size
//! limit.

use std::io::{self, Read};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::context::CallContext;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body accepted unless configured otherwise.
pub const DEFAULT_BODY_LIMIT: u64 = 10 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;
const CONTEXT_POLL: Duration = Duration::from_millis(10);

/// Executes one HTTP exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse, ClientError>;
}

/// `Transport` backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    timeout: Option<Duration>,
    body_limit: u64,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    /// A transport without its own timeout; only call contexts bound requests.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// A transport that bounds every request by `timeout`, or by the call
    /// context's deadline if that comes sooner.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            timeout,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Reject response bodies longer than `limit` bytes.
    pub fn body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    fn effective_timeout(&self, ctx: &CallContext) -> Option<Duration> {
        match (self.timeout, ctx.remaining()) {
            (Some(own), Some(left)) => Some(own.min(left)),
            (own, left) => own.or(left),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse, ClientError> {
        ctx.check()?;
        let timeout = self.effective_timeout(ctx);
        debug!(method = %request.method, url = %request.url, ?timeout, "sending request");

        let agent = self.agent.clone();
        let body_limit = self.body_limit;
        let worker_ctx = ctx.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("reading-client::request".into())
            .spawn(move || {
                let result = exchange(&agent, request, timeout, body_limit, &worker_ctx);
                // The caller may have stopped waiting.
                let _ = tx.send(result);
            })
            .map_err(|e| ClientError::Transport(format!("cannot start request thread: {e}")))?;

        let response = loop {
            match rx.recv_timeout(CONTEXT_POLL) {
                Ok(result) => break result?,
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = ctx.check() {
                        debug!(%err, "abandoning in-flight request");
                        return Err(err);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ClientError::Transport(
                        "request thread ended without a response".to_string(),
                    ))
                }
            }
        };
        ctx.check()?;

        debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

/// One blocking request/response exchange.
fn exchange(
    agent: &Agent,
    request: HttpRequest,
    timeout: Option<Duration>,
    body_limit: u64,
    ctx: &CallContext,
) -> Result<HttpResponse, ClientError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
    } = request;

    let result = match method {
        HttpMethod::Get => {
            let mut builder = agent.get(&url).config().timeout_global(timeout).build();
            for (key, value) in &headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            builder.call()
        }
        HttpMethod::Delete => {
            let mut builder = agent.delete(&url).config().timeout_global(timeout).build();
            for (key, value) in &headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            builder.call()
        }
        HttpMethod::Post => {
            let mut builder = agent.post(&url).config().timeout_global(timeout).build();
            for (key, value) in &headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            match body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    };

    let mut response = result.map_err(map_ureq_error)?;
    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let mut reader = response.body_mut().with_config().limit(body_limit).reader();
    let mut raw = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        ctx.check()?;
        let n = reader.read(&mut chunk).map_err(map_io_error)?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8(raw)
        .map_err(|e| ClientError::Transport(format!("response body is not UTF-8: {e}")))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn map_ureq_error(err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Timeout(_) => ClientError::DeadlineExceeded,
        ureq::Error::BodyExceedsLimit(limit) => {
            ClientError::Transport(format!("response body exceeds {limit} bytes"))
        }
        other => ClientError::Transport(other.to_string()),
    }
}

fn map_io_error(err: io::Error) -> ClientError {
    if err.kind() == io::ErrorKind::TimedOut {
        return ClientError::DeadlineExceeded;
    }
    match err.get_ref().and_then(|inner| inner.downcast_ref::<ureq::Error>()) {
        Some(ureq::Error::Timeout(_)) => ClientError::DeadlineExceeded,
        Some(ureq::Error::BodyExceedsLimit(limit)) => {
            ClientError::Transport(format!("response body exceeds {limit} bytes"))
        }
        _ => ClientError::Transport(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_of_transport_and_context_timeout_wins() {
        let transport = UreqTransport::with_timeout(Some(Duration::from_secs(30)));
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        assert!(transport.effective_timeout(&ctx).unwrap() <= Duration::from_secs(5));

        let ctx = CallContext::background();
        assert_eq!(
            transport.effective_timeout(&ctx),
            Some(Duration::from_secs(30))
        );
        assert_eq!(UreqTransport::new().effective_timeout(&ctx), None);
    }

    #[test]
    fn cancelled_context_fails_before_connecting() {
        let ctx = CallContext::background();
        ctx.cancel();
        // Port 9 (discard) is never contacted because the context is checked first.
        let err = UreqTransport::new()
            .execute(HttpRequest::get("http://127.0.0.1:9/".to_string()), &ctx)
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    /// Serve one connection: read the request head, answer with `body`.
    fn answer_once(body: Vec<u8>) -> std::net::SocketAddr {
        use std::io::Write;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = [0u8; 4096];
            let _ = stream.read(&mut head);
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(&body);
        });
        addr
    }

    #[test]
    fn body_within_limit_is_returned() {
        let addr = answer_once(b"42".to_vec());
        let response = UreqTransport::new()
            .body_limit(16)
            .execute(
                HttpRequest::get(format!("http://{addr}/count")),
                &CallContext::with_timeout(Duration::from_secs(5)),
            )
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "42");
    }

    #[test]
    fn oversized_body_is_rejected() {
        let addr = answer_once(vec![b'a'; 4096]);
        let err = UreqTransport::new()
            .body_limit(1024)
            .execute(
                HttpRequest::get(format!("http://{addr}/")),
                &CallContext::with_timeout(Duration::from_secs(5)),
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    }

    #[test]
    fn cancel_returns_while_waiting_for_headers() {
        // Accepts connections but never answers.
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();
        let ctx = CallContext::background();

        let canceller = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = UreqTransport::new()
            .execute(HttpRequest::get(format!("http://{addr}/")), &ctx)
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
        drop(silent);
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = UreqTransport::new()
            .execute(
                HttpRequest::get(format!("http://{addr}/")),
                &CallContext::with_timeout(Duration::from_secs(5)),
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    }
}
