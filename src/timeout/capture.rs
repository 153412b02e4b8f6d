//! Response capture buffer.
//!
//! # Responsibilities
//! - Stand in for the real response sink while the handler runs
//! - Hold status, headers and body until the race is decided
//! - Absorb writes that arrive after the timeout response was sent
//!
//! # Design Decisions
//! - One mutex guards every field; commits hold it for their whole duration
//! - First status wins, a body write implicitly commits 200
//! - The real sink is taken by value, so it can only be committed once

use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::response::Response;
use axum::BoxError;
use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;

use super::policy::TimeoutPolicy;

/// The real response handed back to the host pipeline.
#[derive(Debug, Default)]
pub struct ResponseSink {
    response: Response,
}

impl ResponseSink {
    /// An empty `200 OK` response with no headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers already present on the real response.
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    fn finish(mut self, status: StatusCode, body: Body) -> Response {
        *self.response.status_mut() = status;
        *self.response.body_mut() = body;
        self.response
    }
}

impl From<Response> for ResponseSink {
    fn from(response: Response) -> Self {
        Self { response }
    }
}

#[derive(Debug, Default)]
struct Pending {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: BytesMut,
    body_error: Option<BoxError>,
    header_committed: bool,
    timed_out: bool,
    committed: bool,
}

/// Buffers a handler's response until the coordinator commits or discards it.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    guard: Mutex<Pending>,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic, but a handler panicking elsewhere must not
    // lock the coordinator out of the commit.
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a header, replacing any previous values under `name`.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    /// Add a header value, keeping previous values under `name`.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.append(name, value);
    }

    /// Record the status. Only the first call takes effect.
    pub fn set_status(&self, status: StatusCode) {
        let mut pending = self.lock();
        if !pending.header_committed {
            pending.status = Some(status);
            pending.header_committed = true;
        }
    }

    /// Append body bytes, committing status 200 first if no status was set.
    ///
    /// Returns the number of bytes accepted. Writes after a timeout are
    /// accepted but never reach the client.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut pending = self.lock();
        if !pending.header_committed {
            pending.status = Some(StatusCode::OK);
            pending.header_committed = true;
        }
        pending.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Record that the handler's body stream broke after the bytes written so far.
    pub fn fail_body(&self, err: impl Into<BoxError>) {
        let mut pending = self.lock();
        if pending.body_error.is_none() {
            pending.body_error = Some(err.into());
        }
    }

    /// Status the handler chose, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Whether the timeout response has been committed.
    pub fn is_timed_out(&self) -> bool {
        self.lock().timed_out
    }

    /// Number of body bytes currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.lock().body.len()
    }

    /// Commit the handler's output: buffered headers onto the sink, then the
    /// status (200 if never set), then the body verbatim.
    pub fn commit_normal(&self, mut sink: ResponseSink) -> Response {
        let mut pending = self.lock();
        debug_assert!(!pending.committed, "response committed twice");
        pending.committed = true;

        let headers = std::mem::take(&mut pending.headers);
        let dst = sink.response.headers_mut();
        let mut last_name = None;
        for (name, value) in headers {
            // `None` means another value for the previous name
            match name {
                Some(name) => {
                    dst.insert(name.clone(), value);
                    last_name = Some(name);
                }
                None => {
                    if let Some(name) = &last_name {
                        dst.append(name.clone(), value);
                    }
                }
            }
        }

        let status = pending.status.unwrap_or(StatusCode::OK);
        let bytes = pending.body.split().freeze();
        let body = match pending.body_error.take() {
            Some(err) => Body::from_stream(futures_util::stream::iter([
                Ok::<Bytes, BoxError>(bytes),
                Err(err),
            ])),
            None => Body::from(bytes),
        };

        sink.finish(status, body)
    }

    /// Commit the policy's timeout response, discarding everything buffered.
    /// Later handler writes are absorbed.
    pub fn commit_timeout(&self, sink: ResponseSink, policy: &TimeoutPolicy) -> Response {
        let mut pending = self.lock();
        debug_assert!(!pending.committed, "response committed twice");
        pending.committed = true;

        let response = sink.finish(
            policy.timeout_status(),
            Body::from(policy.timeout_body().clone()),
        );
        pending.timed_out = true;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    async fn body_bytes(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_first_status_wins() {
        let capture = ResponseCapture::new();
        capture.set_status(StatusCode::CREATED);
        capture.set_status(StatusCode::NOT_FOUND);
        assert_eq!(capture.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn test_write_commits_implicit_ok() {
        let capture = ResponseCapture::new();
        assert_eq!(capture.write(b"abc"), 3);
        capture.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(capture.status(), Some(StatusCode::OK));
        assert_eq!(capture.buffered_len(), 3);
    }

    #[tokio::test]
    async fn test_commit_normal_merges_headers() {
        let capture = ResponseCapture::new();
        capture.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        capture.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        capture.append_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("a"),
        );
        capture.append_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("b"),
        );
        capture.set_status(StatusCode::ACCEPTED);
        capture.write(b"{\"hello\"");
        capture.write(b"}");

        let mut existing = Response::default();
        existing
            .headers_mut()
            .insert("server", HeaderValue::from_static("test"));
        let response = capture.commit_normal(ResponseSink::from(existing));

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["server"], "test");
        let traces: Vec<_> = response.headers().get_all("x-trace").iter().collect();
        assert_eq!(traces, ["a", "b"]);
        assert_eq!(body_bytes(response).await.as_ref(), b"{\"hello\"}");
    }

    #[tokio::test]
    async fn test_commit_normal_defaults_to_ok() {
        let capture = ResponseCapture::new();
        let response = capture.commit_normal(ResponseSink::new());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_timeout_discards_buffered_output() {
        let policy = TimeoutPolicy::builder()
            .timeout_status(StatusCode::REQUEST_TIMEOUT)
            .timeout_body("request has timeout")
            .build()
            .unwrap();

        let capture = ResponseCapture::new();
        capture.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        capture.set_status(StatusCode::OK);
        capture.write(b"partial");

        let response = capture.commit_timeout(ResponseSink::new(), &policy);
        assert!(capture.is_timed_out());
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(body_bytes(response).await.as_ref(), b"request has timeout");

        // Late writes are absorbed without touching the sent response
        capture.write(b" more");
        capture.set_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(capture.buffered_len(), "partial more".len());
    }

    #[tokio::test]
    async fn test_body_error_is_surfaced_after_buffered_bytes() {
        let capture = ResponseCapture::new();
        capture.write(b"head");
        capture.fail_body("stream reset");

        let response = capture.commit_normal(ResponseSink::new());
        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap().as_ref(), b"head");
        assert!(body.frame().await.unwrap().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_after_timeout() {
        let policy = TimeoutPolicy::default();
        let capture = Arc::new(ResponseCapture::new());
        let start = Arc::new(Barrier::new(5));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let capture = capture.clone();
                let start = start.clone();
                tokio::spawn(async move {
                    start.wait().await;
                    for _ in 0..100 {
                        capture.write(b"x");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        // Release the writers and commit while they are still writing
        start.wait().await;
        let response = capture.commit_timeout(ResponseSink::new(), &policy);
        for writer in writers {
            writer.await.unwrap();
        }

        assert!(capture.is_timed_out());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_bytes(response).await.as_ref(),
            policy.timeout_body().as_ref()
        );
        assert_eq!(capture.buffered_len(), 400);
    }
}
