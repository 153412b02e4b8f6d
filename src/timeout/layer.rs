//! Tower middleware applying the race to an inner service.
//!
//! The inner service plays the handler: it runs on the handler task, and the
//! response it returns is streamed frame by frame into the capture. A body
//! that is still streaming at the deadline is cut off and discarded.

use std::pin::pin;
use std::task::{Context, Poll};

use axum::response::Response;
use axum::BoxError;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::Request;
use http_body::Body;
use http_body_util::BodyExt;
use tower::{Layer, Service};

use super::capture::ResponseCapture;
use super::coordinator::RaceCoordinator;
use super::deadline::RequestDeadline;
use super::policy::TimeoutPolicy;

/// Layer that wraps services with [`TimeoutService`].
#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    coordinator: RaceCoordinator,
}

impl TimeoutLayer {
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self {
            coordinator: RaceCoordinator::new(policy),
        }
    }
}

impl Default for TimeoutLayer {
    fn default() -> Self {
        Self::new(TimeoutPolicy::default())
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            coordinator: self.coordinator.clone(),
        }
    }
}

/// Runs the inner service under the layer's [`TimeoutPolicy`].
///
/// The derived [`RequestDeadline`] is inserted into the request extensions.
/// Inner errors are returned unchanged and inner panics are resumed, so an
/// outer `CatchPanicLayer` observes them as if no timeout was in between.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    coordinator: RaceCoordinator,
}

impl<S> TimeoutService<S> {
    pub fn policy(&self) -> &TimeoutPolicy {
        self.coordinator.policy()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TimeoutService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let coordinator = self.coordinator.clone();

        Box::pin(async move {
            let parent = req.extensions().get::<RequestDeadline>().cloned();
            coordinator
                .run(parent.as_ref(), move |deadline, capture| {
                    req.extensions_mut().insert(deadline);
                    async move {
                        let response = inner.call(req).await?;
                        pump_response(response, &capture).await;
                        Ok::<(), S::Error>(())
                    }
                })
                .await
        })
    }
}

/// Replay a response into the capture: headers, status, then each data frame.
async fn pump_response<B>(response: http::Response<B>, capture: &ResponseCapture)
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    for (name, value) in &parts.headers {
        capture.append_header(name.clone(), value.clone());
    }
    capture.set_status(parts.status);

    let mut body = pin!(body);
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                // Trailers are not forwarded
                if let Ok(data) = frame.into_data() {
                    if capture.is_timed_out() {
                        break;
                    }
                    capture.write(&data);
                }
            }
            Err(err) => {
                capture.fail_body(err);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body as AxumBody;
    use http::header::{HeaderValue, CONTENT_TYPE};
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn test_passes_response_through() {
        let svc = TimeoutLayer::default().layer(service_fn(|_req: Request<AxumBody>| async {
            let mut res = http::Response::new(AxumBody::from("created"));
            *res.status_mut() = http::StatusCode::CREATED;
            res.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            Ok::<_, Infallible>(res)
        }));

        let res = svc
            .oneshot(Request::new(AxumBody::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), http::StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"created");
    }

    #[tokio::test]
    async fn test_inserts_request_deadline() {
        let policy = TimeoutPolicy::builder()
            .deadline(Duration::from_secs(2))
            .build()
            .unwrap();
        let svc = TimeoutLayer::new(policy).layer(service_fn(|req: Request<AxumBody>| async move {
            let deadline = req.extensions().get::<RequestDeadline>().cloned();
            let remaining = deadline.map(|d| d.remaining()).unwrap_or_default();
            Ok::<_, Infallible>(http::Response::new(AxumBody::from(
                remaining.as_millis().to_string(),
            )))
        }));

        let res = svc
            .oneshot(Request::new(AxumBody::empty()))
            .await
            .unwrap();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let remaining: u128 = std::str::from_utf8(&body).unwrap().parse().unwrap();
        assert!(remaining > 1000 && remaining <= 2000);
    }

    #[tokio::test]
    async fn test_inner_error_is_returned() {
        let svc = TimeoutLayer::default().layer(service_fn(|_req: Request<AxumBody>| async {
            Err::<http::Response<AxumBody>, _>("inner failed")
        }));

        let err = svc
            .oneshot(Request::new(AxumBody::empty()))
            .await
            .unwrap_err();
        assert_eq!(err, "inner failed");
    }
}
