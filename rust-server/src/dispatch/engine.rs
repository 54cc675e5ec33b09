//! The dispatch engine.
//!
//! Per exchange, strictly in order:
//! 1. parse `signature`, `timestamp`, `nonce` from the query string
//! 2. verify the signature (before the body is touched)
//! 3. buffer the body
//! 4. acquire a pooled [`Request`] and decode into it
//! 5. route and invoke exactly one handler
//!
//! Failures in 1-4 go to the invalid-request handler. The pooled message
//! is released when its guard drops, whatever the exit path.

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Query, Request as HttpRequest};
use axum::http::request::Parts;
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, info};

use super::error::{ConfigError, DispatchError};
use super::handlers::{Handlers, MessageHandler};
use super::router::{route, Route};
use crate::message::{decode_into, Request};
use crate::pool::{Pool, PoolStats};
use crate::signature::check_signature;

/// Default number of idle message objects kept in the pool.
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Default upper bound on a buffered push body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Authentication parameters carried in the query string.
#[derive(Debug, Deserialize)]
struct AuthParams {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

fn require(value: Option<String>, name: &'static str) -> Result<String, DispatchError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DispatchError::MissingParam(name)),
    }
}

/// Authenticated push dispatcher.
///
/// Immutable once built; share it behind an `Arc` across connections.
pub struct Dispatcher {
    token: String,
    max_body_bytes: usize,
    pool: Pool<Request>,
    handlers: Handlers,
}

impl Dispatcher {
    /// Start configuring a dispatcher for the given platform token.
    pub fn builder(token: impl Into<String>) -> DispatcherBuilder {
        DispatcherBuilder {
            token: token.into(),
            pool_size: DEFAULT_POOL_SIZE,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            handlers: Handlers::default(),
        }
    }

    /// Handle one inbound exchange.
    ///
    /// Never fails: every outcome is a handler's response.
    pub async fn handle(&self, request: HttpRequest) -> Response {
        let (parts, body) = request.into_parts();

        match self.dispatch(&parts, body).await {
            Ok(response) => response,
            Err(err) => (self.handlers.invalid())(&parts, &err),
        }
    }

    async fn dispatch(&self, parts: &Parts, body: Body) -> Result<Response, DispatchError> {
        self.authenticate(parts)?;

        let bytes = self.read_body(body).await?;

        let mut message = self.pool.acquire();
        decode_into(&bytes, &mut message)?;

        let route = route(&message);
        debug!(
            route = route.as_str(),
            msg_type = %message.msg_type,
            event = %message.event,
            from_user = %message.from_user_name,
            "wechat_request_routed"
        );

        Ok((self.handler(route))(parts, &*message))
    }

    /// Steps 1-2: required parameters and signature check.
    fn authenticate(&self, parts: &Parts) -> Result<(), DispatchError> {
        let Query(params) = Query::<AuthParams>::try_from_uri(&parts.uri)?;

        let signature = require(params.signature, "signature")?;
        let timestamp = require(params.timestamp, "timestamp")?;
        let nonce = require(params.nonce, "nonce")?;

        if !check_signature(&signature, &timestamp, &nonce, &self.token) {
            return Err(DispatchError::SignatureMismatch);
        }
        Ok(())
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, DispatchError> {
        to_bytes(body, self.max_body_bytes)
            .await
            .map_err(DispatchError::Body)
    }

    fn handler(&self, route: Route) -> &MessageHandler {
        self.handlers.get(route)
    }

    /// Verify the platform's URL-verification handshake parameters.
    pub fn verify_url(&self, signature: &str, timestamp: &str, nonce: &str) -> bool {
        !signature.is_empty()
            && !timestamp.is_empty()
            && !nonce.is_empty()
            && check_signature(signature, timestamp, nonce, &self.token)
    }

    /// Current message pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Builder for [`Dispatcher`].
///
/// All handlers must be registered here; a built dispatcher cannot be
/// reconfigured, so the registry never changes while serving.
pub struct DispatcherBuilder {
    token: String,
    pool_size: usize,
    max_body_bytes: usize,
    handlers: Handlers,
}

impl DispatcherBuilder {
    /// Number of idle message objects to pre-allocate and retain.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Largest body accepted; longer bodies are rejected as invalid.
    pub fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Replace the handler for one route (including [`Route::Unknown`]).
    pub fn handler<F>(mut self, route: Route, handler: F) -> Self
    where
        F: Fn(&Parts, &Request) -> Response + Send + Sync + 'static,
    {
        self.handlers.set(route, Arc::new(handler));
        self
    }

    /// Replace the handler for authentic pushes of unrecognized kinds.
    pub fn unknown_request_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&Parts, &Request) -> Response + Send + Sync + 'static,
    {
        self.handler(Route::Unknown, handler)
    }

    /// Replace the handler for rejected exchanges.
    pub fn invalid_request_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Parts, &DispatchError) -> Response + Send + Sync + 'static,
    {
        self.handlers.invalid = Arc::new(handler);
        self
    }

    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }

        info!(
            pool_size = self.pool_size,
            max_body_bytes = self.max_body_bytes,
            "dispatcher_built"
        );

        Ok(Dispatcher {
            token: self.token,
            max_body_bytes: self.max_body_bytes,
            pool: Pool::new(self.pool_size),
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::compute_signature;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;

    const TOKEN: &str = "mytoken";
    const TIMESTAMP: &str = "1400000000";
    const NONCE: &str = "987654";

    /// Which handlers ran, in order.
    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<String>>>);

    impl Calls {
        fn push(&self, name: &str) {
            self.0.lock().push(name.to_string());
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    /// Dispatcher whose every handler records its route name.
    fn recording_dispatcher(calls: &Calls) -> Dispatcher {
        let mut builder = Dispatcher::builder(TOKEN).pool_size(2);
        for route in Route::ALL {
            let calls = calls.clone();
            builder = builder.handler(route, move |_: &Parts, _: &Request| {
                calls.push(route.as_str());
                StatusCode::OK.into_response()
            });
        }
        let calls = calls.clone();
        builder
            .invalid_request_handler(move |_: &Parts, err: &DispatchError| {
                calls.push(&format!("invalid: {}", err));
                err.status().into_response()
            })
            .build()
            .unwrap()
    }

    fn signed_uri() -> String {
        let signature = compute_signature(TOKEN, TIMESTAMP, NONCE);
        format!(
            "/wechat?signature={}&timestamp={}&nonce={}",
            signature, TIMESTAMP, NONCE
        )
    }

    fn post(uri: &str, body: impl Into<Body>) -> HttpRequest {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    fn text_body() -> &'static str {
        "<xml><ToUserName><![CDATA[gh_1]]></ToUserName><FromUserName><![CDATA[user_1]]></FromUserName>\
         <CreateTime>1400000000</CreateTime><MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[hi]]></Content><MsgId>1</MsgId></xml>"
    }

    #[tokio::test]
    async fn test_text_routes_to_text_handler() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        let response = dispatcher.handle(post(&signed_uri(), text_body())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.take(), vec!["text"]);
    }

    #[tokio::test]
    async fn test_subscribe_routes_by_ticket() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        let plain = "<xml><MsgType>event</MsgType><Event>subscribe</Event></xml>";
        dispatcher.handle(post(&signed_uri(), plain)).await;

        let scanned = "<xml><MsgType>event</MsgType><Event>subscribe</Event>\
                       <EventKey>qrscene_1</EventKey><Ticket>TICKET</Ticket></xml>";
        dispatcher.handle(post(&signed_uri(), scanned)).await;

        assert_eq!(
            calls.take(),
            vec!["subscribe_event", "subscribe_event_by_scan"]
        );
    }

    #[tokio::test]
    async fn test_voice_routes_by_recognition() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        dispatcher
            .handle(post(&signed_uri(), "<xml><MsgType>voice</MsgType></xml>"))
            .await;
        dispatcher
            .handle(post(
                &signed_uri(),
                "<xml><MsgType>voice</MsgType><Recognition>hello</Recognition></xml>",
            ))
            .await;

        assert_eq!(calls.take(), vec!["voice", "voice_recognition"]);
    }

    #[tokio::test]
    async fn test_unknown_kind_routes_to_unknown_once() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        dispatcher
            .handle(post(&signed_uri(), "<xml><MsgType>shortvideo</MsgType></xml>"))
            .await;
        dispatcher
            .handle(post(
                &signed_uri(),
                "<xml><MsgType>event</MsgType><Event>card_pass_check</Event></xml>",
            ))
            .await;

        assert_eq!(calls.take(), vec!["unknown", "unknown"]);
    }

    #[tokio::test]
    async fn test_missing_params_are_invalid_regardless_of_body() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);
        let signature = compute_signature(TOKEN, TIMESTAMP, NONCE);

        let cases = [
            (
                format!("/wechat?timestamp={}&nonce={}", TIMESTAMP, NONCE),
                "invalid: signature is empty",
            ),
            (
                format!("/wechat?signature={}&nonce={}", signature, NONCE),
                "invalid: timestamp is empty",
            ),
            (
                format!("/wechat?signature={}&timestamp={}&nonce=", signature, TIMESTAMP),
                "invalid: nonce is empty",
            ),
        ];

        for (uri, expected) in cases {
            let response = dispatcher.handle(post(&uri, text_body())).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(calls.take(), vec![expected]);
        }
    }

    #[tokio::test]
    async fn test_signature_mismatch_is_invalid() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        let uri = format!(
            "/wechat?signature=abc123&timestamp={}&nonce={}",
            TIMESTAMP, NONCE
        );
        let response = dispatcher.handle(post(&uri, text_body())).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.take(), vec!["invalid: check signature failed"]);
    }

    #[tokio::test]
    async fn test_signature_checked_before_body_is_read() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        let failing_body = || {
            Body::from_stream(futures::stream::once(async {
                Err::<Bytes, _>(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "peer went away",
                ))
            }))
        };

        let uri = format!(
            "/wechat?signature=abc123&timestamp={}&nonce={}",
            TIMESTAMP, NONCE
        );
        dispatcher.handle(post(&uri, failing_body())).await;
        assert_eq!(calls.take(), vec!["invalid: check signature failed"]);

        // With a valid signature the same body fails at the read step.
        dispatcher.handle(post(&signed_uri(), failing_body())).await;
        let recorded = calls.take();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].starts_with("invalid: failed to read request body"));
        assert_eq!(dispatcher.pool_stats().in_use, 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_invalid() {
        let calls = Calls::default();
        let dispatcher = Dispatcher::builder(TOKEN)
            .max_body_bytes(16)
            .invalid_request_handler({
                let calls = calls.clone();
                move |_: &Parts, err: &DispatchError| {
                    calls.push(&err.to_string());
                    err.status().into_response()
                }
            })
            .build()
            .unwrap();

        let response = dispatcher.handle(post(&signed_uri(), text_body())).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(calls.take()[0].starts_with("failed to read request body"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_and_released() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);
        let baseline = dispatcher.pool_stats();

        let response = dispatcher
            .handle(post(&signed_uri(), "<xml><MsgType>text</Content></xml>"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let recorded = calls.take();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].starts_with("invalid: failed to decode message"));
        assert_eq!(dispatcher.pool_stats(), baseline);
    }

    #[tokio::test]
    async fn test_malformed_query_is_invalid() {
        let calls = Calls::default();
        let dispatcher = recording_dispatcher(&calls);

        let response = dispatcher
            .handle(post(
                "/wechat?signature=a&signature=b&timestamp=1&nonce=2",
                text_body(),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let recorded = calls.take();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].starts_with("invalid: invalid query string"));
    }

    #[tokio::test]
    async fn test_handler_sees_decoded_message() {
        let seen = Arc::new(Mutex::new(None));
        let dispatcher = Dispatcher::builder(TOKEN)
            .handler(Route::Text, {
                let seen = Arc::clone(&seen);
                move |parts: &Parts, message: &Request| {
                    *seen.lock() = Some((parts.uri.path().to_string(), message.clone()));
                    (StatusCode::OK, "reply").into_response()
                }
            })
            .build()
            .unwrap();

        let response = dispatcher.handle(post(&signed_uri(), text_body())).await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"reply");

        let (path, message) = seen.lock().take().unwrap();
        assert_eq!(path, "/wechat");
        assert_eq!(message.from_user_name, "user_1");
        assert_eq!(message.content, "hi");
        assert_eq!(message.create_time, 1400000000);
    }

    #[tokio::test]
    async fn test_default_handlers() {
        let dispatcher = Dispatcher::builder(TOKEN).build().unwrap();

        let response = dispatcher.handle(post(&signed_uri(), text_body())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = dispatcher.handle(post("/wechat", text_body())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = dispatcher
            .handle(post(&signed_uri(), "<xml><MsgType>future</MsgType></xml>"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_return_pool_to_baseline() {
        let calls = Calls::default();
        let dispatcher = Arc::new(recording_dispatcher(&calls));
        let baseline = dispatcher.pool_stats();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.spawn(async move {
                let body = if i % 2 == 0 {
                    text_body().to_string()
                } else {
                    "<xml><MsgType>event</MsgType><Event>CLICK</Event></xml>".to_string()
                };
                dispatcher.handle(post(&signed_uri(), body)).await.status()
            });
        }
        while let Some(status) = tasks.join_next().await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        let stats = dispatcher.pool_stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, baseline.idle);
        assert_eq!(calls.take().len(), 64);
    }

    #[tokio::test]
    async fn test_panicking_handler_still_releases_message() {
        let dispatcher = Arc::new(
            Dispatcher::builder(TOKEN)
                .pool_size(1)
                .handler(Route::Text, |_: &Parts, _: &Request| -> Response {
                    panic!("handler bug")
                })
                .build()
                .unwrap(),
        );

        let task = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(post(&signed_uri(), text_body())).await })
        };
        assert!(task.await.unwrap_err().is_panic());

        let stats = dispatcher.pool_stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, 1);

        // Other exchanges keep working.
        let response = dispatcher
            .handle(post(&signed_uri(), "<xml><MsgType>image</MsgType></xml>"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            Dispatcher::builder("").build(),
            Err(ConfigError::EmptyToken)
        ));
    }

    #[test]
    fn test_verify_url() {
        let dispatcher = Dispatcher::builder(TOKEN).build().unwrap();
        let signature = compute_signature(TOKEN, TIMESTAMP, NONCE);

        assert!(dispatcher.verify_url(&signature, TIMESTAMP, NONCE));
        assert!(!dispatcher.verify_url(&signature, TIMESTAMP, "1"));
        assert!(!dispatcher.verify_url("", TIMESTAMP, NONCE));
    }
}
