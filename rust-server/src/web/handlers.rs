//! HTTP endpoint handlers.
//!
//! The webhook endpoint hands the whole exchange to the
//! [`Dispatcher`]; everything else here is operational glue.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Push Webhook
// =============================================================================

/// Push endpoint. Authentication, decoding and routing all happen in the
/// dispatcher.
pub async fn wechat_webhook(State(state): State<AppState>, request: Request) -> Response {
    state.dispatcher.handle(request).await
}

// =============================================================================
// URL Verification
// =============================================================================

/// Query parameters of the platform's URL-verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub echostr: String,
}

/// URL-verification endpoint.
///
/// When the endpoint is registered the platform sends a signed GET with an
/// `echostr`; echoing it back proves we hold the token. Every failure,
/// including an unparseable query string, answers 401.
pub async fn verify_url(
    State(state): State<AppState>,
    query: Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!(error = %rejection, "wechat_url_verification_failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if params.echostr.is_empty()
        || !state
            .dispatcher
            .verify_url(&params.signature, &params.timestamp, &params.nonce)
    {
        warn!(
            has_signature = !params.signature.is_empty(),
            has_echostr = !params.echostr.is_empty(),
            "wechat_url_verification_failed"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    info!("wechat_url_verified");
    (StatusCode::OK, params.echostr).into_response()
}
