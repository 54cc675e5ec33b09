//! Web server module hosting the dispatcher.
//!
//! Routes:
//! - `GET /health`: liveness probe
//! - `POST {webhook_path}`: push messages, handled by the dispatcher
//! - `GET {webhook_path}`: URL-verification handshake
//!
//! A panicking message handler fails only its own exchange (500); the
//! pooled message is still released while unwinding.

pub mod handlers;

use axum::{routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::HEALTH_PATH;

pub use handlers::{health, verify_url, wechat_webhook, AppState, HealthResponse, VerifyParams};

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();

    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(&webhook_path, get(verify_url).post(wechat_webhook))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
