//! WxPush - authenticated dispatcher for WeChat push messages.
//!
//! The platform delivers XML-encoded messages and events over HTTP. Each
//! delivery is authenticated, decoded into a pooled message object and
//! routed to exactly one handler.
//!
//! ## Architecture
//!
//! ```text
//! HTTP → web → Dispatcher ─┬─ signature (token, timestamp, nonce)
//!                          ├─ pool ─ message::decode_into
//!                          └─ router → handler
//! ```

pub mod config;
pub mod dispatch;
pub mod message;
pub mod pool;
pub mod signature;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{ConfigError, DispatchError, Dispatcher, DispatcherBuilder, Route};
pub use message::{decode_into, DecodeError, EventKind, MessageKind, Request};
pub use pool::{Pool, PoolStats, Pooled, Reusable};
pub use signature::{check_signature, compute_signature};
pub use web::{build_router, AppState};
