//! Authenticated dispatch of push messages.
//!
//! ## Flow
//!
//! ```text
//! query → signature check → body → pooled decode → route → one handler
//!   └────────── any failure ──────────┘                  └─ unknown kind → unknown handler
//!                     ↓
//!              invalid handler
//! ```

pub mod engine;
pub mod error;
pub mod handlers;
pub mod router;

pub use engine::{Dispatcher, DispatcherBuilder, DEFAULT_MAX_BODY_BYTES, DEFAULT_POOL_SIZE};
pub use error::{ConfigError, DispatchError};
pub use handlers::{
    default_invalid_request, default_unknown_request, Handlers, InvalidRequestHandler,
    MessageHandler,
};
pub use router::{route, Route};
