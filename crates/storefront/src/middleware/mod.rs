//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (per-request hub, HTTP transaction)
//! 2. Request ID (assign, then propagate to the response)
//! 3. `TraceLayer` (request span carrying the request ID)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is read per handler through the [`RequireAuth`] and
//! [`OptionalAuth`] extractors.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth};
pub use request_id::{make_request_span, propagate_request_id_layer, set_request_id_layer};
pub use session::{create_session_layer, session_layer};
