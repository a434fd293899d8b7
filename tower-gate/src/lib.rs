//! # Tower Gate
//!
//! `tower-gate` puts a [`gate_limit::Gate`] in front of a
//! [Tower](https://github.com/tower-rs/tower) service.
//!
//! ## How it works
//!
//! 1. **Identification**: Each request is described through [`GateRequest`]:
//!    its path and the client's address (the connected peer, or the first
//!    `X-Forwarded-For` entry when [`GateLayer::with_forwarded_for`] is set).
//!    Requests without an address share one `unknown` bucket.
//! 2. **Decision**: The gate forwards unlimited routes untouched and counts
//!    limited ones per client.
//! 3. **Rejection**: A refused request never reaches the inner service; it
//!    resolves to [`GateError::LimitExceeded`] carrying the seconds to wait.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`GateError`] (429 with a JSON
//!   `message` body and `Retry-After` header), `gate_middleware` and
//!   `handle_gate_error`.

mod error;
mod layer;
#[cfg(feature = "axum")]
mod middleware;
mod request;
mod service;
mod utils;


pub use error::GateError;
pub use layer::GateLayer;
#[cfg(feature = "axum")]
pub use middleware::gate_middleware;
#[cfg(feature = "axum")]
pub use middleware::handle_gate_error;
pub use request::GateRequest;
pub use request::X_FORWARDED_FOR;
pub use service::GateService;
pub use service::ResponseFuture;
pub use utils::ServiceBuilderExt;
