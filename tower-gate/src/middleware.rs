//! Axum integration.

use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tower::BoxError;

use crate::GateError;
use crate::GateLayer;

/// Gate middleware for `axum::middleware::from_fn_with_state`.
///
/// Rejected requests get the 429 response straight away, so the router
/// stays infallible and no `HandleErrorLayer` is needed.
pub async fn gate_middleware(State(gate): State<GateLayer>, req: Request, next: Next) -> Response {
    match gate.check(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

/// Error handler for `HandleErrorLayer` when [`GateLayer`] is used as a
/// plain tower layer.
pub async fn handle_gate_error(err: BoxError) -> Response {
    if let Some(gate_err) = err.downcast_ref::<GateError>() {
        gate_err.clone().into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
    }
}
