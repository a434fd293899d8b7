/// Errors produced by the gate middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The client used up its allowance for the current window.
    ///
    /// When the `axum` feature is enabled, this converts to
    /// `429 Too Many Requests` with a `Retry-After` header and a JSON body
    /// carrying the same message.
    #[error("Limit exceeded, try again after {retry_after_secs} sec")]
    LimitExceeded {
        /// Whole seconds until the client's window closes.
        retry_after_secs: u64,
    },
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::http::header::RETRY_AFTER;

        let Self::LimitExceeded { retry_after_secs } = self;
        let body = axum::Json(serde_json::json!({ "message": self.to_string() }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, axum::http::HeaderValue::from(retry_after_secs));
        response
    }
}
