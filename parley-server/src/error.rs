//! Mapping of core errors onto HTTP responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_core::error::ParleyError;
use serde_json::json;

/// Error returned from JSON handlers.
///
/// The body only ever carries [`ParleyError::public_message`]; the full
/// error is logged here.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::Validation(_) => StatusCode::BAD_REQUEST,
            ParleyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ParleyError> for ApiError {
    fn from(error: ParleyError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            ParleyError::Validation(message) => {
                tracing::debug!(%message, "rejected request");
            }
            ParleyError::Upstream { status: upstream, .. } => {
                tracing::error!(error = %self.0, upstream_status = ?upstream, "upstream API error");
            }
            error => {
                tracing::error!(%error, kind = error.kind(), "internal error");
            }
        }

        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::UPSTREAM_USER_MESSAGE;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(ParleyError::Validation("Mensagem vazia".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ParleyError::upstream("quota")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError(ParleyError::Session("gone".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_hides_upstream_detail() {
        use http_body_util::BodyExt;

        let response = ApiError(ParleyError::upstream("key AIza-secret rejected")).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], UPSTREAM_USER_MESSAGE);
    }
}
