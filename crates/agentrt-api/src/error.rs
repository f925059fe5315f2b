// HTTP translation of the runtime's error taxonomy, per the platform's
// error-handling design: known kinds map to specific statuses, everything
// else becomes an opaque 500 with a correlation id.

use agentrt_core::error::RuntimeError;
use agentrt_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

pub struct ApiError(RuntimeError);

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        ApiError(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(err.into())
    }
}

fn status_for(code: &str) -> StatusCode {
    match code {
        "ENOT_FOUND" => StatusCode::NOT_FOUND,
        "EBAD_REQUEST" => StatusCode::BAD_REQUEST,
        "ECONFLICT" => StatusCode::CONFLICT,
        "ERUNTIME_BUSY" => StatusCode::TOO_MANY_REQUESTS,
        "ERUNTIME_NOT_READY" => StatusCode::CONFLICT,
        "ELLM_UPSTREAM" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = status_for(code);

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let correlation_id = Uuid::now_v7();
            tracing::error!(correlation_id = %correlation_id, error = %self.0, "internal error");
            return (
                status,
                Json(json!({
                    "code": code,
                    "message": "an internal error occurred",
                    "correlation_id": correlation_id,
                })),
            )
                .into_response();
        }

        (
            status,
            Json(json!({
                "code": code,
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
