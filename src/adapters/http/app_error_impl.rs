use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = ?self, "Request failed");
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, code, None)
            }
            AppError::InvalidArgument(msg) => {
                error_resp(StatusCode::BAD_REQUEST, code, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, code, None),
            AppError::Unauthorized => error_resp(StatusCode::UNAUTHORIZED, code, None),
            AppError::RemoteRejected(msg) => {
                tracing::warn!(error = %msg, "Payment platform rejected request");
                error_resp(StatusCode::UNPROCESSABLE_ENTITY, code, Some(msg))
            }
            AppError::RemoteUnavailable(msg) => {
                tracing::error!(error = %msg, "Payment platform unavailable");
                error_resp(StatusCode::SERVICE_UNAVAILABLE, code, None)
            }
            AppError::MalformedRemote(msg) => {
                tracing::error!(error = %msg, "Malformed payment platform object");
                error_resp(StatusCode::BAD_GATEWAY, code, None)
            }
            AppError::NotConfirmed(msg) => {
                tracing::warn!(error = %msg, "Remote change not confirmed");
                error_resp(StatusCode::CONFLICT, code, Some(msg))
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
