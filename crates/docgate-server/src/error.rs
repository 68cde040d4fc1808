use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docgate_core::Error;

/// Error returned by the HTTP handlers.
///
/// Rendered as `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug)]
pub enum AppError {
    /// Failure reported by the storage or conversion layer
    Core(Error),
    /// Malformed request the handler rejected itself
    BadRequest(String),
    /// Rejection with an explicit status, e.g. an oversized multipart body
    Rejected(StatusCode, String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(err) => status_for(err),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(status, _) => *status,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Core(err) => err.code(),
            AppError::BadRequest(_) => "bad_request",
            AppError::Rejected(status, _) if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            AppError::Rejected(..) => "bad_request",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Core(err) => err.to_string(),
            AppError::BadRequest(msg) | AppError::Rejected(_, msg) => msg.clone(),
        }
    }
}

/// HTTP status for each storage / conversion error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidName { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NameConflict(_) => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::ConversionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Config(_) | Error::SerializationError(_) | Error::IoError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Core(err)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Rejected(err.status(), err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %message, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %message, "Request rejected");
        }

        let json = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });
        (status, Json(json)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::invalid_name("..", "reserved name")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::NameConflict("a.txt".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::UnsupportedFormat("image/png".into())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&Error::IoError(std::io::Error::other("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = AppError::from(Error::NotFound("a.txt".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "File not found: a.txt");
    }

    #[test]
    fn test_rejections() {
        let err = AppError::BadRequest("missing file field".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_request");

        let err = AppError::Rejected(StatusCode::PAYLOAD_TOO_LARGE, "too big".into());
        assert_eq!(err.code(), "payload_too_large");
    }
}
