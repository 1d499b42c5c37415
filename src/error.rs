use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Surface the first failing field from a `validator` derive run.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        for (field, field_errors) in errors.field_errors() {
            if let Some(err) = field_errors.first() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("failed constraint `{}`", err.code));
                return AppError::invalid(field, message);
            }
        }
        AppError::invalid("body", "invalid request")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, None, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, None, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, None, msg.clone()),
            AppError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(field.clone()),
                message.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, None, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, None, self.to_string()),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error".into(),
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "field": field,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(range(min = 1.0, max = 60.0, message = "Max depth must be 1-60 m"))]
        max_depth_m: f64,
    }

    #[test]
    fn test_validation_errors_carry_field_and_message() {
        let err = Probe { max_depth_m: 61.0 }.validate().unwrap_err();
        match AppError::from(err) {
            AppError::Validation { field, message } => {
                assert_eq!(field, "max_depth_m");
                assert_eq!(message, "Max depth must be 1-60 m");
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}
