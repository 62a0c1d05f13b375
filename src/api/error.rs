use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    // Field name -> list of messages, mirroring form-style error bodies
    #[error("Validation failed")]
    Validation(BTreeMap<String, Vec<String>>),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(name: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.to_string(), vec![message.to_string()]);
        AppError::Validation(fields)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", e.code))
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(fields) => (StatusCode::BAD_REQUEST, json!({ "errors": fields })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": msg }))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
    }

    #[test]
    fn test_validator_errors_become_field_map() {
        let probe = Probe {
            password: "short".to_string(),
        };
        let err: AppError = probe.validate().unwrap_err().into();
        match err {
            AppError::Validation(fields) => {
                assert_eq!(
                    fields.get("password").unwrap(),
                    &vec!["Password must be at least 8 characters".to_string()]
                );
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_field_helper_shape() {
        match AppError::field("barcode", "This field is required.") {
            AppError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields["barcode"], vec!["This field is required."]);
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}
