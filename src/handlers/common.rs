use crate::errors::{ApiError, ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

/// Standard success envelope: `{status, message, data}`, plus `length` on
/// list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub data: T,
}

/// Standard success response
pub fn success_response<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            length: None,
            data,
        }),
    )
        .into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            length: None,
            data,
        }),
    )
        .into_response()
}

/// Success response for a list, carrying its length
pub fn list_response<T: Serialize>(message: &str, data: Vec<T>) -> Response {
    let length = data.len();
    (
        StatusCode::OK,
        Json(ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            length: Some(length),
            data,
        }),
    )
        .into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_carries_length() {
        let body = ApiResponse {
            status: "success".into(),
            message: "ok".into(),
            length: Some(2),
            data: vec![1, 2],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["length"], 2);
        assert_eq!(json["status"], "success");
    }

    #[test]
    fn scalar_envelope_omits_length() {
        let body = ApiResponse {
            status: "success".into(),
            message: "ok".into(),
            length: None,
            data: 42,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("length").is_none());
    }
}
