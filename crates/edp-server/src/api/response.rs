//! API response and error types
//!
//! Errors are flat `{"error": reason}` bodies. Parameter problems map to
//! 400 with the per-field reason, an empty CSV result to 422, and store
//! failures to 500 with the detail kept in the logs.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::query::{FormatError, ParamError, Rendered, StoreError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(ParamError),
    EmptyCsv,
    Store(StoreError),
}

impl From<ParamError> for ApiError {
    fn from(err: ParamError) -> Self {
        ApiError::BadRequest(err)
    }
}

impl From<FormatError> for ApiError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::EmptyCsv => ApiError::EmptyCsv,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": reason.to_string() })),
            )
                .into_response(),
            ApiError::EmptyCsv => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": FormatError::EmptyCsv.to_string() })),
            )
                .into_response(),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "query execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "query failed" })),
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        match self {
            Rendered::Json(body) => Json(body).into_response(),
            Rendered::Csv(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/csv")],
                body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_error_maps_to_400() {
        let response = ApiError::from(ParamError::InvalidRegion).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_error_maps_to_500() {
        let response =
            ApiError::from(StoreError::Query("timeout".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_csv_maps_to_422() {
        let response = ApiError::from(FormatError::EmptyCsv).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_csv_content_type() {
        let response = Rendered::Csv("id,ef\n1,2\n".to_string()).into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    }
}
