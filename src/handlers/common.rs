use axum::{http::StatusCode, response::Json};
use serde::Serialize;

use crate::ApiResponse;

/// `201 Created` with the standard envelope
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// `201` when a document was created, `200` when an existing one is returned
pub fn created_or_ok<T: Serialize>(created: bool, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(ApiResponse::success(data)))
}

/// Success envelope carrying only a message
pub fn message(text: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
        message: Some(text.into()),
        errors: None,
        meta: Some(crate::ResponseMeta::capture()),
    })
}
