use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::message,
    notifications::{SendDocumentRequest, SendReport},
    services::delivery_notes::{
        DeliveryNoteListQuery, DeliveryNoteListResponse, DeliveryNoteResponse,
        UpdateDeliveryNoteStatusRequest,
    },
    ApiResponse, AppState,
};

/// List delivery notes
#[utoipa::path(
    get,
    path = "/api/v1/delivery-notes",
    params(DeliveryNoteListQuery),
    responses(
        (status = 200, description = "Delivery notes retrieved", body = ApiResponse<DeliveryNoteListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Delivery Notes"
)]
pub async fn list_delivery_notes(
    State(state): State<AppState>,
    Query(query): Query<DeliveryNoteListQuery>,
) -> Result<Json<ApiResponse<DeliveryNoteListResponse>>, ServiceError> {
    let notes = state.services.delivery_notes.list(query).await?;
    Ok(Json(ApiResponse::success(notes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-notes/{id}",
    params(("id" = Uuid, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note retrieved", body = ApiResponse<DeliveryNoteResponse>),
        (status = 404, description = "Delivery note not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Delivery Notes"
)]
pub async fn get_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeliveryNoteResponse>>, ServiceError> {
    let note = state.services.delivery_notes.get(id).await?;
    Ok(Json(ApiResponse::success(note)))
}

#[utoipa::path(
    put,
    path = "/api/v1/delivery-notes/{id}/status",
    params(("id" = Uuid, Path, description = "Delivery note ID")),
    request_body = UpdateDeliveryNoteStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<DeliveryNoteResponse>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery note not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Delivery Notes"
)]
pub async fn update_delivery_note_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeliveryNoteStatusRequest>,
) -> Result<Json<ApiResponse<DeliveryNoteResponse>>, ServiceError> {
    let note = state
        .services
        .delivery_notes
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(note)))
}

/// Delete a cancelled delivery note
#[utoipa::path(
    delete,
    path = "/api/v1/delivery-notes/{id}",
    params(("id" = Uuid, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note deleted", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Only cancelled notes can be deleted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery note not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Delivery Notes"
)]
pub async fn delete_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.delivery_notes.delete(id).await?;
    Ok(message(format!("Delivery note {} deleted", id)))
}

/// Email a delivery note to its client
#[utoipa::path(
    post,
    path = "/api/v1/delivery-notes/{id}/send",
    params(("id" = Uuid, Path, description = "Delivery note ID")),
    request_body = SendDocumentRequest,
    responses(
        (status = 200, description = "Email sent", body = ApiResponse<SendReport>),
        (status = 400, description = "No recipient", body = crate::errors::ErrorResponse),
        (status = 502, description = "Email transport failed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Delivery Notes"
)]
pub async fn send_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendDocumentRequest>,
) -> Result<Json<ApiResponse<SendReport>>, ServiceError> {
    let note = state.services.delivery_notes.get(id).await?;
    let report = state
        .services
        .mailer
        .send_delivery_note(&note, request.to)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
