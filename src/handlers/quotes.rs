use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created, message},
    notifications::{SendDocumentRequest, SendReport},
    services::{
        conversions::{RemissionRequest, RemissionResult},
        quotes::{
            CreateQuoteRequest, QuoteListQuery, QuoteListResponse, QuoteResponse,
            UpdateQuoteStatusRequest,
        },
    },
    ApiResponse, AppState,
};

/// Create a quote
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "Quote created", body = ApiResponse<QuoteResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Client or product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<QuoteResponse>>), ServiceError> {
    let quote = state
        .services
        .quotes
        .create_quote(request, user.responsible_id())
        .await?;
    Ok(created(quote))
}

/// List quotes
#[utoipa::path(
    get,
    path = "/api/v1/quotes",
    params(QuoteListQuery),
    responses(
        (status = 200, description = "Quotes retrieved", body = ApiResponse<QuoteListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<QuoteListQuery>,
) -> Result<Json<ApiResponse<QuoteListResponse>>, ServiceError> {
    let quotes = state.services.quotes.list_quotes(query).await?;
    Ok(Json(ApiResponse::success(quotes)))
}

/// Get a quote with its items
#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote ID")),
    responses(
        (status = 200, description = "Quote retrieved", body = ApiResponse<QuoteResponse>),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ServiceError> {
    let quote = state.services.quotes.get_quote(id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Change a quote's status
#[utoipa::path(
    put,
    path = "/api/v1/quotes/{id}/status",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = UpdateQuoteStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<QuoteResponse>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn update_quote_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuoteStatusRequest>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ServiceError> {
    let quote = state
        .services
        .quotes
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Delete a quote once its retention window has elapsed
#[utoipa::path(
    delete,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote ID")),
    responses(
        (status = 200, description = "Quote deleted", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Retention window not elapsed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.quotes.delete_quote(id).await?;
    Ok(message(format!("Quote {} deleted", id)))
}

/// Convert a quote into a delivered order and its delivery note
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/remission",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = RemissionRequest,
    responses(
        (status = 201, description = "Order and delivery note created", body = ApiResponse<RemissionResult>),
        (status = 400, description = "Quote cannot be remissioned", body = crate::errors::ErrorResponse),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Conversion failed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn remission_quote(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RemissionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RemissionResult>>), ServiceError> {
    let result = state
        .services
        .conversions
        .remission_quote(id, request, user.responsible_id())
        .await?;
    Ok(created(result))
}

/// Email a quote to its client
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/send",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = SendDocumentRequest,
    responses(
        (status = 200, description = "Email sent", body = ApiResponse<SendReport>),
        (status = 400, description = "No recipient", body = crate::errors::ErrorResponse),
        (status = 502, description = "Email transport failed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn send_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendDocumentRequest>,
) -> Result<Json<ApiResponse<SendReport>>, ServiceError> {
    let quote = state.services.quotes.get_quote(id).await?;
    let report = state.services.mailer.send_quote(&quote, request.to).await?;
    Ok(Json(ApiResponse::success(report)))
}
