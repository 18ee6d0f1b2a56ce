//! Ventas API Library
//!
//! Quotes, orders and delivery notes with sequential document numbering,
//! quote-to-order conversion and stock adjustment on delivery.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    pub(crate) fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Business routes under `/api/v1`, each group behind its permission gate.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{delivery_notes, health, orders, quotes};

    let quotes_read = Router::new()
        .route("/quotes", get(quotes::list_quotes))
        .route("/quotes/:id", get(quotes::get_quote))
        .with_permission(perm::QUOTES_READ);

    let quotes_write = Router::new()
        .route("/quotes", post(quotes::create_quote))
        .route("/quotes/:id/status", put(quotes::update_quote_status))
        .route("/quotes/:id/remission", post(quotes::remission_quote))
        .route("/quotes/:id/send", post(quotes::send_quote))
        .with_permission(perm::QUOTES_WRITE);

    let quotes_delete = Router::new()
        .route("/quotes/:id", axum::routing::delete(quotes::delete_quote))
        .with_permission(perm::QUOTES_DELETE);

    let orders_read = Router::new()
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route(
            "/orders/by-number/:order_number",
            get(orders::get_order_by_number),
        )
        .with_permission(perm::ORDERS_READ);

    let orders_write = Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/:id/status", put(orders::update_order_status))
        .route("/orders/:id/deliver", post(orders::deliver_order))
        .route(
            "/orders/:id/delivery-note",
            post(orders::create_delivery_note),
        )
        .with_permission(perm::ORDERS_WRITE);

    let notes_read = Router::new()
        .route("/delivery-notes", get(delivery_notes::list_delivery_notes))
        .route("/delivery-notes/:id", get(delivery_notes::get_delivery_note))
        .with_permission(perm::DELIVERY_NOTES_READ);

    let notes_write = Router::new()
        .route(
            "/delivery-notes/:id/status",
            put(delivery_notes::update_delivery_note_status),
        )
        .route(
            "/delivery-notes/:id/send",
            post(delivery_notes::send_delivery_note),
        )
        .with_permission(perm::DELIVERY_NOTES_WRITE);

    let notes_delete = Router::new()
        .route(
            "/delivery-notes/:id",
            axum::routing::delete(delivery_notes::delete_delivery_note),
        )
        .with_permission(perm::DELIVERY_NOTES_DELETE);

    Router::new()
        .route("/status", get(health::status))
        .route("/health", get(health::health))
        .merge(quotes_read)
        .merge(quotes_write)
        .merge(quotes_delete)
        .merge(orders_read)
        .merge(orders_write)
        .merge(notes_read)
        .merge(notes_write)
        .merge(notes_delete)
}

/// CORS from `cors_allowed_origins`, or permissive when the environment allows it.
/// `None` means the configuration is missing.
pub fn cors_layer(cfg: &config::AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.should_allow_permissive_cors() {
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

/// Full application: API, Swagger UI and the shared middleware stack.
pub fn build_app(state: AppState, auth_service: Arc<auth::AuthService>, cors: CorsLayer) -> Router {
    Router::<AppState>::new()
        .route("/", get(|| async { "ventas-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::http_trace_layer())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Auth middleware reads the service from request extensions
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
