#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use ventas_api::{
    auth::{self, AuthConfig, AuthService, TokenSubject},
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{client, product},
    events::{self, EventSender},
    handlers::AppServices,
    notifications::{DocumentMailer, LogTransport, NoPdfRenderer},
    services::catalog::{ClientService, ClientSnapshot, CreateProductRequest, ProductService},
    AppState,
};

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application state backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub auth_service: Arc<AuthService>,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_JWT_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.auto_migrate = true;
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.cors_allow_any_origin = true;
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        // One pooled connection keeps every query on the same in-memory database
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(3600),
            acquire_timeout: Duration::from_secs(30),
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let mailer = DocumentMailer::new(Arc::new(LogTransport), Arc::new(NoPdfRenderer));
        let services =
            AppServices::new(db_arc.clone(), Some(event_sender.clone()), &cfg, mailer);

        let state = AppState {
            db: db_arc.clone(),
            config: cfg.clone(),
            event_sender: Some(event_sender),
            services,
        };

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let token = auth_service
            .generate_token(&TokenSubject {
                user_id: Uuid::new_v4(),
                name: Some("Test Admin".to_string()),
                email: Some("admin@ventas.test".to_string()),
                roles: vec![auth::ADMIN_ROLE.to_string()],
                permissions: Vec::new(),
            })
            .expect("encode access token");

        let cors = ventas_api::cors_layer(&cfg).expect("cors config for tests");
        let router = ventas_api::build_app(state.clone(), auth_service.clone(), cors);

        Self {
            router,
            state,
            db: db_arc,
            auth_service,
            token,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bearer token for an admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Bearer token for a non-admin user holding only `permissions`.
    pub fn token_with(&self, permissions: &[&str]) -> String {
        self.auth_service
            .generate_token(&TokenSubject {
                user_id: Uuid::new_v4(),
                name: Some("Vendedor".to_string()),
                email: None,
                roles: vec!["ventas".to_string()],
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            })
            .expect("encode access token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn seed_client(&self, name: &str, email: Option<&str>) -> client::Model {
        ClientService::new(self.db.clone())
            .create(ClientSnapshot {
                name: name.to_string(),
                email: email.map(str::to_string),
                phone: Some("33 1234 5678".to_string()),
                city: Some("Guadalajara".to_string()),
                address: Some("Av. Juárez 100".to_string()),
            })
            .await
            .expect("seed client")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        ProductService::new(self.db.clone())
            .create(CreateProductRequest {
                name: name.to_string(),
                code: Some(format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..6])),
                description: Some(format!("{} (descripción)", name)),
                price,
                stock,
            })
            .await
            .expect("seed product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Collect a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
