use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ventas API",
        version = "0.1.0",
        description = r#"
# Ventas API

Sales backend for quotes (cotizaciones), orders (pedidos) and delivery notes (remisiones).

## Document flow

- A **quote** (`COT-XXXX`) can be remissioned: one call creates an order already
  in state `entregado` and its delivery note, and marks the quote `remisionado`.
- An **order** (`PED-NNNNN`) created directly starts in `agendado`. Moving it to
  `entregado` decrements stock and records a sale; insufficient stock rejects
  the change with `422`.
- A **delivery note** (`REM-NNNNN`) is issued at most once per order.

## Authentication

All `/api/v1` business routes require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

```json
{
  "error": "VALIDATION_ERROR",
  "message": "Validation error: quote must have at least one item",
  "request_id": "0b6f...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Quotes", description = "Quote management and conversion"),
        (name = "Orders", description = "Order lifecycle and delivery"),
        (name = "Delivery Notes", description = "Delivery note management"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Quotes
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::list_quotes,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::update_quote_status,
        crate::handlers::quotes::delete_quote,
        crate::handlers::quotes::remission_quote,
        crate::handlers::quotes::send_quote,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::deliver_order,
        crate::handlers::orders::create_delivery_note,

        // Delivery notes
        crate::handlers::delivery_notes::list_delivery_notes,
        crate::handlers::delivery_notes::get_delivery_note,
        crate::handlers::delivery_notes::update_delivery_note_status,
        crate::handlers::delivery_notes::delete_delivery_note,
        crate::handlers::delivery_notes::send_delivery_note,

        // Health
        crate::handlers::health::status,
        crate::handlers::health::health,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::entities::quote::QuoteStatus,
            crate::entities::order::OrderStatus,
            crate::entities::delivery_note::DeliveryNoteStatus,
            crate::services::catalog::ClientSnapshot,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_document_routes() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Ventas API"));
        assert!(json.contains("/api/v1/quotes/{id}/remission"));
        assert!(json.contains("/api/v1/orders/{id}/delivery-note"));
        assert!(json.contains("/api/v1/delivery-notes/{id}"));
        assert!(json.contains("Bearer"));
    }
}
