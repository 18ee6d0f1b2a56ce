mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use rust_decimal_macros::dec;
use ventas_api::{
    entities::quote::QuoteStatus,
    errors::ServiceError,
    services::{
        catalog::ClientSnapshot,
        quotes::{CreateQuoteRequest, QuoteItemInput, QuoteListQuery},
    },
};

use common::TestApp;

fn item(product_id: uuid::Uuid, quantity: i32) -> QuoteItemInput {
    QuoteItemInput {
        product_id,
        product_name: None,
        quantity,
        unit_price: None,
        unit_value: None,
        discount: None,
    }
}

fn walk_in(items: Vec<QuoteItemInput>) -> CreateQuoteRequest {
    CreateQuoteRequest {
        client_id: None,
        client: Some(ClientSnapshot {
            name: "Mostrador".to_string(),
            ..Default::default()
        }),
        items,
        observations: None,
    }
}

#[tokio::test]
async fn create_quote_prices_lines_and_snapshots_client() {
    let app = TestApp::new().await;
    let client = app
        .seed_client("Obras y Proyectos Norte", Some("obra@norte.test"))
        .await;
    let product = app.seed_product("Cemento gris 50kg", dec!(25), 100).await;

    let quote = app
        .state
        .services
        .quotes
        .create_quote(
            CreateQuoteRequest {
                client_id: Some(client.id),
                client: None,
                items: vec![
                    QuoteItemInput {
                        discount: Some(dec!(10)),
                        ..item(product.id, 4)
                    },
                    QuoteItemInput {
                        unit_price: Some(dec!(25)),
                        unit_value: Some(dec!(20)),
                        product_name: Some("Cemento (precio especial)".to_string()),
                        ..item(product.id, 2)
                    },
                ],
                observations: Some("Vigencia 15 días".to_string()),
            },
            None,
        )
        .await
        .unwrap();

    assert!(quote.code.starts_with("COT-"));
    assert_eq!(quote.code.len(), 8);
    assert_eq!(quote.status, QuoteStatus::Activa);
    assert_eq!(quote.client.name, "Obras y Proyectos Norte");
    assert_eq!(quote.client.email.as_deref(), Some("obra@norte.test"));
    assert_eq!(quote.items.len(), 2);
    assert_eq!(quote.items[0].subtotal, dec!(90));
    assert_eq!(quote.items[0].unit_price, Some(dec!(25)));
    assert_eq!(quote.items[1].subtotal, dec!(40));
    assert_eq!(quote.items[1].product_name, "Cemento (precio especial)");
    assert_eq!(quote.total, dec!(130));
    assert!(quote.order_id.is_none());
}

#[tokio::test]
async fn quote_requires_a_client_and_items() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena fina m3", dec!(350), 10).await;
    let quotes = &app.state.services.quotes;

    let no_items = quotes.create_quote(walk_in(vec![]), None).await;
    assert_matches!(no_items, Err(ServiceError::ValidationError(_)));

    let no_client = quotes
        .create_quote(
            CreateQuoteRequest {
                client: None,
                ..walk_in(vec![item(product.id, 1)])
            },
            None,
        )
        .await;
    assert_matches!(no_client, Err(ServiceError::ValidationError(_)));

    let bad_discount = quotes
        .create_quote(
            walk_in(vec![QuoteItemInput {
                discount: Some(dec!(120)),
                ..item(product.id, 1)
            }]),
            None,
        )
        .await;
    assert_matches!(bad_discount, Err(ServiceError::ValidationError(_)));

    let unknown_product = quotes
        .create_quote(walk_in(vec![item(uuid::Uuid::new_v4(), 1)]), None)
        .await;
    assert_matches!(unknown_product, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn manual_transitions_never_reach_remisionado() {
    let app = TestApp::new().await;
    let product = app.seed_product("Grava 3/4 m3", dec!(380), 10).await;
    let quotes = &app.state.services.quotes;
    let quote = quotes
        .create_quote(walk_in(vec![item(product.id, 1)]), None)
        .await
        .unwrap();

    let remissioned = quotes.update_status(quote.id, QuoteStatus::Remisionado).await;
    assert_matches!(remissioned, Err(ServiceError::InvalidStateTransition(_)));

    let closed = quotes
        .update_status(quote.id, QuoteStatus::Cerrada)
        .await
        .unwrap();
    assert_eq!(closed.status, QuoteStatus::Cerrada);

    let reopened = quotes
        .update_status(quote.id, QuoteStatus::Activa)
        .await
        .unwrap();
    assert_eq!(reopened.status, QuoteStatus::Activa);

    quotes
        .update_status(quote.id, QuoteStatus::Cancelada)
        .await
        .unwrap();
    let revived = quotes.update_status(quote.id, QuoteStatus::Activa).await;
    assert_matches!(revived, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn status_change_stamps_updated_at() {
    let app = TestApp::new().await;
    let product = app.seed_product("Grava 3/4 m3", dec!(380), 10).await;
    let quotes = &app.state.services.quotes;
    let quote = quotes
        .create_quote(walk_in(vec![item(product.id, 2)]), None)
        .await
        .unwrap();
    let stored = quotes.get_quote(quote.id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let closed = quotes
        .update_status(quote.id, QuoteStatus::Cerrada)
        .await
        .unwrap();

    assert_eq!(closed.status, QuoteStatus::Cerrada);
    assert!(closed.updated_at > stored.updated_at);
    assert_eq!(closed.created_at, stored.created_at);
    assert_eq!(closed.items.len(), 1);

    let reread = quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(reread.status, QuoteStatus::Cerrada);
    assert_eq!(reread.updated_at, closed.updated_at);
}

#[tokio::test]
async fn deletion_waits_for_the_retention_window() {
    let app = TestApp::new().await;
    let product = app.seed_product("Block 15x20x40", dec!(12), 100).await;
    let quotes = &app.state.services.quotes;
    let created = quotes
        .create_quote(walk_in(vec![item(product.id, 50)]), None)
        .await
        .unwrap();
    let stored = quotes.get_quote(created.id).await.unwrap();
    let window = quotes.retention();
    assert_eq!(window, Duration::days(15));

    let too_early = quotes
        .delete_quote_as_of(stored.id, stored.created_at + Duration::days(3))
        .await;
    assert_matches!(too_early, Err(ServiceError::ValidationError(_)));

    let on_boundary = quotes
        .delete_quote_as_of(stored.id, stored.created_at + window)
        .await;
    assert_matches!(on_boundary, Err(ServiceError::ValidationError(_)));
    assert!(quotes.get_quote(stored.id).await.is_ok());

    quotes
        .delete_quote_as_of(stored.id, stored.created_at + window + Duration::seconds(1))
        .await
        .unwrap();
    assert_matches!(
        quotes.get_quote(stored.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn fresh_quote_cannot_be_deleted_now() {
    let app = TestApp::new().await;
    let product = app.seed_product("Block 15x20x40", dec!(12), 100).await;
    let quotes = &app.state.services.quotes;
    let quote = quotes
        .create_quote(walk_in(vec![item(product.id, 5)]), None)
        .await
        .unwrap();

    assert_matches!(
        quotes.delete_quote(quote.id).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        quotes.delete_quote(uuid::Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn list_filters_by_status_and_pages() {
    let app = TestApp::new().await;
    let product = app.seed_product("Alambre recocido kg", dec!(42), 100).await;
    let quotes = &app.state.services.quotes;

    let mut ids = Vec::new();
    for qty in 1..=3 {
        ids.push(
            quotes
                .create_quote(walk_in(vec![item(product.id, qty)]), None)
                .await
                .unwrap()
                .id,
        );
    }
    quotes
        .update_status(ids[0], QuoteStatus::Cancelada)
        .await
        .unwrap();

    let active = quotes
        .list_quotes(QuoteListQuery {
            page: None,
            per_page: None,
            status: Some(QuoteStatus::Activa),
        })
        .await
        .unwrap();
    assert_eq!(active.total, 2);
    assert!(active.quotes.iter().all(|q| q.status == QuoteStatus::Activa));

    let first_page = quotes
        .list_quotes(QuoteListQuery {
            page: Some(1),
            per_page: Some(2),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(first_page.total, 3);
    assert_eq!(first_page.quotes.len(), 2);
    assert_eq!(first_page.per_page, 2);
}
