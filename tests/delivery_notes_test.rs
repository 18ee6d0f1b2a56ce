mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;
use ventas_api::{
    entities::delivery_note::{self, DeliveryNoteStatus},
    errors::ServiceError,
    services::{
        delivery_notes::DeliveryNoteListQuery,
        orders::{CreateOrderRequest, OrderItemInput, OrderResponse},
    },
};

use common::TestApp;

async fn delivered_order(app: &TestApp) -> OrderResponse {
    let product = app.seed_product("Cemento gris 50kg", dec!(32.50), 100).await;
    let orders = &app.state.services.orders;
    let order = orders
        .create_order(
            CreateOrderRequest {
                client_id: None,
                items: vec![OrderItemInput {
                    product_id: product.id,
                    quantity: 4,
                    unit_price: None,
                }],
                delivery_date: None,
                observation: None,
            },
            None,
        )
        .await
        .unwrap();
    orders.mark_delivered(order.id).await.unwrap().order
}

async fn issue_note(app: &TestApp) -> Uuid {
    let order = delivered_order(app).await;
    app.state
        .services
        .conversions
        .delivery_note_from_order(order.id, None, None)
        .await
        .unwrap()
        .delivery_note
        .id
}

/// Writes a note numbered `number` outside the counter, as an import would.
async fn insert_note_numbered(app: &TestApp, order: &OrderResponse, number: &str) {
    let now = Utc::now();
    delivery_note::ActiveModel {
        id: Set(Uuid::new_v4()),
        number: Set(number.to_string()),
        order_id: Set(order.id),
        order_code: Set(order.order_number.clone()),
        quote_id: Set(None),
        quote_code: Set(None),
        client_name: Set("Importado".to_string()),
        client_email: Set(None),
        client_phone: Set(None),
        client_city: Set(None),
        client_address: Set(None),
        responsible_id: Set(None),
        status: Set(DeliveryNoteStatus::Activa),
        subtotal: Set(dec!(0)),
        total: Set(dec!(0)),
        item_count: Set(0),
        total_quantity: Set(0),
        issued_at: Set(now),
        delivery_date: Set(None),
        observations: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.db)
    .await
    .expect("insert imported delivery note");
}

#[tokio::test]
async fn only_cancelled_notes_can_be_deleted() {
    let app = TestApp::new().await;
    let note_id = issue_note(&app).await;
    let notes = &app.state.services.delivery_notes;

    assert_matches!(
        notes.delete(note_id).await,
        Err(ServiceError::ValidationError(_))
    );

    notes
        .update_status(note_id, DeliveryNoteStatus::Cancelada)
        .await
        .unwrap();
    notes.delete(note_id).await.unwrap();

    assert_matches!(notes.get(note_id).await, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn status_moves_forward_only() {
    let app = TestApp::new().await;
    let note_id = issue_note(&app).await;
    let notes = &app.state.services.delivery_notes;

    let closed = notes
        .update_status(note_id, DeliveryNoteStatus::Cerrada)
        .await
        .unwrap();
    assert_eq!(closed.status, DeliveryNoteStatus::Cerrada);
    assert_eq!(closed.items.len(), 1);

    assert_matches!(
        notes.update_status(note_id, DeliveryNoteStatus::Activa).await,
        Err(ServiceError::InvalidStateTransition(_))
    );

    let cancelled = notes
        .update_status(note_id, DeliveryNoteStatus::Cancelada)
        .await
        .unwrap();
    assert_eq!(cancelled.status, DeliveryNoteStatus::Cancelada);

    assert_matches!(
        notes.update_status(note_id, DeliveryNoteStatus::Cerrada).await,
        Err(ServiceError::InvalidStateTransition(_))
    );
}

#[tokio::test]
async fn colliding_note_number_is_retried() {
    let app = TestApp::new().await;
    let imported = delivered_order(&app).await;
    insert_note_numbered(&app, &imported, "REM-00001").await;

    let fresh = delivered_order(&app).await;
    let outcome = app
        .state
        .services
        .conversions
        .delivery_note_from_order(fresh.id, None, None)
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.delivery_note.number, "REM-00002");
    assert_eq!(outcome.delivery_note.order_id, fresh.id);
    assert_eq!(outcome.delivery_note.total, dec!(130));
    assert_eq!(outcome.delivery_note.total_quantity, 4);
}

#[tokio::test]
async fn find_by_order_and_list() {
    let app = TestApp::new().await;
    let first = issue_note(&app).await;
    let second = issue_note(&app).await;
    let notes = &app.state.services.delivery_notes;

    notes
        .update_status(first, DeliveryNoteStatus::Cerrada)
        .await
        .unwrap();

    let active = notes
        .list(DeliveryNoteListQuery {
            page: None,
            per_page: None,
            status: Some(DeliveryNoteStatus::Activa),
        })
        .await
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.delivery_notes[0].id, second);

    let all = notes
        .list(DeliveryNoteListQuery {
            page: None,
            per_page: None,
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(all.total, 2);

    let note = notes.get(first).await.unwrap();
    let by_order = notes.find_by_order(note.order_id).await.unwrap().unwrap();
    assert_eq!(by_order.id, first);
    assert!(notes.find_by_order(Uuid::new_v4()).await.unwrap().is_none());
}
