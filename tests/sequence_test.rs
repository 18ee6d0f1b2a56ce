mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;
use ventas_api::{
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    services::{
        orders::{CreateOrderRequest, OrderItemInput},
        sequence::{SequenceService, DELIVERY_NOTE_SEQUENCE, ORDER_SEQUENCE},
    },
};

use common::TestApp;

async fn insert_order_with_number(app: &TestApp, number: &str) {
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(number.to_string()),
        quote_id: Set(None),
        quote_code: Set(None),
        client_id: Set(None),
        delivery_date: Set(None),
        observation: Set(Some("importado".to_string())),
        status: Set(OrderStatus::Agendado),
        responsible_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.db)
    .await
    .expect("insert legacy order");
}

fn order_request(product_id: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        client_id: None,
        items: vec![OrderItemInput {
            product_id,
            quantity: 1,
            unit_price: None,
        }],
        delivery_date: None,
        observation: None,
    }
}

#[tokio::test]
async fn concurrent_allocations_are_unique_and_contiguous() {
    let app = TestApp::new().await;
    let sequences = SequenceService::new(app.db.clone());

    let mut handles = Vec::new();
    for _ in 0..40 {
        let sequences = sequences.clone();
        handles.push(tokio::spawn(async move {
            sequences.next_value(ORDER_SEQUENCE).await
        }));
    }

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap().unwrap());
    }

    let unique: HashSet<i64> = values.iter().copied().collect();
    assert_eq!(unique.len(), 40);
    values.sort_unstable();
    assert_eq!(values, (1..=40).collect::<Vec<i64>>());
    assert_eq!(sequences.current_value(ORDER_SEQUENCE).await.unwrap(), 40);
}

#[tokio::test]
async fn sequences_are_independent() {
    let app = TestApp::new().await;
    let sequences = SequenceService::new(app.db.clone());

    assert_eq!(sequences.next_value(ORDER_SEQUENCE).await.unwrap(), 1);
    assert_eq!(sequences.next_value(ORDER_SEQUENCE).await.unwrap(), 2);
    assert_eq!(sequences.next_value(DELIVERY_NOTE_SEQUENCE).await.unwrap(), 1);
    assert_eq!(sequences.current_value("sin-usar").await.unwrap(), 0);
}

#[tokio::test]
async fn order_numbers_follow_the_counter() {
    let app = TestApp::new().await;
    let product = app.seed_product("Cemento gris 50kg", dec!(32.50), 100).await;
    let orders = &app.state.services.orders;

    let first = orders.create_order(order_request(product.id), None).await.unwrap();
    let second = orders.create_order(order_request(product.id), None).await.unwrap();

    assert_eq!(first.order_number, "PED-00001");
    assert_eq!(second.order_number, "PED-00002");
    assert_eq!(first.status, OrderStatus::Agendado);
}

#[tokio::test]
async fn colliding_order_number_is_retried_with_next_value() {
    let app = TestApp::new().await;
    let product = app.seed_product("Varilla 3/8", dec!(18.90), 100).await;
    // Legacy row that the fresh counter will collide with
    insert_order_with_number(&app, "PED-00001").await;

    let order = app
        .state
        .services
        .orders
        .create_order(order_request(product.id), None)
        .await
        .unwrap();

    assert_eq!(order.order_number, "PED-00002");
}

#[tokio::test]
async fn second_collision_surfaces_duplicate_code() {
    let app = TestApp::new().await;
    let product = app.seed_product("Block 15x20x40", dec!(12), 100).await;
    insert_order_with_number(&app, "PED-00001").await;
    insert_order_with_number(&app, "PED-00002").await;

    let result = app
        .state
        .services
        .orders
        .create_order(order_request(product.id), None)
        .await;

    assert_matches!(result, Err(ServiceError::DuplicateCode(_)));

    // The failed transaction released both allocations
    let sequences = SequenceService::new(app.db.clone());
    assert_eq!(sequences.current_value(ORDER_SEQUENCE).await.unwrap(), 0);
}
