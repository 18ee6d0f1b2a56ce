mod common;

use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use ventas_api::{
    entities::{
        order::OrderStatus,
        sale::{self, Entity as SaleEntity},
    },
    errors::ServiceError,
    services::{
        inventory::InventoryService,
        orders::{CreateOrderRequest, OrderItemInput},
    },
};

use common::TestApp;

fn line(product_id: uuid::Uuid, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        product_id,
        quantity,
        unit_price: None,
    }
}

async fn create_order(app: &TestApp, items: Vec<OrderItemInput>) -> uuid::Uuid {
    app.state
        .services
        .orders
        .create_order(
            CreateOrderRequest {
                client_id: None,
                items,
                delivery_date: None,
                observation: None,
            },
            None,
        )
        .await
        .expect("create order")
        .id
}

#[tokio::test]
async fn shortage_rejects_delivery_and_leaves_state_untouched() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena fina m3", dec!(350), 5).await;
    let order_id = create_order(&app, vec![line(product.id, 10)]).await;

    let result = app.state.services.orders.mark_delivered(order_id).await;

    match result {
        Err(ServiceError::InsufficientStock(shortage)) => {
            assert_eq!(shortage.product_id, product.id);
            assert_eq!(shortage.available, 5);
            assert_eq!(shortage.requested, 10);
        }
        Err(other) => panic!("expected InsufficientStock, got {:?}", other),
        Ok(_) => panic!("delivery should have been rejected"),
    }

    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(product.id).await.unwrap(), 5);
    let order = app.state.services.orders.get_order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Agendado);
    assert_eq!(SaleEntity::find().count(&*app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn delivery_decrements_stock_and_records_sale() {
    let app = TestApp::new().await;
    let cement = app.seed_product("Cemento gris 50kg", dec!(32.50), 100).await;
    let wire = app.seed_product("Alambre recocido kg", dec!(42), 30).await;
    let order_id = create_order(&app, vec![line(cement.id, 10), line(wire.id, 3)]).await;

    let transition = app
        .state
        .services
        .orders
        .mark_delivered(order_id)
        .await
        .unwrap();

    assert_eq!(transition.previous_status, OrderStatus::Agendado);
    assert_eq!(transition.order.status, OrderStatus::Entregado);
    let summary = transition.sale.expect("sale recorded on delivery");
    assert_eq!(summary.total, dec!(451));
    assert_eq!(summary.item_count, 2);

    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(cement.id).await.unwrap(), 90);
    assert_eq!(inventory.stock_of(wire.id).await.unwrap(), 27);

    let stored = SaleEntity::find()
        .filter(sale::Column::OrderId.eq(order_id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    let lines = stored.lines().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines
        .iter()
        .any(|l| l.product_name == "Cemento gris 50kg" && l.total == dec!(325)));
}

#[tokio::test]
async fn shortage_on_second_line_rolls_back_the_first() {
    let app = TestApp::new().await;
    let plenty = app.seed_product("Block 15x20x40", dec!(12), 500).await;
    let scarce = app.seed_product("Grava 3/4 m3", dec!(380), 2).await;
    let order_id = create_order(&app, vec![line(plenty.id, 100), line(scarce.id, 3)]).await;

    let result = app.state.services.orders.mark_delivered(order_id).await;
    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));

    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(plenty.id).await.unwrap(), 500);
    assert_eq!(inventory.stock_of(scarce.id).await.unwrap(), 2);
}

#[tokio::test]
async fn repeated_product_lines_are_checked_together() {
    let app = TestApp::new().await;
    let product = app.seed_product("Varilla corrugada 3/8", dec!(18.90), 8).await;
    // Each line fits on its own; together they do not
    let order_id = create_order(&app, vec![line(product.id, 5), line(product.id, 5)]).await;

    let result = app.state.services.orders.mark_delivered(order_id).await;

    match result {
        Err(ServiceError::InsufficientStock(shortage)) => assert_eq!(shortage.requested, 10),
        Err(other) => panic!("expected InsufficientStock, got {:?}", other),
        Ok(_) => panic!("delivery should have been rejected"),
    }
    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(product.id).await.unwrap(), 8);
}

#[tokio::test]
async fn dispatch_does_not_touch_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena fina m3", dec!(350), 5).await;
    let order_id = create_order(&app, vec![line(product.id, 2)]).await;
    let orders = &app.state.services.orders;

    let transition = orders
        .update_status(order_id, OrderStatus::Despachado)
        .await
        .unwrap();
    assert!(transition.sale.is_none());

    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(product.id).await.unwrap(), 5);

    orders.mark_delivered(order_id).await.unwrap();
    assert_eq!(inventory.stock_of(product.id).await.unwrap(), 3);
}

#[tokio::test]
async fn delivered_order_cannot_be_delivered_again() {
    let app = TestApp::new().await;
    let product = app.seed_product("Arena fina m3", dec!(350), 5).await;
    let order_id = create_order(&app, vec![line(product.id, 2)]).await;
    let orders = &app.state.services.orders;

    orders.mark_delivered(order_id).await.unwrap();
    let again = orders.mark_delivered(order_id).await;

    assert!(matches!(again, Err(ServiceError::InvalidStateTransition(_))));
    let inventory = InventoryService::new(app.db.clone());
    assert_eq!(inventory.stock_of(product.id).await.unwrap(), 3);
    assert_eq!(SaleEntity::find().count(&*app.db).await.unwrap(), 1);
}
