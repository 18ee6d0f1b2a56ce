use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        sale,
    },
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::{
        catalog::{ClientService, ProductService},
        codes::{self, ORDER_PREFIX},
        inventory::{placeholder_product_name, InventoryService},
        sequence::{SequenceService, ORDER_SEQUENCE},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Defaults to the catalog price
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub client_id: Option<Uuid>,
    #[validate]
    pub items: Vec<OrderItemInput>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Resolved from the catalog at read time
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client_id: Option<Uuid>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observation: Option<String>,
    pub status: OrderStatus,
    pub responsible_id: Option<Uuid>,
    pub items: Vec<OrderItemResponse>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Result of a status change; `sale` is set when the order was delivered.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderTransition {
    pub order: OrderResponse,
    pub previous_status: OrderStatus,
    pub sale: Option<SaleSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleSummary {
    pub id: Uuid,
    pub total: Decimal,
    pub item_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&sale::Model> for SaleSummary {
    fn from(sale: &sale::Model) -> Self {
        Self {
            id: sale.id,
            total: sale.total,
            item_count: sale.item_count,
            created_at: sale.created_at,
        }
    }
}

/// Everything needed to persist an order except its number.
#[derive(Debug, Clone)]
pub(crate) struct OrderDraft {
    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client_id: Option<Uuid>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observation: Option<String>,
    pub status: OrderStatus,
    pub responsible_id: Option<Uuid>,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone)]
pub(crate) struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Allocates a `PED-` number and inserts the order with its lines.
///
/// The counter increment runs on `txn`; the inserts run in a savepoint. A
/// unique violation on the number rolls back the savepoint and retries once
/// with a fresh number. A second violation is `DuplicateCode`.
pub(crate) async fn insert_order_with_retry(
    txn: &DatabaseTransaction,
    draft: &OrderDraft,
    code_width: usize,
) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
    match try_insert_order(txn, draft, code_width).await {
        Err(e) if e.is_unique_violation() => {
            warn!(error = %e, "order number collided, allocating a new one");
            try_insert_order(txn, draft, code_width)
                .await
                .map_err(|e| {
                    if e.is_unique_violation() {
                        ServiceError::DuplicateCode(format!("order number: {}", e))
                    } else {
                        e
                    }
                })
        }
        other => other,
    }
}

async fn try_insert_order(
    txn: &DatabaseTransaction,
    draft: &OrderDraft,
    code_width: usize,
) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
    let order_number =
        SequenceService::next_code_in(txn, ORDER_SEQUENCE, ORDER_PREFIX, code_width).await?;

    let savepoint = txn.begin().await?;
    let result = insert_order_rows(&savepoint, order_number, draft).await;
    match result {
        Ok(rows) => {
            savepoint.commit().await?;
            Ok(rows)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}

async fn insert_order_rows<C: ConnectionTrait>(
    conn: &C,
    order_number: String,
    draft: &OrderDraft,
) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
    let order_id = Uuid::new_v4();
    let now = Utc::now();

    let order = order::ActiveModel {
        id: Set(order_id),
        order_number: Set(order_number),
        quote_id: Set(draft.quote_id),
        quote_code: Set(draft.quote_code.clone()),
        client_id: Set(draft.client_id),
        delivery_date: Set(draft.delivery_date),
        observation: Set(draft.observation.clone()),
        status: Set(draft.status),
        responsible_id: Set(draft.responsible_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for (position, line) in draft.lines.iter().enumerate() {
        let item = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            position: Set(position as i32),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
        }
        .insert(conn)
        .await?;
        items.push(item);
    }

    Ok((order, items))
}

/// Loads an order and its items ordered by position.
pub(crate) async fn load_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
    let order = OrderEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order", id))?;
    let items = order
        .find_related(OrderItemEntity)
        .order_by_asc(order_item::Column::Position)
        .all(conn)
        .await?;
    Ok((order, items))
}

/// Products referenced by `items`, keyed by id. Missing products are absent.
pub(crate) async fn products_for<C: ConnectionTrait>(
    conn: &C,
    items: &[order_item::Model],
) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
    if items.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(ProductEntity::find()
        .filter(product::Column::Id.is_in(items.iter().map(|i| i.product_id)))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

pub(crate) async fn order_response<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
    items: Vec<order_item::Model>,
) -> Result<OrderResponse, ServiceError> {
    let products = products_for(conn, &items).await?;
    let items: Vec<OrderItemResponse> = items
        .into_iter()
        .map(|item| OrderItemResponse {
            id: item.id,
            product_id: item.product_id,
            product_name: products
                .get(&item.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| placeholder_product_name(item.product_id)),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.line_total(),
        })
        .collect();
    let total = items.iter().map(|i| i.total).sum();

    Ok(OrderResponse {
        id: order.id,
        order_number: order.order_number,
        quote_id: order.quote_id,
        quote_code: order.quote_code,
        client_id: order.client_id,
        delivery_date: order.delivery_date,
        observation: order.observation,
        status: order.status,
        responsible_id: order.responsible_id,
        items,
        total,
        created_at: order.created_at,
        updated_at: order.updated_at,
    })
}

/// Service for orders (pedidos)
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    code_width: usize,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            code_width: codes::DEFAULT_CODE_WIDTH,
        }
    }

    pub fn with_code_width(mut self, width: usize) -> Self {
        self.code_width = width;
        self
    }

    /// Manual order entry. The order starts `agendado`.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        responsible: Option<Uuid>,
    ) -> Result<OrderResponse, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "An order needs at least one item".to_string(),
            ));
        }
        request.validate()?;
        let db = &*self.db_pool;

        if let Some(client_id) = request.client_id {
            ClientService::get_in(db, client_id).await?;
        }

        let mut lines = Vec::with_capacity(request.items.len());
        for input in &request.items {
            let product = ProductService::get_in(db, input.product_id).await?;
            lines.push(OrderLine {
                product_id: product.id,
                quantity: input.quantity,
                unit_price: input.unit_price.unwrap_or(product.price),
            });
        }

        let draft = OrderDraft {
            quote_id: None,
            quote_code: None,
            client_id: request.client_id,
            delivery_date: request.delivery_date,
            observation: request.observation,
            status: OrderStatus::Agendado,
            responsible_id: responsible,
            lines,
        };

        let txn = db.begin().await?;
        let (order, items) = insert_order_with_retry(&txn, &draft, self.code_width).await?;
        txn.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, "order created");
        events::publish(
            self.event_sender.as_deref(),
            vec![Event::OrderCreated {
                order_id: order.id,
                order_number: order.order_number.clone(),
            }],
        )
        .await;

        order_response(db, order, items).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let (order, items) = load_order(db, id).await?;
        order_response(db, order, items).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_number(&self, order_number: &str) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_number))?;
        let items = order
            .find_related(OrderItemEntity)
            .order_by_asc(order_item::Column::Position)
            .all(db)
            .await?;
        order_response(db, order, items).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderListQuery) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let mut select = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status));
        }

        let paginator = select.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut orders = Vec::with_capacity(models.len());
        for order in models {
            let items = order
                .find_related(OrderItemEntity)
                .order_by_asc(order_item::Column::Position)
                .all(db)
                .await?;
            orders.push(order_response(db, order, items).await?);
        }

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Moves the order along its transition graph.
    ///
    /// Entering `entregado` decrements stock and records a sale in the same
    /// transaction; a shortage leaves both the status and every stock level
    /// untouched. The status write is conditional on the status that was read,
    /// so two racing transitions cannot both apply.
    #[instrument(skip(self), fields(order_id = %id, new_status = %status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderTransition, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let (order, items) = load_order(&txn, id).await?;
        let previous = order.status;
        if !previous.can_transition_to(status) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "order {} cannot move from {} to {}",
                order.order_number, previous, status
            )));
        }

        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::val(status).into())
            .col_expr(order::Column::UpdatedAt, Expr::val(Utc::now()).into())
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::Status.eq(previous))
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "order {} was modified concurrently",
                order.order_number
            )));
        }

        let sale = if status == OrderStatus::Entregado {
            Some(InventoryService::apply_delivery(&txn, &order, &items).await?)
        } else {
            None
        };

        let (order, items) = load_order(&txn, id).await?;
        txn.commit().await?;

        info!(order_number = %order.order_number, from = %previous, to = %status, "order status updated");

        let mut published = vec![Event::OrderStatusChanged {
            order_id: id,
            old_status: previous,
            new_status: status,
        }];
        if let Some(sale) = &sale {
            published.push(Event::OrderDelivered { order_id: id });
            published.push(Event::SaleRecorded {
                sale_id: sale.id,
                order_id: id,
                total: sale.total,
            });
        }
        events::publish(self.event_sender.as_deref(), published).await;

        Ok(OrderTransition {
            order: order_response(db, order, items).await?,
            previous_status: previous,
            sale: sale.as_ref().map(SaleSummary::from),
        })
    }

    /// Shorthand for `update_status(id, entregado)`
    pub async fn mark_delivered(&self, id: Uuid) -> Result<OrderTransition, ServiceError> {
        self.update_status(id, OrderStatus::Entregado).await
    }
}
