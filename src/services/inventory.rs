use crate::{
    db::DbPool,
    entities::{
        order, order_item,
        product::{self, Entity as ProductEntity},
        sale::{self, SaleLine},
    },
    errors::{ServiceError, StockShortage},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Stock decrements and sale records for delivered orders.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Current stock of a product
    pub async fn stock_of(&self, product_id: Uuid) -> Result<i32, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .map(|p| p.stock)
            .ok_or_else(|| ServiceError::not_found("Product", product_id))
    }

    /// Decrements stock for every line of `order` and records the sale.
    ///
    /// Quantities are summed per product and each product is decremented with
    /// one conditional update (`stock >= requested`). All writes happen inside
    /// a nested transaction on `conn`: the first shortage rolls back every
    /// decrement already applied and is returned as `InsufficientStock`.
    #[instrument(skip(conn, order, items), fields(order_id = %order.id, order_number = %order.order_number))]
    pub async fn apply_delivery<C>(
        conn: &C,
        order: &order::Model,
        items: &[order_item::Model],
    ) -> Result<sale::Model, ServiceError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = conn.begin().await?;
        match Self::decrement_and_record(&txn, order, items).await {
            Ok(sale) => {
                txn.commit().await?;
                info!(sale_id = %sale.id, total = %sale.total, "stock decremented for delivery");
                Ok(sale)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn decrement_and_record<C>(
        conn: &C,
        order: &order::Model,
        items: &[order_item::Model],
    ) -> Result<sale::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        // BTreeMap keeps a stable update order across concurrent deliveries
        let mut requested: BTreeMap<Uuid, i32> = BTreeMap::new();
        for item in items {
            *requested.entry(item.product_id).or_insert(0) += item.quantity;
        }

        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(requested.keys().copied()))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        for (&product_id, &quantity) in &requested {
            let result = ProductEntity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(quantity),
                )
                .filter(product::Column::Id.eq(product_id))
                .filter(product::Column::Stock.gte(quantity))
                .exec(conn)
                .await?;

            if result.rows_affected != 1 {
                let current = ProductEntity::find_by_id(product_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
                metrics::counter!("ventas.inventory.stock_rejected", 1);
                warn!(
                    %product_id,
                    available = current.stock,
                    requested = quantity,
                    "insufficient stock for delivery"
                );
                return Err(ServiceError::InsufficientStock(StockShortage {
                    product_id,
                    product_name: current.name,
                    available: current.stock,
                    requested: quantity,
                }));
            }
        }

        let lines: Vec<SaleLine> = items
            .iter()
            .map(|item| SaleLine {
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
        let total: Decimal = lines.iter().map(|l| l.total).sum();
        let items_json = serde_json::to_value(&lines)
            .map_err(|e| ServiceError::InternalError(format!("sale items: {}", e)))?;

        let sale = sale::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            order_number: Set(order.order_number.clone()),
            items: Set(items_json),
            total: Set(total),
            item_count: Set(lines.len() as i32),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(sale)
    }
}

/// Name used when a referenced product no longer resolves.
pub fn placeholder_product_name(product_id: Uuid) -> String {
    let short = product_id.simple().to_string();
    format!("Producto {}", &short[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_uses_short_id() {
        let id = Uuid::parse_str("12345678-9abc-def0-1234-56789abcdef0").unwrap();
        assert_eq!(placeholder_product_name(id), "Producto 12345678");
    }
}
