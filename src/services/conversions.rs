use crate::{
    db::DbPool,
    entities::{
        client::Entity as ClientEntity,
        order::{self, OrderStatus},
        order_item,
        product::{self, Entity as ProductEntity},
        quote::{self, Entity as QuoteEntity, QuoteStatus},
        quote_item,
    },
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::{
        catalog::ClientSnapshot,
        codes,
        delivery_notes::{
            find_by_order_in, insert_delivery_note_with_retry, DeliveryNoteDraft,
            DeliveryNoteResponse, NoteInsert, NoteLine,
        },
        inventory::placeholder_product_name,
        orders::{
            insert_order_with_retry, load_order, order_response, products_for, OrderDraft,
            OrderLine, OrderResponse,
        },
        quotes::{load_quote, QuoteResponse},
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Client name used when an order carries no client reference at all
pub const UNREGISTERED_CLIENT: &str = "Cliente sin registrar";

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RemissionRequest {
    pub delivery_date: Option<DateTime<Utc>>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteFromOrderRequest {
    pub observations: Option<String>,
}

/// Documents produced by converting a quote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemissionResult {
    pub quote: QuoteResponse,
    pub order: OrderResponse,
    pub delivery_note: DeliveryNoteResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteOutcome {
    pub delivery_note: DeliveryNoteResponse,
    /// False when an existing note for the order was returned
    pub created: bool,
}

/// Turns quotes into orders and delivery notes, and orders into delivery notes.
///
/// Each conversion runs in one transaction covering counter allocation, the
/// new documents and the source status change.
#[derive(Clone)]
pub struct ConversionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    code_width: usize,
    remission_source_states: Vec<OrderStatus>,
}

impl ConversionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            code_width: codes::DEFAULT_CODE_WIDTH,
            remission_source_states: vec![OrderStatus::Entregado, OrderStatus::Despachado],
        }
    }

    pub fn with_code_width(mut self, width: usize) -> Self {
        self.code_width = width;
        self
    }

    /// Order states from which a delivery note may be issued
    pub fn with_remission_source_states(mut self, states: Vec<OrderStatus>) -> Self {
        self.remission_source_states = states;
        self
    }

    pub fn remission_source_states(&self) -> &[OrderStatus] {
        &self.remission_source_states
    }

    /// Converts a quote into an order in state `entregado` plus its delivery note,
    /// and marks the quote `remisionado`.
    ///
    /// The order is created already delivered, so no stock adjustment runs here.
    #[instrument(skip(self, request), fields(quote_id = %quote_id))]
    pub async fn remission_quote(
        &self,
        quote_id: Uuid,
        request: RemissionRequest,
        responsible: Option<Uuid>,
    ) -> Result<RemissionResult, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let (quote, quote_items) = load_quote(&txn, quote_id).await?;
        match quote.status {
            QuoteStatus::Remisionado => {
                return Err(ServiceError::InvalidStateTransition(format!(
                    "quote {} was already remissioned",
                    quote.code
                )))
            }
            QuoteStatus::Cancelada => {
                return Err(ServiceError::InvalidStateTransition(format!(
                    "quote {} is cancelada",
                    quote.code
                )))
            }
            QuoteStatus::Activa | QuoteStatus::Cerrada => {}
        }
        if quote.order_id.is_some() {
            return Err(ServiceError::InvalidStateTransition(format!(
                "quote {} was already converted into an order",
                quote.code
            )));
        }
        if quote_items.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "quote {} has no items",
                quote.code
            )));
        }

        let client = quote_client(&txn, &quote).await?;

        let order_draft = OrderDraft {
            quote_id: Some(quote.id),
            quote_code: Some(quote.code.clone()),
            client_id: quote.client_id,
            delivery_date: request.delivery_date,
            observation: request.observations.clone(),
            status: OrderStatus::Entregado,
            responsible_id: responsible,
            lines: quote_items
                .iter()
                .map(|item| OrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.effective_unit_price(),
                })
                .collect(),
        };
        let (order, order_items) =
            insert_order_with_retry(&txn, &order_draft, self.code_width).await?;

        let products = products_by_id(&txn, quote_items.iter().map(|i| i.product_id)).await?;
        let note_draft = DeliveryNoteDraft {
            order_id: order.id,
            order_code: order.order_number.clone(),
            quote_id: Some(quote.id),
            quote_code: Some(quote.code.clone()),
            client,
            responsible_id: responsible,
            delivery_date: request.delivery_date,
            observations: request.observations,
            lines: quote_items
                .iter()
                .map(|item| quote_line_snapshot(item, products.get(&item.product_id)))
                .collect(),
        };
        let (note, note_items) =
            match insert_delivery_note_with_retry(&txn, &note_draft, self.code_width).await? {
                NoteInsert::Created(note, items) | NoteInsert::Existing(note, items) => (note, items),
            };

        let marked = QuoteEntity::update_many()
            .col_expr(quote::Column::Status, Expr::val(QuoteStatus::Remisionado).into())
            .col_expr(quote::Column::OrderId, Expr::val(order.id).into())
            .col_expr(quote::Column::UpdatedAt, Expr::val(Utc::now()).into())
            .filter(quote::Column::Id.eq(quote.id))
            .filter(quote::Column::Status.eq(quote.status))
            .exec(&txn)
            .await?;
        if marked.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "quote {} was modified concurrently",
                quote.code
            )));
        }

        let (quote, quote_items) = load_quote(&txn, quote_id).await?;
        let order_view = order_response(&txn, order, order_items).await?;

        commit_conversion(txn, "quote remission").await?;

        metrics::counter!("ventas.conversions", 1, "kind" => "quote_remission");
        info!(
            code = %quote.code,
            order_number = %order_view.order_number,
            delivery_note = %note.number,
            "quote remissioned"
        );

        events::publish(
            self.event_sender.as_deref(),
            vec![
                Event::OrderCreated {
                    order_id: order_view.id,
                    order_number: order_view.order_number.clone(),
                },
                Event::DeliveryNoteCreated {
                    delivery_note_id: note.id,
                    number: note.number.clone(),
                    order_id: order_view.id,
                },
                Event::QuoteRemissioned {
                    quote_id,
                    order_id: order_view.id,
                    delivery_note_id: note.id,
                },
            ],
        )
        .await;

        Ok(RemissionResult {
            quote: QuoteResponse::from_parts(quote, quote_items),
            order: order_view,
            delivery_note: DeliveryNoteResponse::from_parts(note, note_items),
        })
    }

    /// Issues the delivery note for an order, or returns the one it already has.
    #[instrument(skip(self, observations), fields(order_id = %order_id))]
    pub async fn delivery_note_from_order(
        &self,
        order_id: Uuid,
        observations: Option<String>,
        responsible: Option<Uuid>,
    ) -> Result<DeliveryNoteOutcome, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let (order, items) = load_order(&txn, order_id).await?;

        if let Some((note, note_items)) = find_by_order_in(&txn, order_id).await? {
            info!(number = %note.number, "order already has a delivery note");
            return Ok(DeliveryNoteOutcome {
                delivery_note: DeliveryNoteResponse::from_parts(note, note_items),
                created: false,
            });
        }

        if !self.remission_source_states.contains(&order.status) {
            let accepted: Vec<String> = self
                .remission_source_states
                .iter()
                .map(ToString::to_string)
                .collect();
            return Err(ServiceError::InvalidStateTransition(format!(
                "order {} is {}; delivery notes require one of: {}",
                order.order_number,
                order.status,
                accepted.join(", ")
            )));
        }
        if items.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "order {} has no items",
                order.order_number
            )));
        }

        let client = order_client(&txn, &order).await?;
        let products = products_for(&txn, &items).await?;
        let draft = DeliveryNoteDraft {
            order_id: order.id,
            order_code: order.order_number.clone(),
            quote_id: order.quote_id,
            quote_code: order.quote_code.clone(),
            client,
            responsible_id: responsible,
            delivery_date: order.delivery_date,
            observations,
            lines: items
                .iter()
                .map(|item| order_line_snapshot(item, products.get(&item.product_id)))
                .collect(),
        };

        let outcome = insert_delivery_note_with_retry(&txn, &draft, self.code_width).await?;
        commit_conversion(txn, "delivery note from order").await?;

        match outcome {
            NoteInsert::Created(note, note_items) => {
                metrics::counter!("ventas.conversions", 1, "kind" => "order_delivery_note");
                info!(number = %note.number, order_number = %order.order_number, "delivery note created");
                events::publish(
                    self.event_sender.as_deref(),
                    vec![Event::DeliveryNoteCreated {
                        delivery_note_id: note.id,
                        number: note.number.clone(),
                        order_id: order.id,
                    }],
                )
                .await;
                Ok(DeliveryNoteOutcome {
                    delivery_note: DeliveryNoteResponse::from_parts(note, note_items),
                    created: true,
                })
            }
            NoteInsert::Existing(note, note_items) => Ok(DeliveryNoteOutcome {
                delivery_note: DeliveryNoteResponse::from_parts(note, note_items),
                created: false,
            }),
        }
    }
}

async fn commit_conversion(txn: DatabaseTransaction, kind: &str) -> Result<(), ServiceError> {
    txn.commit().await.map_err(|e| {
        error!(error = %e, kind, "conversion commit failed");
        ServiceError::PartialConversionFailure(format!("{} could not be committed: {}", kind, e))
    })
}

async fn products_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: impl Iterator<Item = Uuid>,
) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
    Ok(ProductEntity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

/// Registered client data when the quote references one that still exists,
/// otherwise the snapshot stored on the quote.
async fn quote_client<C: ConnectionTrait>(
    conn: &C,
    quote: &quote::Model,
) -> Result<ClientSnapshot, ServiceError> {
    if let Some(client_id) = quote.client_id {
        if let Some(client) = ClientEntity::find_by_id(client_id).one(conn).await? {
            return Ok(client.into());
        }
    }
    Ok(ClientSnapshot {
        name: quote.client_name.clone(),
        email: quote.client_email.clone(),
        phone: quote.client_phone.clone(),
        city: quote.client_city.clone(),
        address: quote.client_address.clone(),
    })
}

/// Client for an order: its own reference, then its source quote, then a placeholder.
async fn order_client<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<ClientSnapshot, ServiceError> {
    if let Some(client_id) = order.client_id {
        if let Some(client) = ClientEntity::find_by_id(client_id).one(conn).await? {
            return Ok(client.into());
        }
    }
    if let Some(quote_id) = order.quote_id {
        if let Some(quote) = QuoteEntity::find_by_id(quote_id).one(conn).await? {
            return quote_client(conn, &quote).await;
        }
    }
    Ok(ClientSnapshot {
        name: UNREGISTERED_CLIENT.to_string(),
        ..Default::default()
    })
}

fn quote_line_snapshot(item: &quote_item::Model, product: Option<&product::Model>) -> NoteLine {
    NoteLine {
        name: product
            .map(|p| p.name.clone())
            .unwrap_or_else(|| item.product_name.clone()),
        quantity: item.quantity,
        unit_price: item.effective_unit_price(),
        description: product.and_then(|p| p.description.clone()),
        code: product.and_then(|p| p.code.clone()),
    }
}

fn order_line_snapshot(item: &order_item::Model, product: Option<&product::Model>) -> NoteLine {
    NoteLine {
        name: product
            .map(|p| p.name.clone())
            .unwrap_or_else(|| placeholder_product_name(item.product_id)),
        quantity: item.quantity,
        unit_price: item.unit_price,
        description: product.and_then(|p| p.description.clone()),
        code: product.and_then(|p| p.code.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote_item(unit_price: Option<rust_decimal::Decimal>, unit_value: Option<rust_decimal::Decimal>) -> quote_item::Model {
        quote_item::Model {
            id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            position: 0,
            product_id: Uuid::new_v4(),
            product_name: "Cemento gris 50kg".into(),
            quantity: 2,
            unit_price,
            unit_value,
            discount: dec!(0),
            subtotal: dec!(0),
        }
    }

    #[test]
    fn quote_line_prefers_unit_value_over_unit_price() {
        let line = quote_line_snapshot(&quote_item(Some(dec!(10)), Some(dec!(12))), None);
        assert_eq!(line.unit_price, dec!(12));

        let line = quote_line_snapshot(&quote_item(Some(dec!(10)), None), None);
        assert_eq!(line.unit_price, dec!(10));
    }

    #[test]
    fn quote_line_falls_back_to_quoted_name() {
        let line = quote_line_snapshot(&quote_item(Some(dec!(10)), None), None);
        assert_eq!(line.name, "Cemento gris 50kg");
        assert!(line.description.is_none());
    }
}
