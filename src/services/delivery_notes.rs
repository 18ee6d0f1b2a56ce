use crate::{
    db::DbPool,
    entities::{
        delivery_note::{self, DeliveryNoteStatus, Entity as DeliveryNoteEntity},
        delivery_note_item::{self, Entity as DeliveryNoteItemEntity},
    },
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::{
        catalog::ClientSnapshot,
        codes::DELIVERY_NOTE_PREFIX,
        sequence::{SequenceService, DELIVERY_NOTE_SEQUENCE},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDeliveryNoteStatusRequest {
    pub status: DeliveryNoteStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeliveryNoteListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<DeliveryNoteStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteItemResponse {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub description: Option<String>,
    pub code: Option<String>,
}

impl From<delivery_note_item::Model> for DeliveryNoteItemResponse {
    fn from(item: delivery_note_item::Model) -> Self {
        Self {
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
            description: item.description,
            code: item.code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteResponse {
    pub id: Uuid,
    pub number: String,
    pub order_id: Uuid,
    pub order_code: String,
    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client: ClientSnapshot,
    pub responsible_id: Option<Uuid>,
    pub status: DeliveryNoteStatus,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub item_count: i32,
    pub total_quantity: i32,
    pub issued_at: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observations: Option<String>,
    pub items: Vec<DeliveryNoteItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryNoteResponse {
    pub fn from_parts(note: delivery_note::Model, items: Vec<delivery_note_item::Model>) -> Self {
        Self {
            id: note.id,
            number: note.number,
            order_id: note.order_id,
            order_code: note.order_code,
            quote_id: note.quote_id,
            quote_code: note.quote_code,
            client: ClientSnapshot {
                name: note.client_name,
                email: note.client_email,
                phone: note.client_phone,
                city: note.client_city,
                address: note.client_address,
            },
            responsible_id: note.responsible_id,
            status: note.status,
            subtotal: note.subtotal,
            total: note.total,
            item_count: note.item_count,
            total_quantity: note.total_quantity,
            issued_at: note.issued_at,
            delivery_date: note.delivery_date,
            observations: note.observations,
            items: items.into_iter().map(Into::into).collect(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteListResponse {
    pub delivery_notes: Vec<DeliveryNoteResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Snapshot line copied onto a delivery note.
#[derive(Debug, Clone)]
pub(crate) struct NoteLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub description: Option<String>,
    pub code: Option<String>,
}

impl NoteLine {
    fn total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Everything needed to persist a delivery note except its number.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryNoteDraft {
    pub order_id: Uuid,
    pub order_code: String,
    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client: ClientSnapshot,
    pub responsible_id: Option<Uuid>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observations: Option<String>,
    pub lines: Vec<NoteLine>,
}

/// Aggregates stored on a delivery note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTotals {
    pub subtotal: Decimal,
    pub total: Decimal,
    pub item_count: i32,
    pub total_quantity: i32,
}

/// `total = Σ quantity × unit_price`, `item_count` lines, `total_quantity = Σ quantity`.
pub fn note_totals(lines: impl IntoIterator<Item = (i32, Decimal)>) -> NoteTotals {
    let mut totals = NoteTotals {
        subtotal: Decimal::ZERO,
        total: Decimal::ZERO,
        item_count: 0,
        total_quantity: 0,
    };
    for (quantity, unit_price) in lines {
        totals.subtotal += Decimal::from(quantity) * unit_price;
        totals.item_count += 1;
        totals.total_quantity += quantity;
    }
    totals.total = totals.subtotal;
    totals
}

pub(crate) enum NoteInsert {
    Created(delivery_note::Model, Vec<delivery_note_item::Model>),
    /// Another delivery note already references the order
    Existing(delivery_note::Model, Vec<delivery_note_item::Model>),
}

/// Allocates a `REM-` number and inserts the note inside a savepoint.
///
/// On a unique violation the savepoint is rolled back and the order is looked
/// up: an existing note for it is returned as [`NoteInsert::Existing`];
/// otherwise the number collided and one retry runs with a fresh number.
pub(crate) async fn insert_delivery_note_with_retry(
    txn: &DatabaseTransaction,
    draft: &DeliveryNoteDraft,
    code_width: usize,
) -> Result<NoteInsert, ServiceError> {
    let mut last_error = None;
    for attempt in 1..=2 {
        let number = SequenceService::next_code_in(
            txn,
            DELIVERY_NOTE_SEQUENCE,
            DELIVERY_NOTE_PREFIX,
            code_width,
        )
        .await?;

        let savepoint = txn.begin().await?;
        let result = insert_note_rows(&savepoint, number, draft).await;
        match result {
            Ok((note, items)) => {
                savepoint.commit().await?;
                return Ok(NoteInsert::Created(note, items));
            }
            Err(e) if e.is_unique_violation() => {
                savepoint.rollback().await?;
                if let Some((note, items)) = find_by_order_in(txn, draft.order_id).await? {
                    info!(number = %note.number, "delivery note already exists for order");
                    return Ok(NoteInsert::Existing(note, items));
                }
                warn!(attempt, error = %e, "delivery note number collided");
                last_error = Some(e);
            }
            Err(e) => {
                savepoint.rollback().await?;
                return Err(e);
            }
        }
    }

    Err(ServiceError::DuplicateCode(format!(
        "delivery note number: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

async fn insert_note_rows<C: ConnectionTrait>(
    conn: &C,
    number: String,
    draft: &DeliveryNoteDraft,
) -> Result<(delivery_note::Model, Vec<delivery_note_item::Model>), ServiceError> {
    let note_id = Uuid::new_v4();
    let now = Utc::now();
    let totals = note_totals(draft.lines.iter().map(|l| (l.quantity, l.unit_price)));

    let note = delivery_note::ActiveModel {
        id: Set(note_id),
        number: Set(number),
        order_id: Set(draft.order_id),
        order_code: Set(draft.order_code.clone()),
        quote_id: Set(draft.quote_id),
        quote_code: Set(draft.quote_code.clone()),
        client_name: Set(draft.client.name.clone()),
        client_email: Set(draft.client.email.clone()),
        client_phone: Set(draft.client.phone.clone()),
        client_city: Set(draft.client.city.clone()),
        client_address: Set(draft.client.address.clone()),
        responsible_id: Set(draft.responsible_id),
        status: Set(DeliveryNoteStatus::Activa),
        subtotal: Set(totals.subtotal),
        total: Set(totals.total),
        item_count: Set(totals.item_count),
        total_quantity: Set(totals.total_quantity),
        issued_at: Set(now),
        delivery_date: Set(draft.delivery_date),
        observations: Set(draft.observations.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for (position, line) in draft.lines.iter().enumerate() {
        let item = delivery_note_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_note_id: Set(note_id),
            position: Set(position as i32),
            name: Set(line.name.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total: Set(line.total()),
            description: Set(line.description.clone()),
            code: Set(line.code.clone()),
        }
        .insert(conn)
        .await?;
        items.push(item);
    }

    Ok((note, items))
}

async fn items_of<C: ConnectionTrait>(
    conn: &C,
    note: &delivery_note::Model,
) -> Result<Vec<delivery_note_item::Model>, ServiceError> {
    Ok(note
        .find_related(DeliveryNoteItemEntity)
        .order_by_asc(delivery_note_item::Column::Position)
        .all(conn)
        .await?)
}

pub(crate) async fn find_by_order_in<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Option<(delivery_note::Model, Vec<delivery_note_item::Model>)>, ServiceError> {
    match DeliveryNoteEntity::find()
        .filter(delivery_note::Column::OrderId.eq(order_id))
        .one(conn)
        .await?
    {
        Some(note) => {
            let items = items_of(conn, &note).await?;
            Ok(Some((note, items)))
        }
        None => Ok(None),
    }
}

/// Service for delivery notes (remisiones)
#[derive(Clone)]
pub struct DeliveryNoteService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl DeliveryNoteService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn load(&self, id: Uuid) -> Result<(delivery_note::Model, Vec<delivery_note_item::Model>), ServiceError> {
        let db = &*self.db_pool;
        let note = DeliveryNoteEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery note", id))?;
        let items = items_of(db, &note).await?;
        Ok((note, items))
    }

    #[instrument(skip(self), fields(delivery_note_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<DeliveryNoteResponse, ServiceError> {
        let (note, items) = self.load(id).await?;
        Ok(DeliveryNoteResponse::from_parts(note, items))
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn find_by_order(&self, order_id: Uuid) -> Result<Option<DeliveryNoteResponse>, ServiceError> {
        Ok(find_by_order_in(&*self.db_pool, order_id)
            .await?
            .map(|(note, items)| DeliveryNoteResponse::from_parts(note, items)))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: DeliveryNoteListQuery) -> Result<DeliveryNoteListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let mut select = DeliveryNoteEntity::find().order_by_desc(delivery_note::Column::IssuedAt);
        if let Some(status) = query.status {
            select = select.filter(delivery_note::Column::Status.eq(status));
        }

        let paginator = select.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut delivery_notes = Vec::with_capacity(models.len());
        for note in models {
            let items = items_of(db, &note).await?;
            delivery_notes.push(DeliveryNoteResponse::from_parts(note, items));
        }

        Ok(DeliveryNoteListResponse {
            delivery_notes,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self), fields(delivery_note_id = %id, new_status = %status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: DeliveryNoteStatus,
    ) -> Result<DeliveryNoteResponse, ServiceError> {
        let db = &*self.db_pool;
        let (note, items) = self.load(id).await?;
        let previous = note.status;

        if !previous.can_transition_to(status) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "delivery note {} cannot move from {} to {}",
                note.number, previous, status
            )));
        }

        let result = DeliveryNoteEntity::update_many()
            .col_expr(delivery_note::Column::Status, Expr::val(status).into())
            .col_expr(delivery_note::Column::UpdatedAt, Expr::val(Utc::now()).into())
            .filter(delivery_note::Column::Id.eq(id))
            .filter(delivery_note::Column::Status.eq(previous))
            .exec(db)
            .await?;
        if result.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "delivery note {} was modified concurrently",
                note.number
            )));
        }

        info!(number = %note.number, from = %previous, to = %status, "delivery note status updated");
        events::publish(
            self.event_sender.as_deref(),
            vec![Event::DeliveryNoteStatusChanged {
                delivery_note_id: id,
                old_status: previous,
                new_status: status,
            }],
        )
        .await;

        let updated = DeliveryNoteEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery note", id))?;
        Ok(DeliveryNoteResponse::from_parts(updated, items))
    }

    /// Removes a cancelled delivery note and its lines.
    #[instrument(skip(self), fields(delivery_note_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        let note = DeliveryNoteEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery note", id))?;

        if !note.status.is_deletable() {
            return Err(ServiceError::ValidationError(format!(
                "delivery note {} is {}; only cancelled notes can be deleted",
                note.number, note.status
            )));
        }

        DeliveryNoteItemEntity::delete_many()
            .filter(delivery_note_item::Column::DeliveryNoteId.eq(id))
            .exec(&txn)
            .await?;
        let number = note.number.clone();
        note.delete(&txn).await?;
        txn.commit().await?;

        info!(%number, "delivery note deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_sum_quantities_and_amounts() {
        let totals = note_totals(vec![(3, dec!(100)), (1, dec!(50))]);
        assert_eq!(totals.total, dec!(350));
        assert_eq!(totals.subtotal, dec!(350));
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.total_quantity, 4);
    }

    #[test]
    fn empty_note_totals_are_zero() {
        let totals = note_totals(Vec::new());
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.item_count, 0);
    }
}
