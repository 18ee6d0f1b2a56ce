use crate::{
    db::DbPool,
    entities::{
        quote::{self, Entity as QuoteEntity, QuoteStatus},
        quote_item::{self, Entity as QuoteItemEntity},
    },
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::{
        catalog::{ClientService, ClientSnapshot, ProductService},
        codes,
    },
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Attempts at finding an unused random quote code before giving up
pub const MAX_QUOTE_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct QuoteItemInput {
    pub product_id: Uuid,
    /// Overrides the catalog name on the quote
    pub product_name: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub unit_value: Option<Decimal>,
    /// Percentage between 0 and 100
    #[validate(custom = "validate_discount")]
    pub discount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuoteRequest {
    /// Registered client; takes precedence over `client`
    pub client_id: Option<Uuid>,
    #[validate]
    pub client: Option<ClientSnapshot>,
    #[validate]
    pub items: Vec<QuoteItemInput>,
    pub observations: Option<String>,
}

impl CreateQuoteRequest {
    fn check(&self) -> Result<(), ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "A quote needs at least one item".to_string(),
            ));
        }
        self.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteStatusRequest {
    pub status: QuoteStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuoteListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<QuoteStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub unit_value: Option<Decimal>,
    pub discount: Decimal,
    pub subtotal: Decimal,
}

impl From<quote_item::Model> for QuoteItemResponse {
    fn from(item: quote_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            unit_value: item.unit_value,
            discount: item.discount,
            subtotal: item.subtotal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    pub id: Uuid,
    pub code: String,
    pub client_id: Option<Uuid>,
    pub client: ClientSnapshot,
    pub responsible_id: Option<Uuid>,
    pub status: QuoteStatus,
    pub order_id: Option<Uuid>,
    pub total: Decimal,
    pub observations: Option<String>,
    pub items: Vec<QuoteItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteResponse {
    pub fn from_parts(quote: quote::Model, items: Vec<quote_item::Model>) -> Self {
        Self {
            id: quote.id,
            code: quote.code,
            client_id: quote.client_id,
            client: ClientSnapshot {
                name: quote.client_name,
                email: quote.client_email,
                phone: quote.client_phone,
                city: quote.client_city,
                address: quote.client_address,
            },
            responsible_id: quote.responsible_id,
            status: quote.status,
            order_id: quote.order_id,
            total: quote.total,
            observations: quote.observations,
            items: items.into_iter().map(Into::into).collect(),
            created_at: quote.created_at,
            updated_at: quote.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteListResponse {
    pub quotes: Vec<QuoteResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn validate_discount(discount: &Decimal) -> Result<(), ValidationError> {
    if *discount < Decimal::ZERO || *discount > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("discount");
        err.message = Some("Discount must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

/// `quantity × price × (1 − discount / 100)`, rounded to cents.
pub fn line_subtotal(quantity: i32, unit_price: Decimal, discount: Decimal) -> Decimal {
    let gross = Decimal::from(quantity) * unit_price;
    (gross * (Decimal::ONE - discount / Decimal::ONE_HUNDRED)).round_dp(2)
}

/// True once strictly more than `window` has elapsed since `created_at`.
pub fn retention_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - created_at > window
}

/// Loads a quote and its items ordered by position.
pub(crate) async fn load_quote<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<(quote::Model, Vec<quote_item::Model>), ServiceError> {
    let quote = QuoteEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quote", id))?;
    let items = quote
        .find_related(QuoteItemEntity)
        .order_by_asc(quote_item::Column::Position)
        .all(conn)
        .await?;
    Ok((quote, items))
}

/// Service for quotes (cotizaciones)
#[derive(Clone)]
pub struct QuoteService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    retention: Duration,
}

impl QuoteService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            retention: Duration::days(15),
        }
    }

    /// Overrides the minimum age a quote must reach before deletion
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_quote(
        &self,
        request: CreateQuoteRequest,
        responsible: Option<Uuid>,
    ) -> Result<QuoteResponse, ServiceError> {
        request.check()?;
        let db = &*self.db_pool;

        let client = match (request.client_id, request.client.clone()) {
            (Some(client_id), _) => ClientService::get_in(db, client_id).await?.into(),
            (None, Some(snapshot)) => snapshot,
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "Either client_id or client is required".to_string(),
                ))
            }
        };

        let mut lines = Vec::with_capacity(request.items.len());
        for input in &request.items {
            let product = ProductService::get_in(db, input.product_id).await?;
            let (unit_price, unit_value) = match (input.unit_price, input.unit_value) {
                (None, None) => (Some(product.price), None),
                prices => prices,
            };
            let discount = input.discount.unwrap_or(Decimal::ZERO);
            let effective = unit_value.or(unit_price).unwrap_or(Decimal::ZERO);
            lines.push(QuoteLine {
                product_id: product.id,
                product_name: input.product_name.clone().unwrap_or(product.name),
                quantity: input.quantity,
                unit_price,
                unit_value,
                discount,
                subtotal: line_subtotal(input.quantity, effective, discount),
            });
        }

        for attempt in 1..=MAX_QUOTE_CODE_ATTEMPTS {
            let code = codes::generate_quote_code(&mut rand::thread_rng());
            let taken = QuoteEntity::find()
                .filter(quote::Column::Code.eq(code.as_str()))
                .one(db)
                .await?
                .is_some();
            if taken {
                warn!(%code, attempt, "quote code collision, regenerating");
                continue;
            }

            match self
                .insert_quote(code.clone(), &request, &client, &lines, responsible)
                .await
            {
                Ok(response) => {
                    info!(quote_id = %response.id, code = %response.code, "quote created");
                    events::publish(
                        self.event_sender.as_deref(),
                        vec![Event::QuoteCreated {
                            quote_id: response.id,
                            code: response.code.clone(),
                        }],
                    )
                    .await;
                    return Ok(response);
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(%code, attempt, "quote code taken concurrently, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::DuplicateCode(format!(
            "no free quote code after {} attempts",
            MAX_QUOTE_CODE_ATTEMPTS
        )))
    }

    async fn insert_quote(
        &self,
        code: String,
        request: &CreateQuoteRequest,
        client: &ClientSnapshot,
        lines: &[QuoteLine],
        responsible: Option<Uuid>,
    ) -> Result<QuoteResponse, ServiceError> {
        let quote_id = Uuid::new_v4();
        let now = Utc::now();
        let total: Decimal = lines.iter().map(|l| l.subtotal).sum();

        let txn = self.db_pool.begin().await?;

        let quote = quote::ActiveModel {
            id: Set(quote_id),
            code: Set(code),
            client_id: Set(request.client_id),
            client_name: Set(client.name.clone()),
            client_email: Set(client.email.clone()),
            client_phone: Set(client.phone.clone()),
            client_city: Set(client.city.clone()),
            client_address: Set(client.address.clone()),
            responsible_id: Set(responsible),
            status: Set(QuoteStatus::Activa),
            order_id: Set(None),
            total: Set(total),
            observations: Set(request.observations.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.iter().enumerate() {
            let item = quote_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                quote_id: Set(quote_id),
                position: Set(position as i32),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                unit_value: Set(line.unit_value),
                discount: Set(line.discount),
                subtotal: Set(line.subtotal),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        Ok(QuoteResponse::from_parts(quote, items))
    }

    #[instrument(skip(self), fields(quote_id = %id))]
    pub async fn get_quote(&self, id: Uuid) -> Result<QuoteResponse, ServiceError> {
        let (quote, items) = load_quote(&*self.db_pool, id).await?;
        Ok(QuoteResponse::from_parts(quote, items))
    }

    #[instrument(skip(self))]
    pub async fn list_quotes(&self, query: QuoteListQuery) -> Result<QuoteListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let mut select = QuoteEntity::find().order_by_desc(quote::Column::CreatedAt);
        if let Some(status) = query.status {
            select = select.filter(quote::Column::Status.eq(status));
        }

        let paginator = select.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let mut quotes = Vec::with_capacity(models.len());
        for quote in models {
            let items = quote
                .find_related(QuoteItemEntity)
                .order_by_asc(quote_item::Column::Position)
                .all(db)
                .await?;
            quotes.push(QuoteResponse::from_parts(quote, items));
        }

        Ok(QuoteListResponse {
            quotes,
            total,
            page,
            per_page,
        })
    }

    /// Manual status change. `remisionado` is reachable only through conversion.
    #[instrument(skip(self), fields(quote_id = %id, new_status = %status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: QuoteStatus,
    ) -> Result<QuoteResponse, ServiceError> {
        let db = &*self.db_pool;
        let (quote, items) = load_quote(db, id).await?;

        if !quote.status.can_transition_to(status) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "quote {} cannot move from {} to {}",
                quote.code, quote.status, status
            )));
        }

        let result = QuoteEntity::update_many()
            .col_expr(quote::Column::Status, Expr::val(status).into())
            .col_expr(quote::Column::UpdatedAt, Expr::val(Utc::now()).into())
            .filter(quote::Column::Id.eq(id))
            .filter(quote::Column::Status.eq(quote.status))
            .exec(db)
            .await?;
        if result.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "quote {} was modified concurrently",
                quote.code
            )));
        }

        let updated = QuoteEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Quote", id))?;

        info!(code = %updated.code, "quote status updated");
        Ok(QuoteResponse::from_parts(updated, items))
    }

    pub async fn delete_quote(&self, id: Uuid) -> Result<(), ServiceError> {
        self.delete_quote_as_of(id, Utc::now()).await
    }

    /// Deletes the quote when the retention window has elapsed at `now`.
    #[instrument(skip(self), fields(quote_id = %id))]
    pub async fn delete_quote_as_of(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        let quote = QuoteEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Quote", id))?;

        if !retention_expired(quote.created_at, now, self.retention) {
            let earliest = quote.created_at + self.retention;
            return Err(ServiceError::ValidationError(format!(
                "quote {} cannot be deleted before {}",
                quote.code,
                earliest.to_rfc3339()
            )));
        }

        QuoteItemEntity::delete_many()
            .filter(quote_item::Column::QuoteId.eq(id))
            .exec(&txn)
            .await?;
        let code = quote.code.clone();
        quote.delete(&txn).await?;
        txn.commit().await?;

        info!(%code, "quote deleted");
        Ok(())
    }
}

struct QuoteLine {
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Option<Decimal>,
    unit_value: Option<Decimal>,
    discount: Decimal,
    subtotal: Decimal,
}
