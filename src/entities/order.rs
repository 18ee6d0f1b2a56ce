use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order states.
///
/// Allowed moves: `agendado -> despachado | entregado | cancelado`,
/// `despachado -> entregado | cancelado`, `entregado -> completado`.
/// `completado` and `cancelado` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "agendado")]
    Agendado,
    #[sea_orm(string_value = "despachado")]
    Despachado,
    #[sea_orm(string_value = "entregado")]
    Entregado,
    #[sea_orm(string_value = "completado")]
    Completado,
    #[sea_orm(string_value = "cancelado")]
    Cancelado,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Agendado, Despachado)
                | (Agendado, Entregado)
                | (Agendado, Cancelado)
                | (Despachado, Entregado)
                | (Despachado, Cancelado)
                | (Entregado, Completado)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completado | OrderStatus::Cancelado)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 32))]
    pub order_number: String,

    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client_id: Option<Uuid>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observation: Option<String>,
    pub status: OrderStatus,
    pub responsible_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_one = "super::delivery_note::Entity")]
    DeliveryNote,
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::delivery_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryNote.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        active_model.updated_at = Set(Utc::now());
        Ok(active_model)
    }
}
