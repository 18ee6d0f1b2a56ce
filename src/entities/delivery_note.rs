use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

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
pub enum DeliveryNoteStatus {
    #[sea_orm(string_value = "activa")]
    Activa,
    #[sea_orm(string_value = "cerrada")]
    Cerrada,
    #[sea_orm(string_value = "cancelada")]
    Cancelada,
}

impl DeliveryNoteStatus {
    pub fn can_transition_to(self, next: DeliveryNoteStatus) -> bool {
        use DeliveryNoteStatus::*;
        matches!(
            (self, next),
            (Activa, Cerrada) | (Activa, Cancelada) | (Cerrada, Cancelada)
        )
    }

    /// Only cancelled notes may be removed.
    pub fn is_deletable(self) -> bool {
        self == DeliveryNoteStatus::Cancelada
    }
}

/// Proof-of-delivery document. Client and line data are snapshots taken at
/// creation and never re-resolved.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub number: String,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub order_code: String,
    pub quote_id: Option<Uuid>,
    pub quote_code: Option<String>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_city: Option<String>,
    pub client_address: Option<String>,
    pub responsible_id: Option<Uuid>,
    pub status: DeliveryNoteStatus,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub item_count: i32,
    pub total_quantity: i32,
    pub issued_at: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_note_item::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::delivery_note_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
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

#[cfg(test)]
mod tests {
    use super::DeliveryNoteStatus::{self, *};
    use rstest::rstest;

    #[rstest]
    #[case(Activa, Cerrada, true)]
    #[case(Activa, Cancelada, true)]
    #[case(Cerrada, Cancelada, true)]
    #[case(Cerrada, Activa, false)]
    #[case(Cancelada, Activa, false)]
    #[case(Activa, Activa, false)]
    fn transition_graph(
        #[case] from: DeliveryNoteStatus,
        #[case] to: DeliveryNoteStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn only_cancelled_notes_are_deletable() {
        assert!(!Activa.is_deletable());
        assert!(!Cerrada.is_deletable());
        assert!(Cancelada.is_deletable());
    }
}
