use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub quote_id: Uuid,
    pub position: i32,
    pub product_id: Uuid,
    /// Product name as it read when the quote was written
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub unit_value: Option<Decimal>,
    /// Percentage, 0-100
    pub discount: Decimal,
    pub subtotal: Decimal,
}

impl Model {
    /// Price used for conversion: `unit_value` when present, else `unit_price`.
    pub fn effective_unit_price(&self) -> Decimal {
        self.unit_value.or(self.unit_price).unwrap_or(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id",
        on_delete = "Cascade"
    )]
    Quote,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
