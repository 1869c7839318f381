use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which cart scalar a template's rules are matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TemplateType {
    /// Σ(weight × quantity)
    #[sea_orm(string_value = "weight")]
    Weight,
    /// Σ(quantity)
    #[sea_orm(string_value = "quantity")]
    Quantity,
    /// Σ(volume × quantity)
    #[sea_orm(string_value = "volume")]
    Volume,
    /// discounted subtotal
    #[sea_orm(string_value = "amount")]
    Amount,
    /// number of cart lines
    #[sea_orm(string_value = "items")]
    Items,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub template_type: TemplateType,
    pub base_fee: Decimal,
    pub free_threshold: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipping_rule::Entity")]
    Rules,
}

impl Related<super::shipping_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
