use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single `[min_value, max_value] → fee` bracket of a shipping template.
/// Ranges may overlap; selection scans rules by ascending `position` and the
/// first containing range wins, so admins order rules by priority.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub template_id: i32,
    pub position: i32,
    pub min_value: Decimal,
    pub max_value: Decimal,
    pub fee: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipping_template::Entity",
        from = "Column::TemplateId",
        to = "super::shipping_template::Column::Id"
    )]
    Template,
}

impl Related<super::shipping_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
