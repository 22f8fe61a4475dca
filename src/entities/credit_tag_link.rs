//! Credit tag link entity - junction between credit subtransactions and tags.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit tag link database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_tag_links")]
pub struct Model {
    /// Tagged subtransaction
    #[sea_orm(primary_key, auto_increment = false)]
    pub subtransaction_id: i64,
    /// Applied tag
    #[sea_orm(primary_key, auto_increment = false)]
    pub tag_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::credit_subtransaction::Entity",
        from = "Column::SubtransactionId",
        to = "super::credit_subtransaction::Column::Id",
        on_delete = "Cascade"
    )]
    Subtransaction,
    #[sea_orm(
        belongs_to = "super::transaction_tag::Entity",
        from = "Column::TagId",
        to = "super::transaction_tag::Column::Id",
        on_delete = "Cascade"
    )]
    Tag,
}

impl Related<super::credit_subtransaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subtransaction.def()
    }
}

impl Related<super::transaction_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
