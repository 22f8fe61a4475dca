//! Transaction tag entity - hierarchical spending categories owned by a user.
//!
//! Tags form a tree through `parent_id`. Deleting a tag removes its whole subtree and every
//! link to it. Names are unique per user ignoring case (enforced by a unique index created
//! alongside the tables).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction tag database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_tags")]
pub struct Model {
    /// Unique identifier for the tag
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Parent tag, `None` for a root category
    pub parent_id: Option<i64>,
    /// Display name (e.g., "Transportation", "Parking")
    pub tag_name: String,
}

/// Defines relationships between `TransactionTag` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each tag belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    /// Each tag may have a parent tag
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
    /// Links to bank subtransactions
    #[sea_orm(has_many = "super::bank_tag_link::Entity")]
    BankTagLinks,
    /// Links to credit subtransactions
    #[sea_orm(has_many = "super::credit_tag_link::Entity")]
    CreditTagLinks,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::bank_tag_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankTagLinks.def()
    }
}

impl Related<super::credit_tag_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditTagLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
