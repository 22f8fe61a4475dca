//! Credit statement entity - one billing cycle of a card.
//!
//! The stored row carries only its dates; balance and payment date are derived
//! by `core::views::credit_statements_view`.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit statement database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_statements")]
pub struct Model {
    /// Unique identifier for the statement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Card the statement was issued for
    pub card_id: i64,
    /// Date the statement closes
    pub issue_date: NaiveDate,
    /// Date payment is due
    pub due_date: NaiveDate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each statement belongs to one card
    #[sea_orm(
        belongs_to = "super::credit_card::Entity",
        from = "Column::CardId",
        to = "super::credit_card::Column::Id",
        on_delete = "Cascade"
    )]
    Card,
    /// One statement has many transactions
    #[sea_orm(has_many = "super::credit_transaction::Entity")]
    Transactions,
}

impl Related<super::credit_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Card.def()
    }
}

impl Related<super::credit_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
