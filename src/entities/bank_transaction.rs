//! Bank transaction entity - a dated event on a bank account made of one or more
//! subtransactions.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shared link id when this is one side of a transfer
    pub internal_transaction_id: Option<i64>,
    /// Account the transaction was recorded on
    pub account_id: i64,
    /// Date the transaction took effect
    pub transaction_date: NaiveDate,
    /// Counterparty, if any
    pub merchant: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one bank account
    #[sea_orm(
        belongs_to = "super::bank_account::Entity",
        from = "Column::AccountId",
        to = "super::bank_account::Column::Id",
        on_delete = "Cascade"
    )]
    Account,
    /// Optional transfer link
    #[sea_orm(
        belongs_to = "super::internal_transaction::Entity",
        from = "Column::InternalTransactionId",
        to = "super::internal_transaction::Column::Id",
        on_delete = "SetNull"
    )]
    InternalTransaction,
    /// One transaction has many subtransactions
    #[sea_orm(has_many = "super::bank_subtransaction::Entity")]
    Subtransactions,
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::internal_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InternalTransaction.def()
    }
}

impl Related<super::bank_subtransaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subtransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
