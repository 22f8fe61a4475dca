//! Credit transaction entity - a charge or payment posted to a statement.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shared link id when this is one side of a transfer (e.g., a card payment)
    pub internal_transaction_id: Option<i64>,
    /// Statement the transaction is billed on
    pub statement_id: i64,
    pub transaction_date: NaiveDate,
    /// Counterparty; required for credit transactions
    pub merchant: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::credit_statement::Entity",
        from = "Column::StatementId",
        to = "super::credit_statement::Column::Id",
        on_delete = "Cascade"
    )]
    Statement,
    #[sea_orm(
        belongs_to = "super::internal_transaction::Entity",
        from = "Column::InternalTransactionId",
        to = "super::internal_transaction::Column::Id",
        on_delete = "SetNull"
    )]
    InternalTransaction,
    #[sea_orm(has_many = "super::credit_subtransaction::Entity")]
    Subtransactions,
}

impl Related<super::credit_statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statement.def()
    }
}

impl Related<super::internal_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InternalTransaction.def()
    }
}

impl Related<super::credit_subtransaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subtransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
