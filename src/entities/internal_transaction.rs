//! Internal transaction entity - a bare link id shared by the two sides of a transfer.
//!
//! A bank withdrawal and the credit payment it funds (or two bank transactions moving money
//! between accounts) carry the same `internal_transaction_id`. Nothing enforces that exactly
//! two rows share an id; a single-sided link is treated as an ordinary transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Internal transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "internal_transactions")]
pub struct Model {
    /// Link identifier
    #[sea_orm(primary_key)]
    pub id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Bank transactions carrying this link
    #[sea_orm(has_many = "super::bank_transaction::Entity")]
    BankTransactions,
    /// Credit transactions carrying this link
    #[sea_orm(has_many = "super::credit_transaction::Entity")]
    CreditTransactions,
}

impl Related<super::bank_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankTransactions.def()
    }
}

impl Related<super::credit_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
