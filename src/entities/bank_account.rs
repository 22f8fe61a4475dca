//! Bank account entity.
//!
//! An account is identified within its bank by `(account_type_id, last_four_digits)`.
//! No balance is stored here; see `core::views::bank_accounts_view`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent bank
    pub bank_id: i64,
    /// Account type (user-owned or global)
    pub account_type_id: i64,
    /// Last four digits of the account number
    pub last_four_digits: String,
    /// Whether the account is still open
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each account belongs to one bank
    #[sea_orm(
        belongs_to = "super::bank::Entity",
        from = "Column::BankId",
        to = "super::bank::Column::Id",
        on_delete = "Cascade"
    )]
    Bank,
    /// Each account has one type
    #[sea_orm(
        belongs_to = "super::bank_account_type::Entity",
        from = "Column::AccountTypeId",
        to = "super::bank_account_type::Column::Id"
    )]
    AccountType,
    /// One account has many transactions
    #[sea_orm(has_many = "super::bank_transaction::Entity")]
    Transactions,
}

impl Related<super::bank::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bank.def()
    }
}

impl Related<super::bank_account_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountType.def()
    }
}

impl Related<super::bank_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
