//! Bank account type entity - "Checking", "Savings", and user-defined kinds.
//!
//! Rows owned by [`GLOBAL_USER_ID`] are shared by every user and are merged into each
//! user's lookups at query time. `user_id` is therefore not a foreign key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sentinel owner for account types visible to all users
pub const GLOBAL_USER_ID: i64 = 0;

/// Bank account type database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_account_types")]
pub struct Model {
    /// Unique identifier for the account type
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, or [`GLOBAL_USER_ID`] for shared types
    pub user_id: i64,
    /// Full name (e.g., "Certificate of Deposit")
    pub type_name: String,
    /// Optional short form preferred for display (e.g., "CD")
    pub type_abbreviation: Option<String>,
}

impl Model {
    /// Abbreviation when present, otherwise the full name.
    #[must_use]
    pub fn common_name(&self) -> &str {
        self.type_abbreviation
            .as_deref()
            .filter(|abbreviation| !abbreviation.is_empty())
            .unwrap_or(&self.type_name)
    }

    /// Whether this type is shared by all users.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.user_id == GLOBAL_USER_ID
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One type is used by many bank accounts
    #[sea_orm(has_many = "super::bank_account::Entity")]
    BankAccounts,
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
