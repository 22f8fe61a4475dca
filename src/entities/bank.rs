//! Bank entity - a financial institution registered by a user.
//!
//! Banks own both bank accounts and credit accounts; deleting a bank removes everything
//! beneath it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "banks")]
pub struct Model {
    /// Unique identifier for the bank
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Bank name, unique per user
    pub bank_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each bank belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    /// One bank has many bank accounts
    #[sea_orm(has_many = "super::bank_account::Entity")]
    BankAccounts,
    /// One bank has many credit accounts
    #[sea_orm(has_many = "super::credit_account::Entity")]
    CreditAccounts,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccounts.def()
    }
}

impl Related<super::credit_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
