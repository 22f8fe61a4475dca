//! Credit account entity - a credit line at a bank, shared by one or more cards.
//!
//! Statement balances and payment inference are computed across every card of the account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent bank
    pub bank_id: i64,
    /// Day of month statements are issued (1-27)
    pub statement_issue_day: i32,
    /// Day of month statement payments are due (1-27)
    pub statement_due_day: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each credit account belongs to one bank
    #[sea_orm(
        belongs_to = "super::bank::Entity",
        from = "Column::BankId",
        to = "super::bank::Column::Id",
        on_delete = "Cascade"
    )]
    Bank,
    /// One account has many cards
    #[sea_orm(has_many = "super::credit_card::Entity")]
    Cards,
}

impl Related<super::bank::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bank.def()
    }
}

impl Related<super::credit_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
