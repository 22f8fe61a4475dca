//! Credit subtransaction entity - one line item of a credit transaction.
//!
//! Charges are positive, payments and refunds negative.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credit subtransaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_subtransactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_id: i64,
    /// Signed amount in dollars
    pub subtotal: f64,
    pub note: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::credit_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::credit_transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
    #[sea_orm(has_many = "super::credit_tag_link::Entity")]
    TagLinks,
}

impl Related<super::credit_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::credit_tag_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TagLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
