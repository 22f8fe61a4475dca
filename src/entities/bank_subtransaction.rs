//! Bank subtransaction entity - one signed line item of a bank transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank subtransaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_subtransactions")]
pub struct Model {
    /// Unique identifier for the subtransaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent transaction
    pub transaction_id: i64,
    /// Signed amount in dollars (deposits positive, withdrawals negative)
    pub subtotal: f64,
    /// Free-form description of the line item
    pub note: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subtransaction belongs to one transaction
    #[sea_orm(
        belongs_to = "super::bank_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::bank_transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
    /// Tag links for this subtransaction
    #[sea_orm(has_many = "super::bank_tag_link::Entity")]
    TagLinks,
}

impl Related<super::bank_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::bank_tag_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TagLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
