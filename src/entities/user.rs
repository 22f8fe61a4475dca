//! User entity - the owner of banks, account types and tags.
//!
//! Only a password hash is stored; hashing and session handling live outside this crate.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name, unique across all users
    #[sea_orm(unique)]
    pub username: String,
    /// Password hash produced by the authentication layer
    pub password: String,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many banks
    #[sea_orm(has_many = "super::bank::Entity")]
    Banks,
    /// One user owns many transaction tags
    #[sea_orm(has_many = "super::transaction_tag::Entity")]
    TransactionTags,
}

impl Related<super::bank::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Banks.def()
    }
}

impl Related<super::transaction_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
