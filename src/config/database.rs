//! Database configuration module for `pocketbook`.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the stored schema (columns, primary keys, cascading foreign keys) always matches the
//! Rust structs. Composite and case-insensitive uniqueness rules that a single column
//! attribute cannot express are added afterwards as unique indexes.

use crate::config::seed::SeedConfig;
use crate::core::bank::seed_global_account_types;
use crate::entities::{
    Bank, BankAccount, BankAccountType, BankSubtransaction, BankTagLink, BankTransaction,
    CreditAccount, CreditCard, CreditStatement, CreditSubtransaction, CreditTagLink,
    CreditTransaction, InternalTransaction, TransactionTag, User,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pocketbook.sqlite?mode=rwc";

const UNIQUE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_banks_user_name
        ON banks (user_id, bank_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_account_types_user_name
        ON bank_account_types (user_id, type_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_bank_accounts_identity
        ON bank_accounts (bank_id, account_type_id, last_four_digits)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_user_name
        ON transaction_tags (user_id, tag_name COLLATE NOCASE)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_statements_card_issue
        ON credit_statements (card_id, issue_date)",
];

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set. The `SQLx`
/// driver enables `PRAGMA foreign_keys` on every connection, which the cascading deletes
/// rely on.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Creates every table (parents before children) and the unique indexes.
///
/// Safe to call on an existing database; all statements are `IF NOT EXISTS`.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, InternalTransaction).await?;
    create_table(db, &schema, TransactionTag).await?;
    create_table(db, &schema, Bank).await?;
    create_table(db, &schema, BankAccountType).await?;
    create_table(db, &schema, BankAccount).await?;
    create_table(db, &schema, BankTransaction).await?;
    create_table(db, &schema, BankSubtransaction).await?;
    create_table(db, &schema, BankTagLink).await?;
    create_table(db, &schema, CreditAccount).await?;
    create_table(db, &schema, CreditCard).await?;
    create_table(db, &schema, CreditStatement).await?;
    create_table(db, &schema, CreditTransaction).await?;
    create_table(db, &schema, CreditSubtransaction).await?;
    create_table(db, &schema, CreditTagLink).await?;

    for index in UNIQUE_INDEXES {
        db.execute_unprepared(index).await?;
    }

    info!("Database tables and unique indexes ensured.");
    Ok(())
}

/// Creates the schema and seeds the shared account types.
///
/// Idempotent: existing tables and account types are left alone.
pub async fn initialize(db: &DatabaseConnection, seed: &SeedConfig) -> Result<()> {
    create_tables(db).await?;
    let inserted = seed_global_account_types(db, &seed.account_types).await?;
    debug!(inserted, "Seed applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{bank_account_type, transaction_tag, user};
    use crate::errors::Error;
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _ = User::find().limit(1).all(&db).await?;
        let _ = BankTransaction::find().limit(1).all(&db).await?;
        let _ = CreditStatement::find().limit(1).all(&db).await?;
        let _ = CreditTagLink::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_seeds_account_types_once() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        let seed = SeedConfig::builtin();
        initialize(&db, &seed).await?;
        initialize(&db, &seed).await?;

        let types = BankAccountType::find().all(&db).await?;
        assert_eq!(types.len(), seed.account_types.len());
        assert!(types.iter().all(bank_account_type::Model::is_global));
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_names_unique_ignoring_case() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let owner = user::ActiveModel {
            username: Set("casey".to_string()),
            password: Set("hash".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        transaction_tag::ActiveModel {
            user_id: Set(owner.id),
            parent_id: Set(None),
            tag_name: Set("Groceries".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let duplicate = transaction_tag::ActiveModel {
            user_id: Set(owner.id),
            parent_id: Set(None),
            tag_name: Set("GROCERIES".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .map_err(Error::from_write);

        assert!(matches!(duplicate, Err(Error::ConstraintViolation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_global_account_types_need_no_user_row() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let global = bank_account_type::ActiveModel {
            user_id: Set(crate::entities::GLOBAL_USER_ID),
            type_name: Set("Checking".to_string()),
            type_abbreviation: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        assert!(global.is_global());
        Ok(())
    }
}
