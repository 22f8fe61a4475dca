//! Shared test utilities for `pocketbook`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::{database::initialize, seed::SeedConfig},
    core::{
        bank::{create_bank, create_bank_account},
        credit::{add_credit_card, add_statement, create_credit_account},
        transaction::{
            BankTransactionInput, CreditTransactionInput, SubtransactionInput,
            add_bank_transaction, add_credit_transaction,
        },
        user::create_user,
    },
    entities::{self, BankAccountType, BankAccountTypeColumn, GLOBAL_USER_ID},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Creates an in-memory `SQLite` database with all tables initialized and the built-in
/// account types seeded.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    initialize(&db, &SeedConfig::builtin()).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness so it shows up for failing tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Shorthand for a calendar date.
///
/// # Panics
/// Panics on an impossible date.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Creates a test user without default tags.
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<entities::user::Model> {
    create_user(db, username, "test-hash", &[]).await
}

/// Creates a bank for a user.
pub async fn create_test_bank(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<entities::bank::Model> {
    create_bank(db, user_id, name).await
}

/// Returns the shared "Checking" account type.
pub async fn get_checking_type(
    db: &DatabaseConnection,
) -> Result<entities::bank_account_type::Model> {
    BankAccountType::find()
        .filter(BankAccountTypeColumn::UserId.eq(GLOBAL_USER_ID))
        .filter(BankAccountTypeColumn::TypeName.eq("Checking"))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "bank account type",
            id: GLOBAL_USER_ID,
        })
}

/// Creates an active checking account.
pub async fn create_test_account(
    db: &DatabaseConnection,
    bank_id: i64,
    last_four_digits: &str,
) -> Result<entities::bank_account::Model> {
    let checking = get_checking_type(db).await?;
    create_bank_account(db, bank_id, checking.id, last_four_digits, true).await
}

/// Creates a credit account and an active card on it.
///
/// # Defaults
/// * statement issue day: 10
/// * statement due day: 5
pub async fn create_test_credit_card(
    db: &DatabaseConnection,
    bank_id: i64,
    last_four_digits: &str,
) -> Result<entities::credit_card::Model> {
    let account = create_credit_account(db, bank_id, 10, 5).await?;
    add_credit_card(db, account.id, last_four_digits, true).await
}

/// Creates a statement with the due date derived from the account.
pub async fn create_test_statement(
    db: &DatabaseConnection,
    card_id: i64,
    issue_date: NaiveDate,
) -> Result<entities::credit_statement::Model> {
    add_statement(db, card_id, issue_date, None).await
}

/// Creates a bank transaction with one subtransaction.
///
/// # Defaults
/// * merchant: None
/// * note: `"Test subtransaction"`
pub async fn create_test_bank_transaction(
    db: &DatabaseConnection,
    account_id: i64,
    transaction_date: NaiveDate,
    subtotal: f64,
    tag_ids: &[i64],
) -> Result<(
    entities::bank_transaction::Model,
    Vec<entities::bank_subtransaction::Model>,
)> {
    add_bank_transaction(
        db,
        BankTransactionInput {
            account_id,
            transaction_date,
            merchant: None,
            internal_transaction_id: None,
            subtransactions: vec![
                SubtransactionInput::new(subtotal, "Test subtransaction")
                    .with_tags(tag_ids.to_vec()),
            ],
        },
    )
    .await
}

/// Creates a credit transaction with one subtransaction.
///
/// # Defaults
/// * merchant: `"Test Merchant"`
/// * note: `"Test subtransaction"`
pub async fn create_test_credit_transaction(
    db: &DatabaseConnection,
    statement_id: i64,
    transaction_date: NaiveDate,
    subtotal: f64,
) -> Result<(
    entities::credit_transaction::Model,
    Vec<entities::credit_subtransaction::Model>,
)> {
    add_credit_transaction(
        db,
        CreditTransactionInput {
            statement_id,
            transaction_date,
            merchant: "Test Merchant".to_string(),
            internal_transaction_id: None,
            subtransactions: vec![SubtransactionInput::new(subtotal, "Test subtransaction")],
        },
    )
    .await
}

/// Sets up a complete test environment with a checking account.
/// Returns (db, user, account) with bank "Jail Money" and account "1234".
pub async fn setup_with_bank_account() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::bank_account::Model,
)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, "test_user").await?;
    let bank = create_test_bank(&db, user.id, "Jail Money").await?;
    let account = create_test_account(&db, bank.id, "1234").await?;
    Ok((db, user, account))
}

/// Sets up a complete test environment with a credit card.
/// Returns (db, user, card) with bank "Jail Money" and card "1111".
pub async fn setup_with_credit_card() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::credit_card::Model,
)> {
    let db = setup_test_db().await?;
    let user = create_test_user(&db, "test_user").await?;
    let bank = create_test_bank(&db, user.id, "Jail Money").await?;
    let card = create_test_credit_card(&db, bank.id, "1111").await?;
    Ok((db, user, card))
}
