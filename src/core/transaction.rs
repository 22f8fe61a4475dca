//! Transaction business logic - bank and credit transactions with their subtransactions.
//!
//! A transaction is a dated header (account or statement, merchant) plus one or more signed
//! subtransactions. Each subtransaction can be tagged; tags are stored together with all of
//! their ancestors. Writing a transaction, its subtransactions and their tag links happens
//! in one database transaction.
//!
//! Two transactions can be marked as the two sides of one real-world event (a transfer
//! between accounts, a card payment) by sharing an internal transaction id.

use crate::{
    core::{
        bank::get_account_bank,
        credit::get_statement_bank,
        money::is_valid_amount,
        tags::{TagTree, insert_tag_links, load_tag_tree},
    },
    entities::{
        BankSubtransaction, BankSubtransactionColumn, BankTransaction, BankTransactionColumn,
        CreditSubtransaction, CreditSubtransactionColumn, CreditTransaction,
        CreditTransactionColumn, bank_subtransaction, bank_transaction, credit_subtransaction,
        credit_transaction, internal_transaction,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Which ledger a transaction lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionKind {
    Bank,
    Credit,
}

/// One line item to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtransactionInput {
    /// Signed amount
    pub subtotal: f64,
    pub note: String,
    /// Tags to apply; ancestors are added automatically
    pub tag_ids: Vec<i64>,
}

impl SubtransactionInput {
    /// An untagged line item.
    #[must_use]
    pub fn new(subtotal: f64, note: impl Into<String>) -> Self {
        Self {
            subtotal,
            note: note.into(),
            tag_ids: Vec::new(),
        }
    }

    /// Adds tags to the line item.
    #[must_use]
    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }
}

/// A bank transaction to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct BankTransactionInput {
    pub account_id: i64,
    pub transaction_date: NaiveDate,
    pub merchant: Option<String>,
    pub internal_transaction_id: Option<i64>,
    pub subtransactions: Vec<SubtransactionInput>,
}

/// A credit transaction to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransactionInput {
    pub statement_id: i64,
    pub transaction_date: NaiveDate,
    pub merchant: String,
    pub internal_transaction_id: Option<i64>,
    pub subtransactions: Vec<SubtransactionInput>,
}

/// New header values for a bank transaction.
///
/// `subtransactions: None` keeps the current line items; `Some` replaces all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct BankTransactionUpdate {
    pub transaction_date: NaiveDate,
    pub merchant: Option<String>,
    pub subtransactions: Option<Vec<SubtransactionInput>>,
}

/// New header values for a credit transaction.
///
/// `subtransactions: None` keeps the current line items; `Some` replaces all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransactionUpdate {
    pub statement_id: i64,
    pub transaction_date: NaiveDate,
    pub merchant: String,
    pub subtransactions: Option<Vec<SubtransactionInput>>,
}

fn validate_subtransactions(subtransactions: &[SubtransactionInput]) -> Result<()> {
    if subtransactions.is_empty() {
        return Err(Error::EmptyTransaction);
    }
    if let Some(invalid) = subtransactions
        .iter()
        .find(|sub| !is_valid_amount(sub.subtotal))
    {
        return Err(Error::InvalidAmount {
            amount: invalid.subtotal,
        });
    }
    Ok(())
}

fn validate_merchant(merchant: &str) -> Result<String> {
    let merchant = merchant.trim();
    if merchant.is_empty() {
        return Err(Error::InvalidName {
            message: "A credit transaction requires a merchant".to_string(),
        });
    }
    Ok(merchant.to_string())
}

fn normalize_merchant(merchant: Option<&str>) -> Option<String> {
    merchant
        .map(str::trim)
        .filter(|merchant| !merchant.is_empty())
        .map(str::to_string)
}

async fn insert_bank_subtransactions<C>(
    db: &C,
    tree: &TagTree,
    transaction_id: i64,
    subtransactions: &[SubtransactionInput],
) -> Result<Vec<bank_subtransaction::Model>>
where
    C: ConnectionTrait,
{
    let mut saved = Vec::with_capacity(subtransactions.len());
    for input in subtransactions {
        let tag_ids = tree.expand_with_ancestors(&input.tag_ids)?;
        let subtransaction = bank_subtransaction::ActiveModel {
            transaction_id: Set(transaction_id),
            subtotal: Set(input.subtotal),
            note: Set(input.note.trim().to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Error::from_write)?;
        insert_tag_links(db, TransactionKind::Bank, subtransaction.id, &tag_ids).await?;
        saved.push(subtransaction);
    }
    Ok(saved)
}

async fn insert_credit_subtransactions<C>(
    db: &C,
    tree: &TagTree,
    transaction_id: i64,
    subtransactions: &[SubtransactionInput],
) -> Result<Vec<credit_subtransaction::Model>>
where
    C: ConnectionTrait,
{
    let mut saved = Vec::with_capacity(subtransactions.len());
    for input in subtransactions {
        let tag_ids = tree.expand_with_ancestors(&input.tag_ids)?;
        let subtransaction = credit_subtransaction::ActiveModel {
            transaction_id: Set(transaction_id),
            subtotal: Set(input.subtotal),
            note: Set(input.note.trim().to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Error::from_write)?;
        insert_tag_links(db, TransactionKind::Credit, subtransaction.id, &tag_ids).await?;
        saved.push(subtransaction);
    }
    Ok(saved)
}

/// Writes a bank transaction on an existing connection or database transaction.
pub(crate) async fn insert_bank_transaction<C>(
    db: &C,
    input: &BankTransactionInput,
) -> Result<(bank_transaction::Model, Vec<bank_subtransaction::Model>)>
where
    C: ConnectionTrait,
{
    validate_subtransactions(&input.subtransactions)?;
    let bank = get_account_bank(db, input.account_id).await?;
    let tree = load_tag_tree(db, bank.user_id).await?;

    let transaction = bank_transaction::ActiveModel {
        internal_transaction_id: Set(input.internal_transaction_id),
        account_id: Set(input.account_id),
        transaction_date: Set(input.transaction_date),
        merchant: Set(normalize_merchant(input.merchant.as_deref())),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)?;

    let subtransactions =
        insert_bank_subtransactions(db, &tree, transaction.id, &input.subtransactions).await?;
    debug!(
        transaction_id = transaction.id,
        subtransactions = subtransactions.len(),
        "Added bank transaction"
    );
    Ok((transaction, subtransactions))
}

/// Writes a credit transaction on an existing connection or database transaction.
pub(crate) async fn insert_credit_transaction<C>(
    db: &C,
    input: &CreditTransactionInput,
) -> Result<(credit_transaction::Model, Vec<credit_subtransaction::Model>)>
where
    C: ConnectionTrait,
{
    validate_subtransactions(&input.subtransactions)?;
    let merchant = validate_merchant(&input.merchant)?;
    let bank = get_statement_bank(db, input.statement_id).await?;
    let tree = load_tag_tree(db, bank.user_id).await?;

    let transaction = credit_transaction::ActiveModel {
        internal_transaction_id: Set(input.internal_transaction_id),
        statement_id: Set(input.statement_id),
        transaction_date: Set(input.transaction_date),
        merchant: Set(merchant),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)?;

    let subtransactions =
        insert_credit_subtransactions(db, &tree, transaction.id, &input.subtransactions).await?;
    debug!(
        transaction_id = transaction.id,
        subtransactions = subtransactions.len(),
        "Added credit transaction"
    );
    Ok((transaction, subtransactions))
}

/// Adds a bank transaction with its subtransactions and tag links.
///
/// Every subtransaction is tagged with the given tags and all of their ancestors. The
/// header, line items and links are written in one database transaction; an unknown tag or
/// an invalid amount rolls the whole write back.
///
/// # Arguments
/// * `input.account_id` - The account the transaction is recorded on
/// * `input.transaction_date` - Date the transaction took effect; decides its place in the
///   running balance
/// * `input.merchant` - Optional counterparty, trimmed and dropped when blank
/// * `input.subtransactions` - At least one line item, deposits positive
///
/// # Returns
/// The saved transaction with its subtransactions in input order.
#[instrument(skip(db, input), fields(account_id = input.account_id))]
pub async fn add_bank_transaction(
    db: &DatabaseConnection,
    input: BankTransactionInput,
) -> Result<(bank_transaction::Model, Vec<bank_subtransaction::Model>)> {
    let txn = db.begin().await?;
    let saved = insert_bank_transaction(&txn, &input).await?;
    txn.commit().await?;
    Ok(saved)
}

/// Adds a credit transaction with its subtransactions and tag links.
///
/// Same write rules as [`add_bank_transaction`], except that a merchant is required.
///
/// # Arguments
/// * `input.statement_id` - The statement the transaction is billed on
/// * `input.transaction_date` - Date of the charge or payment
/// * `input.merchant` - Counterparty; must not be blank
/// * `input.subtransactions` - At least one line item, charges positive and payments
///   negative
#[instrument(skip(db, input), fields(statement_id = input.statement_id))]
pub async fn add_credit_transaction(
    db: &DatabaseConnection,
    input: CreditTransactionInput,
) -> Result<(credit_transaction::Model, Vec<credit_subtransaction::Model>)> {
    let txn = db.begin().await?;
    let saved = insert_credit_transaction(&txn, &input).await?;
    txn.commit().await?;
    Ok(saved)
}

/// Looks up a bank transaction.
pub async fn get_bank_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<bank_transaction::Model>> {
    BankTransaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks up a credit transaction.
pub async fn get_credit_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<credit_transaction::Model>> {
    CreditTransaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Subtransactions of a bank transaction, in insertion order.
pub async fn get_bank_subtransactions(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Vec<bank_subtransaction::Model>> {
    BankSubtransaction::find()
        .filter(BankSubtransactionColumn::TransactionId.eq(transaction_id))
        .order_by_asc(BankSubtransactionColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Subtransactions of a credit transaction, in insertion order.
pub async fn get_credit_subtransactions(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Vec<credit_subtransaction::Model>> {
    CreditSubtransaction::find()
        .filter(CreditSubtransactionColumn::TransactionId.eq(transaction_id))
        .order_by_asc(CreditSubtransactionColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a bank transaction's header and optionally replaces its subtransactions.
#[instrument(skip(db, update))]
pub async fn update_bank_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    update: BankTransactionUpdate,
) -> Result<bank_transaction::Model> {
    if let Some(subtransactions) = &update.subtransactions {
        validate_subtransactions(subtransactions)?;
    }

    let txn = db.begin().await?;
    let existing = BankTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "bank transaction",
            id: transaction_id,
        })?;
    let account_id = existing.account_id;

    let mut transaction: bank_transaction::ActiveModel = existing.into();
    transaction.transaction_date = Set(update.transaction_date);
    transaction.merchant = Set(normalize_merchant(update.merchant.as_deref()));
    let transaction = transaction.update(&txn).await?;

    if let Some(subtransactions) = &update.subtransactions {
        let bank = get_account_bank(&txn, account_id).await?;
        let tree = load_tag_tree(&txn, bank.user_id).await?;
        BankSubtransaction::delete_many()
            .filter(BankSubtransactionColumn::TransactionId.eq(transaction_id))
            .exec(&txn)
            .await?;
        insert_bank_subtransactions(&txn, &tree, transaction_id, subtransactions).await?;
    }

    txn.commit().await?;
    Ok(transaction)
}

/// Updates a credit transaction's header and optionally replaces its subtransactions.
#[instrument(skip(db, update))]
pub async fn update_credit_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    update: CreditTransactionUpdate,
) -> Result<credit_transaction::Model> {
    if let Some(subtransactions) = &update.subtransactions {
        validate_subtransactions(subtransactions)?;
    }
    let merchant = validate_merchant(&update.merchant)?;

    let txn = db.begin().await?;
    let existing = CreditTransaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit transaction",
            id: transaction_id,
        })?;
    let bank = get_statement_bank(&txn, update.statement_id).await?;

    let mut transaction: credit_transaction::ActiveModel = existing.into();
    transaction.statement_id = Set(update.statement_id);
    transaction.transaction_date = Set(update.transaction_date);
    transaction.merchant = Set(merchant);
    let transaction = transaction.update(&txn).await.map_err(Error::from_write)?;

    if let Some(subtransactions) = &update.subtransactions {
        let tree = load_tag_tree(&txn, bank.user_id).await?;
        CreditSubtransaction::delete_many()
            .filter(CreditSubtransactionColumn::TransactionId.eq(transaction_id))
            .exec(&txn)
            .await?;
        insert_credit_subtransactions(&txn, &tree, transaction_id, subtransactions).await?;
    }

    txn.commit().await?;
    Ok(transaction)
}

fn not_found(entity: &'static str, id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound { entity, id });
    }
    Ok(())
}

/// Deletes a bank transaction with its subtransactions and tag links.
pub async fn delete_bank_transaction(db: &DatabaseConnection, transaction_id: i64) -> Result<()> {
    let result = BankTransaction::delete_by_id(transaction_id).exec(db).await?;
    not_found("bank transaction", transaction_id, result.rows_affected)
}

/// Deletes a credit transaction with its subtransactions and tag links.
pub async fn delete_credit_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<()> {
    let result = CreditTransaction::delete_by_id(transaction_id).exec(db).await?;
    not_found("credit transaction", transaction_id, result.rows_affected)
}

/// Deletes one bank subtransaction. The parent transaction stays, possibly empty.
pub async fn delete_bank_subtransaction(
    db: &DatabaseConnection,
    subtransaction_id: i64,
) -> Result<()> {
    let result = BankSubtransaction::delete_by_id(subtransaction_id).exec(db).await?;
    not_found("bank subtransaction", subtransaction_id, result.rows_affected)
}

/// Deletes one credit subtransaction. The parent transaction stays, possibly empty.
pub async fn delete_credit_subtransaction(
    db: &DatabaseConnection,
    subtransaction_id: i64,
) -> Result<()> {
    let result = CreditSubtransaction::delete_by_id(subtransaction_id)
        .exec(db)
        .await?;
    not_found("credit subtransaction", subtransaction_id, result.rows_affected)
}

/// Creates a fresh internal transaction id.
pub async fn add_internal_transaction<C>(db: &C) -> Result<i64>
where
    C: ConnectionTrait,
{
    let link = <internal_transaction::ActiveModel as sea_orm::ActiveModelTrait>::default()
        .insert(db)
        .await
        .map_err(Error::from_write)?;
    Ok(link.id)
}

/// Records a transfer between two bank accounts as two linked transactions.
///
/// Any `internal_transaction_id` on the inputs is replaced by the new shared link. Both
/// sides are written in one database transaction, so a failure on either leaves nothing
/// behind.
///
/// # Arguments
/// * `withdrawal` - The outgoing side, usually with negative subtotals
/// * `deposit` - The incoming side; its account must belong to the same user
///
/// # Errors
/// `NotFound` for the deposit account when the two accounts belong to different users.
#[instrument(skip(db, withdrawal, deposit))]
pub async fn record_transfer(
    db: &DatabaseConnection,
    withdrawal: BankTransactionInput,
    deposit: BankTransactionInput,
) -> Result<(bank_transaction::Model, bank_transaction::Model)> {
    let txn = db.begin().await?;
    let from = get_account_bank(&txn, withdrawal.account_id).await?;
    let to = get_account_bank(&txn, deposit.account_id).await?;
    if from.user_id != to.user_id {
        return Err(Error::NotFound {
            entity: "bank account",
            id: deposit.account_id,
        });
    }
    let link = add_internal_transaction(&txn).await?;

    let (withdrawal, _) = insert_bank_transaction(
        &txn,
        &BankTransactionInput {
            internal_transaction_id: Some(link),
            ..withdrawal
        },
    )
    .await?;
    let (deposit, _) = insert_bank_transaction(
        &txn,
        &BankTransactionInput {
            internal_transaction_id: Some(link),
            ..deposit
        },
    )
    .await?;

    txn.commit().await?;
    debug!(internal_transaction_id = link, "Recorded transfer");
    Ok((withdrawal, deposit))
}

/// The other side of a linked transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LinkedTransaction {
    Bank(bank_transaction::Model),
    Credit(credit_transaction::Model),
}

/// Returns the other side of a transfer or payment.
///
/// Bank transactions are searched first, then credit transactions. A transaction without a
/// link, or whose link no other row shares, has no linked transaction.
pub async fn get_linked_transaction(
    db: &DatabaseConnection,
    kind: TransactionKind,
    transaction_id: i64,
) -> Result<Option<LinkedTransaction>> {
    let link = match kind {
        TransactionKind::Bank => BankTransaction::find_by_id(transaction_id)
            .one(db)
            .await?
            .map(|transaction| transaction.internal_transaction_id),
        TransactionKind::Credit => CreditTransaction::find_by_id(transaction_id)
            .one(db)
            .await?
            .map(|transaction| transaction.internal_transaction_id),
    };
    let Some(link) = link.ok_or(Error::NotFound {
        entity: "transaction",
        id: transaction_id,
    })?
    else {
        return Ok(None);
    };

    let mut bank_query =
        BankTransaction::find().filter(BankTransactionColumn::InternalTransactionId.eq(link));
    if kind == TransactionKind::Bank {
        bank_query = bank_query.filter(BankTransactionColumn::Id.ne(transaction_id));
    }
    if let Some(other) = bank_query.one(db).await? {
        return Ok(Some(LinkedTransaction::Bank(other)));
    }

    let mut credit_query =
        CreditTransaction::find().filter(CreditTransactionColumn::InternalTransactionId.eq(link));
    if kind == TransactionKind::Credit {
        credit_query = credit_query.filter(CreditTransactionColumn::Id.ne(transaction_id));
    }
    if let Some(other) = credit_query.one(db).await? {
        return Ok(Some(LinkedTransaction::Credit(other)));
    }

    warn!(
        ?kind,
        transaction_id,
        internal_transaction_id = link,
        "Linked transaction has no other side"
    );
    Ok(None)
}
