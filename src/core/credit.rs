//! Credit business logic - credit accounts, cards, statements and payments.
//!
//! A credit account belongs to a bank and carries the day of month statements are issued
//! and the day they are due. Cards hang off the account and statements off the cards.
//! Transactions are billed to a statement, which is found (or created) from the card and the
//! transaction date by [`infer_statement`].

use crate::{
    config::seed::CREDIT_PAYMENT_TAG,
    core::{
        bank::{get_account_bank, validate_last_four_digits},
        money::is_valid_amount,
        tags::find_tag,
        transaction::{
            BankTransactionInput, CreditTransactionInput, SubtransactionInput,
            add_internal_transaction, insert_bank_transaction, insert_credit_transaction,
        },
        views::credit_statements_view,
    },
    entities::{
        Bank, BankColumn, CreditAccount, CreditAccountColumn, CreditCard, CreditCardColumn,
        CreditStatement, CreditStatementColumn, bank, bank_transaction, credit_account,
        credit_card, credit_statement, credit_transaction,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Latest day of month a statement may be issued or due on, so that every month has it.
pub const MAX_STATEMENT_DAY: i32 = 27;

fn validate_statement_day(field: &'static str, day: i32) -> Result<u32> {
    match u32::try_from(day) {
        Ok(valid) if (1..=MAX_STATEMENT_DAY).contains(&day) => Ok(valid),
        _ => Err(Error::InvalidStatementDay { field, day }),
    }
}

const fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn date_in_month(field: &'static str, year: i32, month: u32, day: i32) -> Result<NaiveDate> {
    let valid_day = validate_statement_day(field, day)?;
    NaiveDate::from_ymd_opt(year, month, valid_day).ok_or(Error::InvalidStatementDay { field, day })
}

/// Issue date of the statement a transaction on `transaction_date` is billed to.
///
/// A transaction before the issue day lands on this month's statement, one on or after it
/// on next month's.
pub fn statement_issue_date(issue_day: i32, transaction_date: NaiveDate) -> Result<NaiveDate> {
    let (year, month) = (transaction_date.year(), transaction_date.month());
    let before_issue = i64::from(transaction_date.day()) < i64::from(issue_day);
    let (year, month) = if before_issue {
        (year, month)
    } else {
        next_month(year, month)
    };
    date_in_month("statement issue day", year, month, issue_day)
}

/// First date strictly after `issue_date` whose day of month is `due_day`.
pub fn statement_due_date(issue_date: NaiveDate, due_day: i32) -> Result<NaiveDate> {
    let (year, month) = (issue_date.year(), issue_date.month());
    let due_this_month = i64::from(due_day) > i64::from(issue_date.day());
    let (year, month) = if due_this_month {
        (year, month)
    } else {
        next_month(year, month)
    };
    date_in_month("statement due day", year, month, due_day)
}

/// Creates a credit account at a bank.
#[instrument(skip(db))]
pub async fn create_credit_account(
    db: &DatabaseConnection,
    bank_id: i64,
    statement_issue_day: i32,
    statement_due_day: i32,
) -> Result<credit_account::Model> {
    validate_statement_day("statement issue day", statement_issue_day)?;
    validate_statement_day("statement due day", statement_due_day)?;

    Bank::find_by_id(bank_id).one(db).await?.ok_or(Error::NotFound {
        entity: "bank",
        id: bank_id,
    })?;

    credit_account::ActiveModel {
        bank_id: Set(bank_id),
        statement_issue_day: Set(statement_issue_day),
        statement_due_day: Set(statement_due_day),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)
}

async fn get_credit_account<C>(db: &C, account_id: i64) -> Result<credit_account::Model>
where
    C: ConnectionTrait,
{
    CreditAccount::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit account",
            id: account_id,
        })
}

/// Changes the day of month statements are issued.
pub async fn set_statement_issue_day(
    db: &DatabaseConnection,
    account_id: i64,
    day: i32,
) -> Result<credit_account::Model> {
    validate_statement_day("statement issue day", day)?;
    let mut account: credit_account::ActiveModel = get_credit_account(db, account_id).await?.into();
    account.statement_issue_day = Set(day);
    Ok(account.update(db).await?)
}

/// Changes the day of month statement payments are due.
pub async fn set_statement_due_day(
    db: &DatabaseConnection,
    account_id: i64,
    day: i32,
) -> Result<credit_account::Model> {
    validate_statement_day("statement due day", day)?;
    let mut account: credit_account::ActiveModel = get_credit_account(db, account_id).await?.into();
    account.statement_due_day = Set(day);
    Ok(account.update(db).await?)
}

/// Adds a card to a credit account.
#[instrument(skip(db))]
pub async fn add_credit_card(
    db: &DatabaseConnection,
    account_id: i64,
    last_four_digits: &str,
    active: bool,
) -> Result<credit_card::Model> {
    let last_four_digits = validate_last_four_digits(last_four_digits)?;
    get_credit_account(db, account_id).await?;

    credit_card::ActiveModel {
        account_id: Set(account_id),
        last_four_digits: Set(last_four_digits),
        active: Set(active),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)
}

async fn get_card<C>(db: &C, card_id: i64) -> Result<credit_card::Model>
where
    C: ConnectionTrait,
{
    CreditCard::find_by_id(card_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit card",
            id: card_id,
        })
}

/// Activates or deactivates a card.
pub async fn set_card_active<C>(db: &C, card_id: i64, active: bool) -> Result<credit_card::Model>
where
    C: ConnectionTrait,
{
    let mut card: credit_card::ActiveModel = get_card(db, card_id).await?.into();
    card.active = Set(active);
    Ok(card.update(db).await?)
}

/// Finds a user's card by bank name and/or last four digits, preferring active cards.
pub async fn find_card(
    db: &DatabaseConnection,
    user_id: i64,
    bank_name: Option<&str>,
    last_four_digits: Option<&str>,
) -> Result<Option<credit_card::Model>> {
    let mut query = CreditCard::find()
        .join(JoinType::InnerJoin, credit_card::Relation::Account.def())
        .join(JoinType::InnerJoin, credit_account::Relation::Bank.def())
        .filter(BankColumn::UserId.eq(user_id));

    if let Some(bank_name) = bank_name {
        query = query.filter(BankColumn::BankName.eq(bank_name.trim()));
    }
    if let Some(digits) = last_four_digits {
        query = query.filter(CreditCardColumn::LastFourDigits.eq(digits.trim()));
    }

    query
        .order_by_desc(CreditCardColumn::Active)
        .order_by_desc(CreditCardColumn::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Deletes a card along with its statements and their transactions.
pub async fn delete_card(db: &DatabaseConnection, card_id: i64) -> Result<()> {
    let result = CreditCard::delete_by_id(card_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "credit card",
            id: card_id,
        });
    }
    Ok(())
}

/// A card together with its account and bank.
#[derive(Debug, Clone)]
pub struct CardContext {
    pub card: credit_card::Model,
    pub account: credit_account::Model,
    pub bank: bank::Model,
}

pub(crate) async fn get_card_context<C>(db: &C, card_id: i64) -> Result<CardContext>
where
    C: ConnectionTrait,
{
    let card = get_card(db, card_id).await?;
    let account = get_credit_account(db, card.account_id).await?;
    let bank = Bank::find_by_id(account.bank_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "bank",
            id: account.bank_id,
        })?;
    Ok(CardContext {
        card,
        account,
        bank,
    })
}

/// The bank a statement ultimately belongs to.
pub(crate) async fn get_statement_bank<C>(db: &C, statement_id: i64) -> Result<bank::Model>
where
    C: ConnectionTrait,
{
    Bank::find()
        .join(JoinType::InnerJoin, bank::Relation::CreditAccounts.def())
        .join(JoinType::InnerJoin, credit_account::Relation::Cards.def())
        .join(JoinType::InnerJoin, credit_card::Relation::Statements.def())
        .filter(CreditStatementColumn::Id.eq(statement_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit statement",
            id: statement_id,
        })
}

async fn insert_statement<C>(
    db: &C,
    context: &CardContext,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
) -> Result<credit_statement::Model>
where
    C: ConnectionTrait,
{
    let due_date = match due_date {
        Some(due_date) => due_date,
        None => statement_due_date(issue_date, context.account.statement_due_day)?,
    };

    let statement = credit_statement::ActiveModel {
        card_id: Set(context.card.id),
        issue_date: Set(issue_date),
        due_date: Set(due_date),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)?;

    debug!(statement_id = statement.id, %issue_date, %due_date, "Added statement");
    Ok(statement)
}

/// Adds a statement to a card.
///
/// Without an explicit due date the statement is due on the account's due day following
/// the issue date.
#[instrument(skip(db))]
pub async fn add_statement(
    db: &DatabaseConnection,
    card_id: i64,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
) -> Result<credit_statement::Model> {
    let context = get_card_context(db, card_id).await?;
    insert_statement(db, &context, issue_date, due_date).await
}

/// Finds a card's statement by issue date, or its latest statement when no date is given.
pub async fn find_statement<C>(
    db: &C,
    card_id: i64,
    issue_date: Option<NaiveDate>,
) -> Result<Option<credit_statement::Model>>
where
    C: ConnectionTrait,
{
    let query = CreditStatement::find().filter(CreditStatementColumn::CardId.eq(card_id));
    let query = match issue_date {
        Some(issue_date) => query.filter(CreditStatementColumn::IssueDate.eq(issue_date)),
        None => query,
    };
    query
        .order_by_desc(CreditStatementColumn::IssueDate)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn infer_statement_in<C>(
    db: &C,
    context: &CardContext,
    transaction_date: NaiveDate,
    create: bool,
) -> Result<Option<credit_statement::Model>>
where
    C: ConnectionTrait,
{
    let issue_date = statement_issue_date(context.account.statement_issue_day, transaction_date)?;
    match find_statement(db, context.card.id, Some(issue_date)).await? {
        Some(statement) => Ok(Some(statement)),
        None if create => Ok(Some(insert_statement(db, context, issue_date, None).await?)),
        None => Ok(None),
    }
}

/// The statement a transaction on `transaction_date` belongs to.
///
/// When no such statement exists it is created if `create` is set; otherwise `None`.
#[instrument(skip(db))]
pub async fn infer_statement(
    db: &DatabaseConnection,
    card_id: i64,
    transaction_date: NaiveDate,
    create: bool,
) -> Result<Option<credit_statement::Model>> {
    let context = get_card_context(db, card_id).await?;
    infer_statement_in(db, &context, transaction_date, create).await
}

/// The latest statement of the same card issued before this one.
pub async fn get_prior_statement(
    db: &DatabaseConnection,
    statement_id: i64,
) -> Result<Option<credit_statement::Model>> {
    let statement = CreditStatement::find_by_id(statement_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit statement",
            id: statement_id,
        })?;

    CreditStatement::find()
        .filter(CreditStatementColumn::CardId.eq(statement.card_id))
        .filter(CreditStatementColumn::IssueDate.lt(statement.issue_date))
        .order_by_desc(CreditStatementColumn::IssueDate)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Both sides of a recorded card payment.
#[derive(Debug, Clone)]
pub struct Payment {
    /// The (negative) credit transaction on the card
    pub credit_transaction: credit_transaction::Model,
    /// The matching bank withdrawal, when a paying account was given
    pub bank_transaction: Option<bank_transaction::Model>,
}

/// Records a payment of `amount` towards a card.
///
/// The payment lands on the statement inferred from `payment_date` (created when needed),
/// with the bank's name as merchant. When `payment_account_id` is given, a bank withdrawal
/// of the same amount is recorded as well and both sides share one internal transaction
/// link. Both sides are tagged with the credit payment tag when the user has it.
///
/// # Arguments
/// * `card_id` - The card being paid
/// * `payment_account_id` - Bank account the money comes from; must belong to the card's
///   user
/// * `payment_date` - Date of the payment; picks the statement it is billed on
/// * `amount` - Positive amount paid
///
/// # Errors
/// `InvalidAmount` for a non-positive or unrepresentable amount, `NotFound` for an
/// unknown card or a paying account of another user.
#[instrument(skip(db))]
pub async fn make_payment(
    db: &DatabaseConnection,
    card_id: i64,
    payment_account_id: Option<i64>,
    payment_date: NaiveDate,
    amount: f64,
) -> Result<Payment> {
    if !is_valid_amount(amount) || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let context = get_card_context(&txn, card_id).await?;
    if let Some(account_id) = payment_account_id {
        let payer = get_account_bank(&txn, account_id).await?;
        if payer.user_id != context.bank.user_id {
            return Err(Error::NotFound {
                entity: "bank account",
                id: account_id,
            });
        }
    }
    let payee = context.bank.bank_name.clone();
    let statement = infer_statement_in(&txn, &context, payment_date, true)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit statement",
            id: card_id,
        })?;
    let tag_ids: Vec<i64> = find_tag(&txn, context.bank.user_id, CREDIT_PAYMENT_TAG)
        .await?
        .map(|tag| tag.id)
        .into_iter()
        .collect();

    let (internal_transaction_id, bank_transaction) = match payment_account_id {
        Some(account_id) => {
            let link = add_internal_transaction(&txn).await?;
            let note = format!(
                "Credit card payment ({payee} - {})",
                context.card.last_four_digits
            );
            let input = BankTransactionInput {
                account_id,
                transaction_date: payment_date,
                merchant: Some(payee.clone()),
                internal_transaction_id: Some(link),
                subtransactions: vec![
                    SubtransactionInput::new(-amount, note).with_tags(tag_ids.clone()),
                ],
            };
            let (transaction, _) = insert_bank_transaction(&txn, &input).await?;
            (Some(link), Some(transaction))
        }
        None => (None, None),
    };

    let input = CreditTransactionInput {
        statement_id: statement.id,
        transaction_date: payment_date,
        merchant: payee,
        internal_transaction_id,
        subtransactions: vec![SubtransactionInput::new(-amount, "Card payment").with_tags(tag_ids)],
    };
    let (credit_transaction, _) = insert_credit_transaction(&txn, &input).await?;

    txn.commit().await?;

    info!(card_id, statement_id = statement.id, amount, "Recorded card payment");
    Ok(Payment {
        credit_transaction,
        bank_transaction,
    })
}

/// The card a newly added card most likely replaces.
///
/// That is the single other active card of the same account, provided its latest statement
/// still carries a positive balance. Returns `None` for an inactive card or when the choice
/// is not clear-cut.
pub async fn get_potential_preceding_card(
    db: &DatabaseConnection,
    card_id: i64,
) -> Result<Option<credit_card::Model>> {
    let card = get_card(db, card_id).await?;
    if !card.active {
        return Ok(None);
    }

    let mut others = CreditCard::find()
        .filter(CreditCardColumn::AccountId.eq(card.account_id))
        .filter(CreditCardColumn::Active.eq(true))
        .filter(CreditCardColumn::Id.ne(card.id))
        .all(db)
        .await?;
    if others.len() != 1 {
        return Ok(None);
    }
    let Some(other) = others.pop() else {
        return Ok(None);
    };

    let Some(latest) = find_statement(db, other.id, None).await? else {
        return Ok(None);
    };
    let statements = credit_statements_view(db, card.account_id).await?;
    let unpaid = statements
        .iter()
        .find(|row| row.statement.id == latest.id)
        .is_some_and(|row| row.balance > Decimal::ZERO);

    Ok(unpaid.then_some(other))
}

/// Moves the prior card's latest statement to the new card and deactivates the prior card.
///
/// Used when a replacement card takes over an account: the balance still owed on the old
/// card is carried by the new one. Both changes happen in one database transaction.
///
/// # Arguments
/// * `card_id` - The new card receiving the statement
/// * `prior_card_id` - The card being replaced; must share the credit account
///
/// # Returns
/// The moved statement.
#[instrument(skip(db))]
pub async fn transfer_statement(
    db: &DatabaseConnection,
    card_id: i64,
    prior_card_id: i64,
) -> Result<credit_statement::Model> {
    let txn = db.begin().await?;

    let card = get_card(&txn, card_id).await?;
    let prior_card = get_card(&txn, prior_card_id).await?;
    if card.account_id != prior_card.account_id {
        return Err(Error::ConstraintViolation {
            message: format!(
                "cards {card_id} and {prior_card_id} belong to different credit accounts"
            ),
        });
    }

    let latest = find_statement(&txn, prior_card_id, None)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit statement",
            id: prior_card_id,
        })?;
    let mut statement: credit_statement::ActiveModel = latest.into();
    statement.card_id = Set(card_id);
    let statement = statement.update(&txn).await.map_err(Error::from_write)?;

    set_card_active(&txn, prior_card_id, false).await?;
    txn.commit().await?;

    info!(card_id, prior_card_id, statement_id = statement.id, "Transferred statement");
    Ok(statement)
}

/// Credit accounts of a user, ordered by id.
pub async fn get_credit_accounts(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<credit_account::Model>> {
    CreditAccount::find()
        .join(JoinType::InnerJoin, credit_account::Relation::Bank.def())
        .filter(BankColumn::UserId.eq(user_id))
        .order_by_asc(CreditAccountColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
