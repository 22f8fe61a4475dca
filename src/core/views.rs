//! Derived views over the stored rows.
//!
//! Every function here loads the source rows it needs and recomputes totals, balances and
//! payment dates through [`crate::core::balance`] and [`crate::core::statement`]. Nothing is
//! cached, so two calls without a write in between return identical results.

use crate::{
    core::{
        balance::{
            AccountBalance, DatedTotal, TransactionTotal, account_balance, running_balances,
            transaction_totals,
        },
        credit::get_credit_accounts,
        statement::{CreditActivity, StatementRef, summarize_statements},
    },
    entities::{
        Bank, BankAccount, BankAccountColumn, BankAccountType, BankAccountTypeColumn, BankColumn,
        BankSubtransaction, BankSubtransactionColumn, BankTransaction, BankTransactionColumn,
        CreditCard, CreditCardColumn, CreditStatement, CreditStatementColumn,
        CreditSubtransaction, CreditSubtransactionColumn, CreditTransaction,
        CreditTransactionColumn, GLOBAL_USER_ID, bank_account, bank_account_type,
        bank_transaction, credit_statement, credit_transaction,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    JoinType, QueryOrder, QuerySelect, RelationTrait, prelude::*, sea_query::SimpleExpr,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// An account type with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountTypeView {
    pub account_type: bank_account_type::Model,
    /// Abbreviation when present, otherwise the full name
    pub type_common_name: String,
}

/// Account types visible to a user: their own plus the shared ones, by name.
pub async fn bank_account_types_view(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<AccountTypeView>> {
    let account_types = BankAccountType::find()
        .filter(BankAccountTypeColumn::UserId.is_in([user_id, GLOBAL_USER_ID]))
        .order_by_asc(BankAccountTypeColumn::TypeName)
        .order_by_asc(BankAccountTypeColumn::UserId)
        .all(db)
        .await?;

    Ok(account_types
        .into_iter()
        .map(|account_type| AccountTypeView {
            type_common_name: account_type.common_name().to_string(),
            account_type,
        })
        .collect())
}

/// A bank account with its balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankAccountView {
    pub account: bank_account::Model,
    pub bank_name: String,
    pub type_common_name: String,
    /// Balance as of today
    pub balance: Decimal,
    /// Balance including future-dated transactions
    pub projected_balance: Decimal,
}

/// Bank transactions matching `filter` reduced to dated totals.
///
/// `filter` must only name `bank_transactions` columns; the subtransaction query joins that
/// table so the filter applies to both loads.
async fn load_bank_totals(
    db: &DatabaseConnection,
    filter: SimpleExpr,
) -> Result<(
    Vec<bank_transaction::Model>,
    BTreeMap<i64, TransactionTotal>,
)> {
    let transactions = BankTransaction::find()
        .filter(filter.clone())
        .order_by_asc(BankTransactionColumn::TransactionDate)
        .order_by_asc(BankTransactionColumn::Id)
        .all(db)
        .await?;

    let subtransactions = BankSubtransaction::find()
        .inner_join(BankTransaction)
        .filter(filter)
        .order_by_asc(BankSubtransactionColumn::Id)
        .all(db)
        .await?;
    debug!(
        transactions = transactions.len(),
        subtransactions = subtransactions.len(),
        "Loaded bank rows"
    );

    let totals = transaction_totals(&subtransactions);
    Ok((transactions, totals))
}

fn dated_total(
    transaction: &bank_transaction::Model,
    totals: &BTreeMap<i64, TransactionTotal>,
) -> DatedTotal {
    DatedTotal {
        id: transaction.id,
        date: transaction.transaction_date,
        total: totals.get(&transaction.id).map(|total| total.total),
    }
}

async fn build_account_views(
    db: &DatabaseConnection,
    accounts: Vec<(bank_account::Model, String)>,
    today: NaiveDate,
) -> Result<Vec<BankAccountView>> {
    let type_ids: Vec<i64> = accounts.iter().map(|(a, _)| a.account_type_id).collect();
    let common_names: BTreeMap<i64, String> = BankAccountType::find()
        .filter(BankAccountTypeColumn::Id.is_in(type_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|account_type| (account_type.id, account_type.common_name().to_string()))
        .collect();

    let account_ids: Vec<i64> = accounts.iter().map(|(a, _)| a.id).collect();
    let (transactions, totals) =
        load_bank_totals(db, BankTransactionColumn::AccountId.is_in(account_ids)).await?;
    let mut rows: BTreeMap<i64, Vec<DatedTotal>> = BTreeMap::new();
    for transaction in &transactions {
        rows.entry(transaction.account_id)
            .or_default()
            .push(dated_total(transaction, &totals));
    }

    Ok(accounts
        .into_iter()
        .map(|(account, bank_name)| {
            let AccountBalance {
                balance,
                projected_balance,
            } = account_balance(rows.get(&account.id).map_or(&[], Vec::as_slice), today);
            BankAccountView {
                type_common_name: common_names
                    .get(&account.account_type_id)
                    .cloned()
                    .unwrap_or_default(),
                bank_name,
                account,
                balance,
                projected_balance,
            }
        })
        .collect())
}

/// All bank accounts of a user with their balances, by bank name then account id.
#[instrument(skip(db))]
pub async fn bank_accounts_view(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<BankAccountView>> {
    let accounts: Vec<(bank_account::Model, String)> = BankAccount::find()
        .find_also_related(Bank)
        .filter(BankColumn::UserId.eq(user_id))
        .order_by_asc(BankColumn::BankName)
        .order_by_asc(BankAccountColumn::Id)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(account, bank)| bank.map(|bank| (account, bank.bank_name)))
        .collect();

    build_account_views(db, accounts, today).await
}

/// One bank account with its balances.
#[instrument(skip(db))]
pub async fn bank_account_view(
    db: &DatabaseConnection,
    account_id: i64,
    today: NaiveDate,
) -> Result<BankAccountView> {
    let (account, bank) = BankAccount::find_by_id(account_id)
        .find_also_related(Bank)
        .one(db)
        .await?
        .and_then(|(account, bank)| bank.map(|bank| (account, bank)))
        .ok_or(Error::NotFound {
            entity: "bank account",
            id: account_id,
        })?;

    build_account_views(db, vec![(account, bank.bank_name)], today)
        .await?
        .pop()
        .ok_or(Error::NotFound {
            entity: "bank account",
            id: account_id,
        })
}

/// A bank transaction with its total and the running balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankTransactionView {
    pub transaction: bank_transaction::Model,
    /// `None` when the transaction has no subtransactions
    pub total: Option<Decimal>,
    pub notes: String,
    pub balance: Decimal,
}

/// Transactions of a bank account in `(transaction_date, id)` order with running balances.
#[instrument(skip(db))]
pub async fn bank_transactions_view(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Vec<BankTransactionView>> {
    let (transactions, mut totals) =
        load_bank_totals(db, BankTransactionColumn::AccountId.eq(account_id)).await?;
    let rows: Vec<DatedTotal> = transactions
        .iter()
        .map(|transaction| dated_total(transaction, &totals))
        .collect();
    let mut transactions: BTreeMap<i64, bank_transaction::Model> =
        transactions.into_iter().map(|t| (t.id, t)).collect();

    Ok(running_balances(&rows)
        .into_iter()
        .filter_map(|row| {
            let transaction = transactions.remove(&row.id)?;
            let notes = totals.remove(&row.id).map(|t| t.notes).unwrap_or_default();
            Some(BankTransactionView {
                transaction,
                total: row.total,
                notes,
                balance: row.balance,
            })
        })
        .collect())
}

/// A credit statement with its derived balance and payment date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditStatementView {
    pub statement: credit_statement::Model,
    /// Credit account the statement's card belongs to
    pub account_id: i64,
    pub card_last_four_digits: String,
    /// Cumulative account activity up to this statement
    pub balance: Decimal,
    /// Cumulative charges up to this statement
    pub charge_total: Decimal,
    /// Day payments caught up with this statement's charges
    pub payment_date: Option<NaiveDate>,
}

/// Statements of every card of a credit account, by issue date then id.
#[instrument(skip(db))]
pub async fn credit_statements_view(
    db: &DatabaseConnection,
    credit_account_id: i64,
) -> Result<Vec<CreditStatementView>> {
    let cards: BTreeMap<i64, String> = CreditCard::find()
        .filter(CreditCardColumn::AccountId.eq(credit_account_id))
        .all(db)
        .await?
        .into_iter()
        .map(|card| (card.id, card.last_four_digits))
        .collect();

    let statements = CreditStatement::find()
        .inner_join(CreditCard)
        .filter(CreditCardColumn::AccountId.eq(credit_account_id))
        .order_by_asc(CreditStatementColumn::IssueDate)
        .order_by_asc(CreditStatementColumn::Id)
        .all(db)
        .await?;

    let transactions = CreditTransaction::find()
        .inner_join(CreditStatement)
        .join(JoinType::InnerJoin, credit_statement::Relation::Card.def())
        .filter(CreditCardColumn::AccountId.eq(credit_account_id))
        .all(db)
        .await?;
    let (totals, _) =
        credit_totals(db, CreditCardColumn::AccountId.eq(credit_account_id)).await?;

    let activity: Vec<CreditActivity> = transactions
        .iter()
        .filter_map(|transaction| {
            totals.get(&transaction.id).map(|total| CreditActivity {
                statement_id: transaction.statement_id,
                transaction_date: transaction.transaction_date,
                total: total.total,
            })
        })
        .collect();
    let refs: Vec<StatementRef> = statements
        .iter()
        .map(|statement| StatementRef {
            id: statement.id,
            issue_date: statement.issue_date,
        })
        .collect();
    let summaries = summarize_statements(&refs, &activity);

    Ok(statements
        .into_iter()
        .zip(summaries)
        .map(|(statement, summary)| CreditStatementView {
            card_last_four_digits: cards.get(&statement.card_id).cloned().unwrap_or_default(),
            account_id: credit_account_id,
            statement,
            balance: summary.balance,
            charge_total: summary.charge_total,
            payment_date: summary.payment_date,
        })
        .collect())
}

/// Statements of all of a user's credit accounts.
pub async fn credit_statements_view_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<CreditStatementView>> {
    let mut views = Vec::new();
    for account in get_credit_accounts(db, user_id).await? {
        views.extend(credit_statements_view(db, account.id).await?);
    }
    Ok(views)
}

/// Totals of credit transactions matching `filter`, which may name columns of
/// `credit_transactions`, `credit_statements` or `credit_cards`.
async fn credit_totals(
    db: &DatabaseConnection,
    filter: SimpleExpr,
) -> Result<(BTreeMap<i64, TransactionTotal>, usize)> {
    let subtransactions = CreditSubtransaction::find()
        .inner_join(CreditTransaction)
        .join(JoinType::InnerJoin, credit_transaction::Relation::Statement.def())
        .join(JoinType::InnerJoin, credit_statement::Relation::Card.def())
        .filter(filter)
        .order_by_asc(CreditSubtransactionColumn::Id)
        .all(db)
        .await?;
    Ok((transaction_totals(&subtransactions), subtransactions.len()))
}

/// A credit transaction with its total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditTransactionView {
    pub transaction: credit_transaction::Model,
    /// `None` when the transaction has no subtransactions
    pub total: Option<Decimal>,
    pub notes: String,
}

/// Transactions of a statement in `(transaction_date, id)` order.
#[instrument(skip(db))]
pub async fn credit_transactions_view(
    db: &DatabaseConnection,
    statement_id: i64,
) -> Result<Vec<CreditTransactionView>> {
    let transactions = CreditTransaction::find()
        .filter(CreditTransactionColumn::StatementId.eq(statement_id))
        .order_by_asc(CreditTransactionColumn::TransactionDate)
        .order_by_asc(CreditTransactionColumn::Id)
        .all(db)
        .await?;
    let (mut totals, count) =
        credit_totals(db, CreditTransactionColumn::StatementId.eq(statement_id)).await?;
    debug!(transactions = transactions.len(), subtransactions = count, "Loaded credit rows");

    Ok(transactions
        .into_iter()
        .map(|transaction| {
            let total = totals.remove(&transaction.id);
            CreditTransactionView {
                transaction,
                total: total.as_ref().map(|t| t.total),
                notes: total.map(|t| t.notes).unwrap_or_default(),
            }
        })
        .collect())
}
