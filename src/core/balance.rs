//! Bank balance roll-up.
//!
//! Pure functions that turn subtransaction rows into per-transaction totals, a running balance
//! ordered by `(transaction_date, id)`, and the current/projected balance of an account.
//! Nothing here touches the database; `core::views` loads rows and composes these steps.

use crate::core::money::{sum_money, to_money};
use crate::entities::{bank_subtransaction, credit_subtransaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Separator placed between subtransaction notes in a transaction's `notes`.
pub const NOTE_SEPARATOR: &str = "; ";

/// A line item that contributes to a transaction total.
pub trait LineItem {
    /// Parent transaction id
    fn transaction_id(&self) -> i64;
    /// Signed stored amount
    fn subtotal(&self) -> f64;
    /// Line item description
    fn note(&self) -> &str;
}

impl LineItem for bank_subtransaction::Model {
    fn transaction_id(&self) -> i64 {
        self.transaction_id
    }

    fn subtotal(&self) -> f64 {
        self.subtotal
    }

    fn note(&self) -> &str {
        &self.note
    }
}

impl LineItem for credit_subtransaction::Model {
    fn transaction_id(&self) -> i64 {
        self.transaction_id
    }

    fn subtotal(&self) -> f64 {
        self.subtotal
    }

    fn note(&self) -> &str {
        &self.note
    }
}

/// Sum and concatenated notes of one transaction's subtransactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionTotal {
    /// Sum of subtotals, rounded to cents
    pub total: Decimal,
    /// Notes joined with [`NOTE_SEPARATOR`], in the order the items were given
    pub notes: String,
}

/// Groups line items by transaction and totals each group.
///
/// A transaction with no line items has no entry in the result; callers treat it as having
/// no total (it contributes nothing to any balance).
pub fn transaction_totals<'a, T, I>(items: I) -> BTreeMap<i64, TransactionTotal>
where
    T: LineItem + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut grouped: BTreeMap<i64, (Vec<Decimal>, Vec<&'a str>)> = BTreeMap::new();
    for item in items {
        let entry = grouped.entry(item.transaction_id()).or_default();
        entry.0.push(to_money(item.subtotal()));
        entry.1.push(item.note());
    }

    grouped
        .into_iter()
        .map(|(transaction_id, (subtotals, notes))| {
            let total = TransactionTotal {
                total: sum_money(subtotals),
                notes: notes.join(NOTE_SEPARATOR),
            };
            (transaction_id, total)
        })
        .collect()
}

/// A transaction reduced to what the running balance needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedTotal {
    /// Transaction id, the tie-break for same-day transactions
    pub id: i64,
    /// Transaction date
    pub date: NaiveDate,
    /// Transaction total, `None` when it has no subtransactions
    pub total: Option<Decimal>,
}

/// Running balance after one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningBalance {
    /// Transaction id
    pub id: i64,
    /// Transaction date
    pub date: NaiveDate,
    /// Transaction total, `None` when it has no subtransactions
    pub total: Option<Decimal>,
    /// Cumulative total of this and every earlier transaction
    pub balance: Decimal,
}

/// Computes the cumulative balance of an account's transactions in `(date, id)` order.
///
/// The input order does not matter. A transaction without a total carries the previous
/// balance forward unchanged.
#[must_use]
pub fn running_balances(rows: &[DatedTotal]) -> Vec<RunningBalance> {
    let mut ordered = rows.to_vec();
    ordered.sort_by_key(|row| (row.date, row.id));

    let mut balance = Decimal::ZERO;
    ordered
        .into_iter()
        .map(|row| {
            balance = sum_money([balance, row.total.unwrap_or_default()]);
            RunningBalance {
                id: row.id,
                date: row.date,
                total: row.total,
                balance,
            }
        })
        .collect()
}

/// Current and projected balance of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    /// Sum of transactions dated on or before today
    pub balance: Decimal,
    /// Sum of all transactions, including future-dated ones
    pub projected_balance: Decimal,
}

/// Sums an account's transactions as of `today`.
#[must_use]
pub fn account_balance(rows: &[DatedTotal], today: NaiveDate) -> AccountBalance {
    let balance = sum_money(
        rows.iter()
            .filter(|row| row.date <= today)
            .filter_map(|row| row.total),
    );
    let projected_balance = sum_money(rows.iter().filter_map(|row| row.total));
    AccountBalance {
        balance,
        projected_balance,
    }
}
