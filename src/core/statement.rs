//! Credit statement roll-up and payment inference.
//!
//! All functions work on one credit account at a time (every card of the account together)
//! and compose in this order:
//!
//! 1. [`daily_activity`] nets each statement's transactions per day and classifies the day
//!    as a charge (net >= 0) or a payment (net < 0).
//! 2. [`statement_balances`] accumulates activity by statement issue date, giving each
//!    statement its balance and its cumulative charge total.
//! 3. [`daily_payment_totals`] accumulates payments by transaction date across the account.
//! 4. [`infer_payment_dates`] finds, for each statement, the first day on which cumulative
//!    payments offset its cumulative charges.
//!
//! [`summarize_statements`] runs the whole chain.

use crate::core::money::{SETTLEMENT_TOLERANCE, is_settled, sum_money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// The parts of a statement row the roll-up needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementRef {
    /// Statement id
    pub id: i64,
    /// Issue date, the window ordering key
    pub issue_date: NaiveDate,
}

/// One credit transaction's total, tagged with where and when it was billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditActivity {
    /// Statement the transaction belongs to
    pub statement_id: i64,
    /// Transaction date
    pub transaction_date: NaiveDate,
    /// Transaction total
    pub total: Decimal,
}

/// Net activity of one statement on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyActivity {
    /// Statement the activity was billed on
    pub statement_id: i64,
    /// Day of the activity
    pub transaction_date: NaiveDate,
    /// Net total of the day's transactions on this statement
    pub total: Decimal,
    /// `total` when it is non-negative, otherwise zero
    pub charge: Decimal,
    /// `total` when it is negative, otherwise zero
    pub payment: Decimal,
}

/// Nets transactions per `(statement, day)` and classifies each day.
///
/// The result is ordered by day, then statement id.
#[must_use]
pub fn daily_activity(activity: &[CreditActivity]) -> Vec<DailyActivity> {
    let mut grouped: BTreeMap<(NaiveDate, i64), Vec<Decimal>> = BTreeMap::new();
    for item in activity {
        grouped
            .entry((item.transaction_date, item.statement_id))
            .or_default()
            .push(item.total);
    }

    grouped
        .into_iter()
        .map(|((transaction_date, statement_id), totals)| {
            let total = sum_money(totals);
            let (charge, payment) = if total >= Decimal::ZERO {
                (total, Decimal::ZERO)
            } else {
                (Decimal::ZERO, total)
            };
            DailyActivity {
                statement_id,
                transaction_date,
                total,
                charge,
                payment,
            }
        })
        .collect()
}

/// Cumulative values of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatementTotals {
    /// All activity on this statement and every statement issued on or before it
    pub balance: Decimal,
    /// Charge days only, same window as `balance`
    pub charge_total: Decimal,
}

/// Accumulates daily activity by statement issue date.
///
/// Statements issued on the same date are peers: they share the same cumulative values.
/// A statement without activity still carries everything issued before it. Activity that
/// references an unknown statement is ignored.
#[must_use]
pub fn statement_balances(
    statements: &[StatementRef],
    days: &[DailyActivity],
) -> BTreeMap<i64, StatementTotals> {
    let issue_dates: BTreeMap<i64, NaiveDate> = statements
        .iter()
        .map(|statement| (statement.id, statement.issue_date))
        .collect();

    let mut per_issue_date: BTreeMap<NaiveDate, (Vec<Decimal>, Vec<Decimal>)> = statements
        .iter()
        .map(|statement| (statement.issue_date, (Vec::new(), Vec::new())))
        .collect();
    for day in days {
        if let Some(issue_date) = issue_dates.get(&day.statement_id) {
            let entry = per_issue_date.entry(*issue_date).or_default();
            entry.0.push(day.total);
            entry.1.push(day.charge);
        }
    }

    let mut running = StatementTotals::default();
    let cumulative: BTreeMap<NaiveDate, StatementTotals> = per_issue_date
        .into_iter()
        .map(|(issue_date, (totals, charges))| {
            running = StatementTotals {
                balance: sum_money(std::iter::once(running.balance).chain(totals)),
                charge_total: sum_money(std::iter::once(running.charge_total).chain(charges)),
            };
            (issue_date, running)
        })
        .collect();

    statements
        .iter()
        .map(|statement| {
            let totals = cumulative
                .get(&statement.issue_date)
                .copied()
                .unwrap_or_default();
            (statement.id, totals)
        })
        .collect()
}

/// Cumulative payments as of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTotal {
    /// Day
    pub date: NaiveDate,
    /// Sum of all payment days up to and including `date` (zero or negative)
    pub total: Decimal,
}

/// Accumulates payments by transaction date across every statement of the account.
///
/// One entry per distinct activity day, ascending. Charge-only days repeat the previous
/// cumulative value.
#[must_use]
pub fn daily_payment_totals(days: &[DailyActivity]) -> Vec<PaymentTotal> {
    let mut per_date: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
    for day in days {
        per_date.entry(day.transaction_date).or_default().push(day.payment);
    }

    let mut running = Decimal::ZERO;
    per_date
        .into_iter()
        .map(|(date, payments)| {
            running = sum_money(std::iter::once(running).chain(payments));
            PaymentTotal {
                date,
                total: running,
            }
        })
        .collect()
}

/// Finds the first day on which cumulative payments offset a statement's charge total.
///
/// Returns `None` for a statement whose balance is (within tolerance) zero, since a fresh
/// statement trivially satisfies the condition, and for one that payments never caught up
/// with. Payment totals only ever decrease, so the first qualifying day is found by binary
/// search.
#[must_use]
pub fn payment_date(
    totals: StatementTotals,
    payment_totals: &[PaymentTotal],
) -> Option<NaiveDate> {
    if is_settled(totals.balance) {
        return None;
    }
    let offset = |payment: &PaymentTotal| totals.charge_total + payment.total <= SETTLEMENT_TOLERANCE;
    let index = payment_totals.partition_point(|payment| !offset(payment));
    payment_totals.get(index).map(|payment| payment.date)
}

/// Infers the payment date of every statement.
#[must_use]
pub fn infer_payment_dates(
    balances: &BTreeMap<i64, StatementTotals>,
    payment_totals: &[PaymentTotal],
) -> BTreeMap<i64, Option<NaiveDate>> {
    balances
        .iter()
        .map(|(statement_id, totals)| (*statement_id, payment_date(*totals, payment_totals)))
        .collect()
}

/// Derived values of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatementSummary {
    /// Statement id
    pub statement_id: i64,
    /// Cumulative balance as of this statement
    pub balance: Decimal,
    /// Cumulative charges as of this statement
    pub charge_total: Decimal,
    /// Day the statement was paid off, if it has been
    pub payment_date: Option<NaiveDate>,
}

/// Runs the full roll-up for one credit account.
///
/// The result follows the order of `statements`.
#[must_use]
pub fn summarize_statements(
    statements: &[StatementRef],
    activity: &[CreditActivity],
) -> Vec<StatementSummary> {
    let days = daily_activity(activity);
    let balances = statement_balances(statements, &days);
    let payment_totals = daily_payment_totals(&days);

    statements
        .iter()
        .map(|statement| {
            let totals = balances.get(&statement.id).copied().unwrap_or_default();
            StatementSummary {
                statement_id: statement.id,
                balance: totals.balance,
                charge_total: totals.charge_total,
                payment_date: payment_date(totals, &payment_totals),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, month, day).unwrap()
    }

    fn statement(id: i64, issue_date: NaiveDate) -> StatementRef {
        StatementRef { id, issue_date }
    }

    fn activity(statement_id: i64, transaction_date: NaiveDate, total: Decimal) -> CreditActivity {
        CreditActivity {
            statement_id,
            transaction_date,
            total,
        }
    }

    #[test]
    fn test_same_day_transactions_net_before_classification() {
        let days = daily_activity(&[
            activity(1, date(1, 5), dec!(30.00)),
            activity(1, date(1, 5), dec!(-50.00)),
            activity(1, date(1, 6), dec!(10.00)),
        ]);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].total, dec!(-20.00));
        assert_eq!(days[0].charge, Decimal::ZERO);
        assert_eq!(days[0].payment, dec!(-20.00));
        assert_eq!(days[1].charge, dec!(10.00));
        assert_eq!(days[1].payment, Decimal::ZERO);
    }

    #[test]
    fn test_zero_net_day_counts_as_charge() {
        let days = daily_activity(&[
            activity(1, date(1, 5), dec!(25.00)),
            activity(1, date(1, 5), dec!(-25.00)),
        ]);
        assert_eq!(days[0].charge, Decimal::ZERO);
        assert_eq!(days[0].payment, Decimal::ZERO);
        assert_eq!(days[0].total, Decimal::ZERO);
    }

    #[test]
    fn test_statement_balances_accumulate_by_issue_date() {
        let statements = [
            statement(2, date(2, 10)),
            statement(1, date(1, 10)),
            statement(3, date(3, 10)),
        ];
        let days = daily_activity(&[
            activity(1, date(1, 2), dec!(100.00)),
            activity(2, date(1, 20), dec!(-100.00)),
            activity(2, date(2, 1), dec!(40.00)),
        ]);

        let balances = statement_balances(&statements, &days);

        assert_eq!(balances[&1].balance, dec!(100.00));
        assert_eq!(balances[&1].charge_total, dec!(100.00));
        assert_eq!(balances[&2].balance, dec!(40.00));
        assert_eq!(balances[&2].charge_total, dec!(140.00));
        // No activity of its own: carries everything before it
        assert_eq!(balances[&3].balance, dec!(40.00));
        assert_eq!(balances[&3].charge_total, dec!(140.00));
    }

    #[test]
    fn test_statements_sharing_an_issue_date_are_peers() {
        let statements = [statement(1, date(1, 10)), statement(2, date(1, 10))];
        let days = daily_activity(&[
            activity(1, date(1, 2), dec!(10.00)),
            activity(2, date(1, 3), dec!(5.00)),
        ]);

        let balances = statement_balances(&statements, &days);
        assert_eq!(balances[&1].balance, dec!(15.00));
        assert_eq!(balances[&2].balance, dec!(15.00));
    }

    #[test]
    fn test_daily_payment_totals_span_statements() {
        let days = daily_activity(&[
            activity(1, date(1, 2), dec!(100.00)),
            activity(2, date(1, 20), dec!(-60.00)),
            activity(1, date(1, 25), dec!(12.00)),
            activity(3, date(2, 3), dec!(-40.00)),
        ]);

        let totals = daily_payment_totals(&days);
        let values: Vec<(NaiveDate, Decimal)> = totals.iter().map(|t| (t.date, t.total)).collect();
        assert_eq!(
            values,
            vec![
                (date(1, 2), dec!(0.00)),
                (date(1, 20), dec!(-60.00)),
                (date(1, 25), dec!(-60.00)),
                (date(2, 3), dec!(-100.00)),
            ]
        );
    }

    #[test]
    fn test_payment_date_is_day_payments_catch_up() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let summaries = summarize_statements(
            &statements,
            &[
                activity(1, date(1, 1), dec!(100.00)),
                activity(2, date(1, 15), dec!(-60.00)),
                activity(2, date(1, 20), dec!(-40.00)),
            ],
        );

        assert_eq!(summaries[0].charge_total, dec!(100.00));
        assert_eq!(summaries[0].balance, dec!(100.00));
        assert_eq!(summaries[0].payment_date, Some(date(1, 20)));
    }

    #[test]
    fn test_zero_balance_statement_is_never_paid() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let summaries = summarize_statements(
            &statements,
            &[
                activity(1, date(1, 1), dec!(100.00)),
                activity(2, date(1, 15), dec!(-100.00)),
            ],
        );

        assert_eq!(summaries[0].payment_date, Some(date(1, 15)));
        assert_eq!(summaries[1].balance, Decimal::ZERO);
        assert_eq!(summaries[1].payment_date, None);
    }

    #[test]
    fn test_statement_without_activity_is_never_paid() {
        let summaries = summarize_statements(&[statement(1, date(1, 10))], &[]);
        assert_eq!(summaries[0].balance, Decimal::ZERO);
        assert_eq!(summaries[0].payment_date, None);
    }

    #[test]
    fn test_insufficient_payments_leave_statement_unpaid() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let summaries = summarize_statements(
            &statements,
            &[
                activity(1, date(1, 1), dec!(100.00)),
                activity(2, date(1, 15), dec!(-99.99)),
            ],
        );
        assert_eq!(summaries[0].payment_date, None);
    }

    #[test]
    fn test_earliest_qualifying_day_wins() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let summaries = summarize_statements(
            &statements,
            &[
                activity(1, date(1, 1), dec!(50.00)),
                activity(2, date(1, 15), dec!(-50.00)),
                activity(2, date(1, 18), dec!(-10.00)),
                activity(2, date(1, 21), dec!(-5.00)),
            ],
        );
        assert_eq!(summaries[0].payment_date, Some(date(1, 15)));
    }

    #[test]
    fn test_later_statement_needs_all_prior_charges_paid() {
        let statements = [
            statement(1, date(1, 10)),
            statement(2, date(2, 10)),
            statement(3, date(3, 10)),
        ];
        let summaries = summarize_statements(
            &statements,
            &[
                activity(1, date(1, 1), dec!(100.00)),
                activity(2, date(1, 20), dec!(30.00)),
                activity(2, date(2, 1), dec!(-100.00)),
                activity(3, date(2, 20), dec!(-30.00)),
            ],
        );

        assert_eq!(summaries[0].payment_date, Some(date(2, 1)));
        assert_eq!(summaries[1].charge_total, dec!(130.00));
        assert_eq!(summaries[1].payment_date, Some(date(2, 20)));
        assert_eq!(summaries[2].balance, Decimal::ZERO);
        assert_eq!(summaries[2].payment_date, None);
    }

    #[test]
    fn test_many_small_payments_settle_exactly() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let mut rows = vec![activity(1, date(1, 1), dec!(10.00))];
        rows.extend((0..1000).map(|_| activity(2, date(1, 15), dec!(-0.01))));

        let summaries = summarize_statements(&statements, &rows);
        assert_eq!(summaries[0].payment_date, Some(date(1, 15)));
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let statements = [statement(1, date(1, 10)), statement(2, date(2, 10))];
        let rows = [
            activity(1, date(1, 1), dec!(75.25)),
            activity(2, date(1, 12), dec!(-75.25)),
        ];
        assert_eq!(
            summarize_statements(&statements, &rows),
            summarize_statements(&statements, &rows)
        );
    }
}
