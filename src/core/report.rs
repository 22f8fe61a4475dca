//! Plain-text summaries of a user's accounts.
//!
//! Everything here is built from the derived views and returns strings; printing or
//! logging them is left to the caller.

use crate::{
    core::{
        bank::get_banks,
        credit::get_credit_accounts,
        money::round_cents,
        views::{BankAccountView, CreditStatementView, bank_accounts_view, credit_statements_view},
    },
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;

/// Formats an amount as dollars with two decimals.
///
/// # Returns
/// Formatted string like "$50.00" or "-$25.50"
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let amount = round_cents(amount);
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount.abs())
    }
}

/// One line for a bank account, with the projection only when it differs.
#[must_use]
pub fn format_bank_account(view: &BankAccountView) -> String {
    let status = if view.account.active { "" } else { " (inactive)" };
    let mut line = format!(
        "{} {} ...{}{status}: {}",
        view.bank_name,
        view.type_common_name,
        view.account.last_four_digits,
        format_money(view.balance)
    );
    if view.projected_balance != view.balance {
        line.push_str(&format!(
            " (projected {})",
            format_money(view.projected_balance)
        ));
    }
    line
}

/// One line for a credit statement, naming when it was paid off.
#[must_use]
pub fn format_statement(bank_name: &str, view: &CreditStatementView) -> String {
    let payment = view.payment_date.map_or_else(
        || {
            if view.balance > Decimal::ZERO {
                "unpaid".to_string()
            } else {
                "nothing due".to_string()
            }
        },
        |date| format!("paid {date}"),
    );
    format!(
        "{bank_name} card ...{} statement {} (due {}): {}, {payment}",
        view.card_last_four_digits,
        view.statement.issue_date,
        view.statement.due_date,
        format_money(view.balance)
    )
}

/// Summary lines for every bank account and the latest statement of every credit account.
pub async fn account_summary_lines(
    db: &DatabaseConnection,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<String>> {
    let mut lines: Vec<String> = bank_accounts_view(db, user_id, today)
        .await?
        .iter()
        .map(format_bank_account)
        .collect();

    let bank_names: BTreeMap<i64, String> = get_banks(db, user_id)
        .await?
        .into_iter()
        .map(|bank| (bank.id, bank.bank_name))
        .collect();
    for account in get_credit_accounts(db, user_id).await? {
        let bank_name = bank_names
            .get(&account.bank_id)
            .map_or("", String::as_str);
        if let Some(latest) = credit_statements_view(db, account.id).await?.last() {
            lines.push(format_statement(bank_name, latest));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::credit::add_statement;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_money_positive() {
        assert_eq!(format_money(dec!(50)), "$50.00");
        assert_eq!(format_money(dec!(123.456)), "$123.46");
    }

    #[test]
    fn test_format_money_negative() {
        assert_eq!(format_money(dec!(-25.5)), "-$25.50");
    }

    #[test]
    fn test_format_money_zero() {
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
        assert_eq!(format_money(dec!(-0.001)), "$0.00");
    }

    #[tokio::test]
    async fn test_account_summary_lines() -> Result<()> {
        let (db, user, account) = setup_with_bank_account().await?;
        create_test_bank_transaction(&db, account.id, test_date(2024, 3, 1), 250.0, &[]).await?;
        create_test_bank_transaction(&db, account.id, test_date(2024, 4, 1), -50.0, &[]).await?;

        let bank = crate::core::bank::get_bank_by_name(&db, user.id, "Jail Money")
            .await?
            .unwrap();
        let card = create_test_credit_card(&db, bank.id, "1111").await?;
        let statement = add_statement(&db, card.id, test_date(2024, 3, 10), None).await?;
        create_test_credit_transaction(&db, statement.id, test_date(2024, 3, 2), 42.5).await?;

        let lines = account_summary_lines(&db, user.id, test_date(2024, 3, 15)).await?;
        assert_eq!(
            lines,
            vec![
                "Jail Money CHK ...1234: $250.00 (projected $200.00)".to_string(),
                "Jail Money card ...1111 statement 2024-03-10 (due 2024-04-05): $42.50, unpaid"
                    .to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_for_user_without_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "empty").await?;
        assert!(account_summary_lines(&db, user.id, test_date(2024, 1, 1)).await?.is_empty());
        Ok(())
    }
}
