//! Bank business logic - banks, account types and bank accounts.
//!
//! Account types come in two flavours: rows owned by a user and shared rows owned by
//! [`GLOBAL_USER_ID`]. A user sees both, but may only change their own.

use crate::{
    config::seed::AccountTypeSeed,
    entities::{
        Bank, BankAccount, BankAccountColumn, BankAccountType, BankAccountTypeColumn, BankColumn,
        GLOBAL_USER_ID, bank, bank_account, bank_account_type,
    },
    errors::{Error, Result},
};
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, Set, prelude::*};
use tracing::{info, instrument};

pub(crate) fn validate_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName {
            message: format!("{kind} name cannot be empty"),
        });
    }
    Ok(name.to_string())
}

/// Checks that a card or account number suffix is exactly four ASCII digits.
pub(crate) fn validate_last_four_digits(digits: &str) -> Result<String> {
    let digits = digits.trim();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidLastFourDigits {
            digits: digits.to_string(),
        });
    }
    Ok(digits.to_string())
}

/// Creates a bank for a user. Bank names are unique per user.
#[instrument(skip(db))]
pub async fn create_bank(db: &DatabaseConnection, user_id: i64, name: &str) -> Result<bank::Model> {
    let bank = bank::ActiveModel {
        user_id: Set(user_id),
        bank_name: Set(validate_name("Bank", name)?),
        ..Default::default()
    };
    bank.insert(db).await.map_err(Error::from_write)
}

/// All banks of a user, ordered by name.
pub async fn get_banks(db: &DatabaseConnection, user_id: i64) -> Result<Vec<bank::Model>> {
    Bank::find()
        .filter(BankColumn::UserId.eq(user_id))
        .order_by_asc(BankColumn::BankName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a user's bank by its exact name.
pub async fn get_bank_by_name(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<Option<bank::Model>> {
    Bank::find()
        .filter(BankColumn::UserId.eq(user_id))
        .filter(BankColumn::BankName.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Deletes a bank and, through cascading foreign keys, everything it owns.
#[instrument(skip(db))]
pub async fn delete_bank(db: &DatabaseConnection, bank_id: i64) -> Result<()> {
    let result = Bank::delete_by_id(bank_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "bank",
            id: bank_id,
        });
    }
    info!(bank_id, "Deleted bank");
    Ok(())
}

/// Creates an account type owned by a user.
pub async fn create_account_type(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
    abbreviation: Option<&str>,
) -> Result<bank_account_type::Model> {
    if user_id == GLOBAL_USER_ID {
        return Err(Error::ConstraintViolation {
            message: "shared account types are managed through the seed configuration"
                .to_string(),
        });
    }
    insert_account_type(db, user_id, name, abbreviation).await
}

async fn insert_account_type<C>(
    db: &C,
    user_id: i64,
    name: &str,
    abbreviation: Option<&str>,
) -> Result<bank_account_type::Model>
where
    C: ConnectionTrait,
{
    let abbreviation = abbreviation
        .map(str::trim)
        .filter(|abbreviation| !abbreviation.is_empty())
        .map(str::to_string);

    bank_account_type::ActiveModel {
        user_id: Set(user_id),
        type_name: Set(validate_name("Account type", name)?),
        type_abbreviation: Set(abbreviation),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)
}

/// Deletes one of the user's own account types.
pub async fn delete_account_type(
    db: &DatabaseConnection,
    user_id: i64,
    account_type_id: i64,
) -> Result<()> {
    let account_type = BankAccountType::find_by_id(account_type_id)
        .one(db)
        .await?
        .filter(|account_type| account_type.user_id == user_id || account_type.is_global())
        .ok_or(Error::NotFound {
            entity: "bank account type",
            id: account_type_id,
        })?;

    if account_type.is_global() {
        return Err(Error::ConstraintViolation {
            message: format!("account type '{}' is shared and read-only", account_type.type_name),
        });
    }

    BankAccountType::delete_by_id(account_type_id)
        .exec(db)
        .await
        .map_err(Error::from_write)?;
    Ok(())
}

/// Inserts the shared account types that are not stored yet.
///
/// Returns how many rows were added; running it again adds nothing.
pub async fn seed_global_account_types<C>(db: &C, account_types: &[AccountTypeSeed]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut inserted = 0;
    for seed in account_types {
        let existing = BankAccountType::find()
            .filter(BankAccountTypeColumn::UserId.eq(GLOBAL_USER_ID))
            .filter(BankAccountTypeColumn::TypeName.eq(seed.name.trim()))
            .one(db)
            .await?;
        if existing.is_none() {
            insert_account_type(db, GLOBAL_USER_ID, &seed.name, seed.abbreviation.as_deref())
                .await?;
            inserted += 1;
        }
    }
    if inserted > 0 {
        info!(inserted, "Seeded shared account types");
    }
    Ok(inserted)
}

/// Creates a bank account.
///
/// The account type must be one of the bank owner's types or a shared type.
#[instrument(skip(db))]
pub async fn create_bank_account(
    db: &DatabaseConnection,
    bank_id: i64,
    account_type_id: i64,
    last_four_digits: &str,
    active: bool,
) -> Result<bank_account::Model> {
    let last_four_digits = validate_last_four_digits(last_four_digits)?;

    let bank = Bank::find_by_id(bank_id).one(db).await?.ok_or(Error::NotFound {
        entity: "bank",
        id: bank_id,
    })?;
    let visible = BankAccountType::find_by_id(account_type_id)
        .one(db)
        .await?
        .is_some_and(|account_type| {
            account_type.user_id == bank.user_id || account_type.is_global()
        });
    if !visible {
        return Err(Error::NotFound {
            entity: "bank account type",
            id: account_type_id,
        });
    }

    bank_account::ActiveModel {
        bank_id: Set(bank_id),
        account_type_id: Set(account_type_id),
        last_four_digits: Set(last_four_digits),
        active: Set(active),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)
}

/// Opens or closes a bank account.
pub async fn set_bank_account_active(
    db: &DatabaseConnection,
    account_id: i64,
    active: bool,
) -> Result<bank_account::Model> {
    let account = BankAccount::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "bank account",
            id: account_id,
        })?;

    let mut active_model: bank_account::ActiveModel = account.into();
    active_model.active = Set(active);
    Ok(active_model.update(db).await?)
}

/// Finds a user's bank account by any combination of bank name, last four digits and
/// account type name (full name or abbreviation).
pub async fn find_bank_account(
    db: &DatabaseConnection,
    user_id: i64,
    bank_name: Option<&str>,
    last_four_digits: Option<&str>,
    type_name: Option<&str>,
) -> Result<Option<bank_account::Model>> {
    let mut query = BankAccount::find()
        .join(JoinType::InnerJoin, bank_account::Relation::Bank.def())
        .join(JoinType::InnerJoin, bank_account::Relation::AccountType.def())
        .filter(BankColumn::UserId.eq(user_id));

    if let Some(bank_name) = bank_name {
        query = query.filter(BankColumn::BankName.eq(bank_name.trim()));
    }
    if let Some(digits) = last_four_digits {
        query = query.filter(BankAccountColumn::LastFourDigits.eq(digits.trim()));
    }
    if let Some(type_name) = type_name {
        let type_name = type_name.trim();
        query = query.filter(
            BankAccountTypeColumn::TypeName
                .eq(type_name)
                .or(BankAccountTypeColumn::TypeAbbreviation.eq(type_name)),
        );
    }

    query
        .order_by_desc(BankAccountColumn::Active)
        .order_by_asc(BankAccountColumn::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Deletes a bank account with its transactions.
pub async fn delete_bank_account(db: &DatabaseConnection, account_id: i64) -> Result<()> {
    let result = BankAccount::delete_by_id(account_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "bank account",
            id: account_id,
        });
    }
    Ok(())
}

/// The bank holding an account.
pub(crate) async fn get_account_bank<C>(db: &C, account_id: i64) -> Result<bank::Model>
where
    C: ConnectionTrait,
{
    Bank::find()
        .join(JoinType::InnerJoin, bank::Relation::BankAccounts.def())
        .filter(BankAccountColumn::Id.eq(account_id))
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "bank account",
            id: account_id,
        })
}
