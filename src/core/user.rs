//! User accounts and their default data.

use crate::{
    config::seed::TagSeed,
    core::{bank::validate_name, tags::create_tag},
    entities::{BankAccountType, BankAccountTypeColumn, User, UserColumn, user},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Creates a user and materialises the default tag tree for them.
///
/// Tags are created in order, so a parent must appear before its children. Everything is
/// written in one database transaction.
#[instrument(skip(db, password_hash, default_tags))]
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password_hash: &str,
    default_tags: &[TagSeed],
) -> Result<user::Model> {
    let username = validate_name("user", username)?;
    let txn = db.begin().await?;

    let user = user::ActiveModel {
        username: Set(username),
        password: Set(password_hash.to_string()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(Error::from_write)?;

    let mut created: BTreeMap<String, i64> = BTreeMap::new();
    for seed in default_tags {
        let parent_id = match &seed.parent {
            Some(parent) => Some(*created.get(&parent.to_lowercase()).ok_or_else(|| {
                Error::Config {
                    message: format!("default tag '{}' names unknown parent '{parent}'", seed.name),
                }
            })?),
            None => None,
        };
        let tag = create_tag(&txn, user.id, &seed.name, parent_id).await?;
        created.insert(tag.tag_name.to_lowercase(), tag.id);
    }

    txn.commit().await?;
    info!(user_id = user.id, tags = created.len(), "Created user");
    Ok(user)
}

/// Looks a user up by name.
pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(UserColumn::Username.eq(username.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Deletes a user with everything they own.
///
/// Banks, tags and their dependents go through cascading foreign keys. Account types are
/// not linked to users by a key, so the user's own types are removed explicitly.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, user_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let result = User::delete_by_id(user_id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "user",
            id: user_id,
        });
    }
    let types = BankAccountType::delete_many()
        .filter(BankAccountTypeColumn::UserId.eq(user_id))
        .exec(&txn)
        .await
        .map_err(Error::from_write)?;

    txn.commit().await?;
    info!(user_id, account_types = types.rows_affected, "Deleted user");
    Ok(())
}
