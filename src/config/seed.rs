//! Seed configuration loading from `pocketbook.toml`
//!
//! The seed file lists the bank account types shared by every user and the default tag
//! tree each new user starts with. A missing file is not an error: the built-in defaults
//! are used instead.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Name of the tag applied to credit card payments
pub const CREDIT_PAYMENT_TAG: &str = "Credit payments";

/// Configuration structure representing the entire seed file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    /// Account types stored under the global pseudo-user
    #[serde(default)]
    pub account_types: Vec<AccountTypeSeed>,
    /// Tags created for each new user, parents listed before children
    #[serde(default)]
    pub tags: Vec<TagSeed>,
}

/// A shared bank account type
#[derive(Debug, Deserialize, Clone)]
pub struct AccountTypeSeed {
    /// Full type name
    pub name: String,
    /// Optional short display name
    pub abbreviation: Option<String>,
}

/// A default tag, optionally nested under a previously listed tag
#[derive(Debug, Deserialize, Clone)]
pub struct TagSeed {
    /// Tag name
    pub name: String,
    /// Name of the parent tag
    #[serde(default)]
    pub parent: Option<String>,
}

impl SeedConfig {
    /// Defaults used when no seed file exists.
    #[must_use]
    pub fn builtin() -> Self {
        let account_type = |name: &str, abbreviation: &str| AccountTypeSeed {
            name: name.to_string(),
            abbreviation: Some(abbreviation.to_string()),
        };
        let tag = |name: &str, parent: Option<&str>| TagSeed {
            name: name.to_string(),
            parent: parent.map(str::to_string),
        };
        Self {
            account_types: vec![
                account_type("Checking", "CHK"),
                account_type("Savings", "SAV"),
                account_type("Certificate of Deposit", "CD"),
                account_type("Money Market", "MM"),
            ],
            tags: vec![
                tag(CREDIT_PAYMENT_TAG, None),
                tag("Transportation", None),
                tag("Parking", Some("Transportation")),
                tag("Gas", Some("Transportation")),
                tag("Food", None),
                tag("Groceries", Some("Food")),
                tag("Restaurants", Some("Food")),
                tag("Utilities", None),
            ],
        }
    }
}

/// Loads seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read seed file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse seed file: {e}"),
    })
}

/// Loads seed configuration from `./pocketbook.toml`, or the built-in defaults when the
/// file does not exist.
pub fn load_default_config() -> Result<SeedConfig> {
    let path = Path::new("pocketbook.toml");
    if path.exists() {
        load_config(path)
    } else {
        debug!("No pocketbook.toml found; using built-in seed data");
        Ok(SeedConfig::builtin())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_seed_config() {
        let toml_str = r#"
            [[account_types]]
            name = "Checking"
            abbreviation = "CHK"

            [[account_types]]
            name = "Brokerage"

            [[tags]]
            name = "Transportation"

            [[tags]]
            name = "Parking"
            parent = "Transportation"
        "#;

        let config: SeedConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.account_types.len(), 2);
        assert_eq!(config.account_types[0].abbreviation.as_deref(), Some("CHK"));
        assert!(config.account_types[1].abbreviation.is_none());

        assert_eq!(config.tags.len(), 2);
        assert!(config.tags[0].parent.is_none());
        assert_eq!(config.tags[1].parent.as_deref(), Some("Transportation"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let config: SeedConfig = toml::from_str("").unwrap();
        assert!(config.account_types.is_empty());
        assert!(config.tags.is_empty());
    }

    #[test]
    fn test_builtin_lists_parents_before_children() {
        let config = SeedConfig::builtin();
        for (index, tag) in config.tags.iter().enumerate() {
            if let Some(parent) = &tag.parent {
                assert!(
                    config.tags[..index].iter().any(|t| &t.name == parent),
                    "parent {parent} must precede {}",
                    tag.name
                );
            }
        }
        assert!(config.tags.iter().any(|t| t.name == CREDIT_PAYMENT_TAG));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
