/// Database configuration and connection management
pub mod database;

/// Seed data (shared account types, default tags) loaded from pocketbook.toml
pub mod seed;
