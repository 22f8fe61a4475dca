//! Core business logic: writes, derived views and reports, independent of any front end.

/// Tag statistics and rankings
pub mod analytics;
/// Running balances for bank accounts
pub mod balance;
/// Banks, account types and bank accounts
pub mod bank;
/// Credit accounts, cards, statements and payments
pub mod credit;
/// Cent-rounded decimal arithmetic
pub mod money;
/// Plain-text account summaries
pub mod report;
/// Statement balances and payment-date inference
pub mod statement;
/// Tag hierarchy, linking and categorization
pub mod tags;
/// Transaction writes and transfer links
pub mod transaction;
/// Users and their default data
pub mod user;
/// Derived views recomputed from stored rows
pub mod views;
