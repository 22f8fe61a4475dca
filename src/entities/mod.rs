//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the stored tables and their relationships; derived values
//! (balances, totals, payment dates) never live here.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bank;
pub mod bank_account;
pub mod bank_account_type;
pub mod bank_subtransaction;
pub mod bank_tag_link;
pub mod bank_transaction;
pub mod credit_account;
pub mod credit_card;
pub mod credit_statement;
pub mod credit_subtransaction;
pub mod credit_tag_link;
pub mod credit_transaction;
pub mod internal_transaction;
pub mod transaction_tag;
pub mod user;

// Re-export specific types to avoid conflicts
pub use bank::{Column as BankColumn, Entity as Bank, Model as BankModel};
pub use bank_account::{
    Column as BankAccountColumn, Entity as BankAccount, Model as BankAccountModel,
};
pub use bank_account_type::{
    Column as BankAccountTypeColumn, Entity as BankAccountType, GLOBAL_USER_ID,
    Model as BankAccountTypeModel,
};
pub use bank_subtransaction::{
    Column as BankSubtransactionColumn, Entity as BankSubtransaction,
    Model as BankSubtransactionModel,
};
pub use bank_tag_link::{Column as BankTagLinkColumn, Entity as BankTagLink};
pub use bank_transaction::{
    Column as BankTransactionColumn, Entity as BankTransaction, Model as BankTransactionModel,
};
pub use credit_account::{
    Column as CreditAccountColumn, Entity as CreditAccount, Model as CreditAccountModel,
};
pub use credit_card::{Column as CreditCardColumn, Entity as CreditCard, Model as CreditCardModel};
pub use credit_statement::{
    Column as CreditStatementColumn, Entity as CreditStatement, Model as CreditStatementModel,
};
pub use credit_subtransaction::{
    Column as CreditSubtransactionColumn, Entity as CreditSubtransaction,
    Model as CreditSubtransactionModel,
};
pub use credit_tag_link::{Column as CreditTagLinkColumn, Entity as CreditTagLink};
pub use credit_transaction::{
    Column as CreditTransactionColumn, Entity as CreditTransaction,
    Model as CreditTransactionModel,
};
pub use internal_transaction::{Entity as InternalTransaction, Model as InternalTransactionModel};
pub use transaction_tag::{
    Column as TransactionTagColumn, Entity as TransactionTag, Model as TransactionTagModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
