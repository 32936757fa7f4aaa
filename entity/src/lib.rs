//! SeaORM entities for the credit ledger schema.

pub mod prelude;

pub mod credit_accounts;
