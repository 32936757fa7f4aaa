pub use super::credit_accounts::Entity as CreditAccounts;
