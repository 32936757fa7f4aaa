// Integration tests

mod failure_test;
mod race_condition_test;

use std::sync::Arc;

use credit_ledger::{
    config::{Config, DatabaseConfig, LedgerConfig, OverrunPolicy, ServerConfig},
    services::{store::MemoryAccountStore, CreditsService, ReservationRecovery},
};
use uuid::Uuid;

pub fn test_config(overrun_policy: OverrunPolicy) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_ms: 5_000,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            run_migrations: false,
        },
        ledger: LedgerConfig {
            min_reservation: 1,
            overrun_policy,
        },
    }
}

/// Memory-backed services over a single seeded account
pub struct Ledger {
    pub store: Arc<MemoryAccountStore>,
    pub credits: Arc<CreditsService>,
    pub recovery: ReservationRecovery,
    pub user_id: Uuid,
}

pub fn ledger_with(store: MemoryAccountStore, total: i64, reserved: i64) -> Ledger {
    let store = Arc::new(store);
    let user_id = Uuid::new_v4();
    store.insert_account(user_id, total, reserved);

    let config = test_config(OverrunPolicy::default());
    let credits = Arc::new(CreditsService::new(store.clone(), &config.ledger));
    let recovery = ReservationRecovery::new(credits.clone(), &config.ledger);

    Ledger {
        store,
        credits,
        recovery,
        user_id,
    }
}

// Test setup helpers
pub async fn setup_test_environment() {
    // Load test environment variables
    dotenvy::from_filename(".env.test").ok();
}
