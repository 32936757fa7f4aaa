use crate::{
    config::Config,
    services::{
        store::{AccountStore, PgAccountStore},
        CreditsService, ReservationRecovery,
    },
};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub credits_service: Arc<CreditsService>,
    pub recovery: Arc<ReservationRecovery>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        if config.database.run_migrations {
            Migrator::up(&db, None).await?;
            tracing::info!("Applied pending migrations");
        }

        let store = PgAccountStore::new(db);

        // Capability detection: without the SQL functions every mutation takes the non-atomic path
        match store.probe_atomic_support().await {
            Ok(true) => tracing::info!("Atomic credit functions installed"),
            Ok(false) => tracing::warn!(
                "Atomic credit functions missing; reservations run in degraded non-atomic mode and may overcommit"
            ),
            Err(e) => tracing::warn!("Could not probe atomic credit functions: {}", e),
        }

        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Builds the state over any account store (tests, embedded use)
    pub fn with_store(store: Arc<dyn AccountStore>, config: Config) -> Self {
        let credits_service = Arc::new(CreditsService::new(store, &config.ledger));
        let recovery = Arc::new(ReservationRecovery::new(
            credits_service.clone(),
            &config.ledger,
        ));

        Self {
            credits_service,
            recovery,
            config: Arc::new(config),
        }
    }
}
