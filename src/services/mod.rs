// Service modules
pub mod billing_service;
pub mod credits_service;
pub mod fallback_updater;
pub mod recovery_service;
pub mod store;

pub use billing_service::{BilledOutcome, BillingService, Metered};
pub use credits_service::CreditsService;
pub use fallback_updater::FallbackUpdater;
pub use recovery_service::{CreditReservation, ReservationRecovery};
