use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    // Apply pending migrations (table + atomic functions) on startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Smallest reservation the recovery path accepts before failing a request.
    #[serde(default = "default_min_reservation")]
    pub min_reservation: i64,
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_reservation: default_min_reservation(),
            overrun_policy: OverrunPolicy::default(),
        }
    }
}

/// What `finalize` does when the actual cost is larger than the reservation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    /// Charge the full actual amount. Can leave more reserved than the total.
    Charge,
    /// Charge at most the reserved amount.
    #[default]
    Cap,
    /// Refuse to settle; the caller keeps the reservation.
    Reject,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_min_reservation() -> i64 {
    1
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("CREDIT_LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        if self.ledger.min_reservation < 0 {
            return Err(config::ConfigError::Message(format!(
                "ledger.min_reservation must be >= 0, got {}",
                self.ledger.min_reservation
            )));
        }
        Ok(self)
    }
}
