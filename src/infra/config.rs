use std::net::SocketAddr;
use std::time::Duration;

use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::{
    infra::error::InfraError,
    use_cases::subscription::{SyncSettings, TrialCancelPolicy},
};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct AppConfig {
    pub database_url: String,
    pub stripe_secret_key: SecretString,
    /// Bearer token required on every HTTP API request.
    pub api_token: SecretString,
    pub stripe_api_base: Url,
    pub bind_addr: SocketAddr,
    /// Currency given to customers the platform reports without one.
    pub default_currency: String,
    /// Period of the background re-sync; 0 disables it.
    pub resync_interval_secs: u64,
    pub trial_cancel_policy: TrialCancelPolicy,
    pub consistency_rereads: u32,
    pub consistency_reread_delay_ms: u64,
    /// Optional path for JSON logs.
    pub log_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url: String = get_env("DATABASE_URL");
        let stripe_secret_key = SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let api_token = SecretString::new(get_env::<String>("API_TOKEN").into());

        let stripe_api_base: Url = get_env_default(
            "STRIPE_API_BASE",
            Url::parse(DEFAULT_STRIPE_API_BASE).map_err(|e| InfraError::ConfigInvalid {
                var: "STRIPE_API_BASE",
                reason: e.to_string(),
            })?,
        );
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3002)));
        let default_currency: String = get_env_default("DEFAULT_CURRENCY", "usd".to_string());
        let resync_interval_secs: u64 = get_env_default("RESYNC_INTERVAL_SECS", 3600);
        let trial_cancel_policy: TrialCancelPolicy =
            get_env_default("TRIAL_CANCEL_POLICY", "defer".to_string())
                .parse()
                .map_err(|reason| InfraError::ConfigInvalid {
                    var: "TRIAL_CANCEL_POLICY",
                    reason,
                })?;
        let consistency_rereads: u32 = get_env_default("CONSISTENCY_REREADS", 2);
        let consistency_reread_delay_ms: u64 = get_env_default("CONSISTENCY_REREAD_DELAY_MS", 500);
        let log_file: Option<String> = std::env::var("LOG_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty());

        Ok(Self {
            database_url,
            stripe_secret_key,
            api_token,
            stripe_api_base,
            bind_addr,
            default_currency: default_currency.to_lowercase(),
            resync_interval_secs,
            trial_cancel_policy,
            consistency_rereads,
            consistency_reread_delay_ms,
            log_file,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            trial_cancel_policy: self.trial_cancel_policy,
            consistency_rereads: self.consistency_rereads,
            reread_delay: Duration::from_millis(self.consistency_reread_delay_ms),
        }
    }
}
