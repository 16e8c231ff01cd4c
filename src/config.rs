use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Built-in defaults
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Payment gateway settings: the hosted-checkout provider the card flow
/// redirects to, and the shared secret used to verify its callbacks.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Base URL of the payment provider API
    pub gateway_url: String,

    /// API key sent as a bearer token on session creation
    pub gateway_api_key: String,

    /// Shared secret for verifying webhook signatures
    pub webhook_secret: String,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,

    /// Timeout for session-creation calls to the gateway (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// URL the provider redirects the shopper to after payment
    pub success_url: String,

    /// URL the provider redirects the shopper to on cancellation
    pub cancel_url: String,
}

/// Top-level application configuration, validated after loading.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Secret used to verify bearer tokens (shared with the identity service)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Bind address
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment name
    pub environment: String,

    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit structured JSON logs instead of the human-readable format
    #[serde(default)]
    pub log_json: bool,

    /// Create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Capacity of the domain-event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the order-confirmation queue
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,

    /// Payment gateway settings
    pub payment: PaymentConfig,
}

impl AppConfig {
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration is invalid: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_notification_queue_capacity() -> usize {
    256
}

fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads configuration, layered lowest to highest precedence: built-in
/// defaults, `config/default.toml`, `config/{env}.toml`, then `APP__*`
/// environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "No '{}' directory; using built-in defaults and environment variables only",
            CONFIG_DIR
        );
    }

    // NOTE: jwt_secret and payment.webhook_secret have no defaults - they MUST
    // be provided via environment variables or config files.
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("payment.gateway_url", "https://api.stripe.com")?
        .set_default("payment.success_url", "http://localhost:3000/orders")?
        .set_default("payment.cancel_url", "http://localhost:3000/cart")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("jwt_secret is not configured; set APP__JWT_SECRET to a random string of at least 32 characters");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret must be provided via config file or APP__JWT_SECRET".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration rejected by validation: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded");
    Ok(app_config)
}
