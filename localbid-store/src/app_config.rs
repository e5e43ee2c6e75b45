use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Share of each order kept by the platform
    #[serde(default = "default_fee_rate")]
    pub platform_fee_rate: f64,
    /// Requests per client IP per minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    #[serde(default = "default_sweep_seconds")]
    pub expiry_sweep_seconds: u64,
}

fn default_fee_rate() -> f64 { 0.05 }
fn default_rate_limit() -> i64 { 100 }
fn default_sweep_seconds() -> u64 { 60 }

impl BusinessRules {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !(0.0..=1.0).contains(&self.platform_fee_rate) {
            return Err(config::ConfigError::Message(format!(
                "business_rules.platform_fee_rate must be between 0 and 1, got {}",
                self.platform_fee_rate
            )));
        }
        Ok(())
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            platform_fee_rate: default_fee_rate(),
            rate_limit_per_minute: default_rate_limit(),
            expiry_sweep_seconds: default_sweep_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 { 12 }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Empty disables the producer; events are then only logged
    #[serde(default)]
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `LOCALBID_AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("LOCALBID").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.business_rules.validate()?;
        Ok(config)
    }
}
