use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub carriers: CarriersConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CarriersConfig {
    pub dash: DashSettings,
    pub ydm: YdmSettings,
    pub pick_n_drop: PickNDropSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashSettings {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_carrier_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YdmSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_carrier_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PickNDropSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_carrier_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_delivery_charge")]
    pub delivery_charge: i64,
    /// FIRST_ONLY or EVERY_OCCURRENCE.
    #[serde(default = "default_delivered_count_policy")]
    pub delivered_count_policy: String,
}

fn default_carrier_timeout() -> u64 {
    15
}

fn default_delivery_charge() -> i64 {
    100
}

fn default_delivered_count_policy() -> String {
    "FIRST_ONLY".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CARAVEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
