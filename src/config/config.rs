use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize};

use super::duration::deserialize_duration;
use super::logging::LoggingConfig;

/// Environment variables read on top of `config.yaml`.
const ENV_KEYS: &[&str] = &[
    "REPO_NAMES",
    "SCRAPE_INTERVAL",
    "ACCESS_TOKEN",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "BIND_ADDRESS",
    "API_URL",
    "REQUEST_TIMEOUT",
    "PRUNE_SUPERSEDED_SHAS",
];

/// Exporter configuration, read once at startup.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    /// Repositories to monitor, in `owner/name` form.
    #[serde(deserialize_with = "deserialize_repositories")]
    #[schemars(with = "RepositoryList")]
    pub repo_names: Vec<String>,
    /// Pause between two collection cycles, e.g. `"5m"`.
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    #[schemars(with = "String")]
    pub scrape_interval: Duration,
    /// Credential sent as `Authorization: token <access_token>`.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Upper bound for a single commit lookup.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    #[schemars(with = "String")]
    pub request_timeout: Duration,
    /// Drop the previous `commit_sha` series of a repository once a newer commit is seen.
    #[serde(default)]
    pub prune_superseded_shas: bool,
}

impl ConfigV1 {
    /// Extracts and validates a configuration from the given figment.
    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let config: ConfigV1 = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.scrape_interval.is_zero() {
            return Err(figment::Error::from(
                "scrape_interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(figment::Error::from(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        self.logging().level_filter().map_err(figment::Error::from)?;
        Ok(())
    }

    /// Logging settings derived from the flat `log_*` keys.
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Builds the default figment: `./config.yaml` (if present) overridden by environment variables.
pub fn default_figment() -> Figment {
    Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::raw().only(ENV_KEYS))
}

/// Load the configuration from `config.yaml` and the process environment.
pub fn load_config() -> Result<ConfigV1, figment::Error> {
    ConfigV1::from_figment(default_figment())
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(ConfigV1);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Either `"a/b,c/d"` or a YAML sequence.
#[derive(Deserialize, JsonSchema)]
#[serde(untagged)]
enum RepositoryList {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_repositories<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match RepositoryList::deserialize(deserializer)? {
        RepositoryList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        RepositoryList::List(list) => list,
    };
    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("{}ms", value.as_millis()))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}
