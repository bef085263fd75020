use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, File as ConfigFile};
use shepherd_files::{EmptyBodyPolicy, FetchConfig};
use shepherd_names::DEFAULT_ALIAS_SUFFIX;
use shepherd_rpc::DEFAULT_BANNER;

pub const DEFAULT_CONFIG_FILE: &str = "config/shepherd.toml";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5656;
pub const DEFAULT_LCD_URL: &str = "https://api.jackalprotocol.com";
pub const DEFAULT_CACHE_PATH: &str = "data";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub lcd_url: String,
    pub cache_enabled: bool,
    pub cache_path: String,
    pub alias_suffix: String,
    pub provider_timeout_ms: u64,
    pub max_provider_attempts: usize,
    pub fetch_budget_ms: u64,
    pub ledger_timeout_ms: u64,
    pub empty_markdown: EmptyBodyPolicy,
    pub log_level: String,
    pub log_format: String,
    pub banner: String,
}

impl AppConfig {
    /// File (explicit, or `config/shepherd.toml` when present), then
    /// `SHEPHERD_*` environment, then the legacy `RPC`/`PORT` variables.
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix("SHEPHERD"));
        let config = builder.build()?;

        let mut app = Self::from_config(&config, |key| std::env::var(key).ok())?;
        app.config_path = resolved_path;
        Ok(app)
    }

    fn from_config<F>(config: &Config, legacy_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let legacy = |key: &str| {
            legacy_env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match get_string_value(config, &["port"]).or_else(|| legacy("PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid port {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let app = Self {
            config_path: None,
            host: get_string_value(config, &["host"]).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            lcd_url: get_string_value(config, &["lcd_url"])
                .or_else(|| legacy("RPC"))
                .unwrap_or_else(|| DEFAULT_LCD_URL.to_string()),
            cache_enabled: get_bool_value(config, &["cache_enabled"], true),
            cache_path: get_string_value(config, &["cache_path"])
                .unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string()),
            alias_suffix: get_string_value(config, &["alias_suffix"])
                .unwrap_or_else(|| DEFAULT_ALIAS_SUFFIX.to_string()),
            provider_timeout_ms: get_number_value(config, "provider_timeout_ms", 30_000)?,
            max_provider_attempts: get_number_value(config, "max_provider_attempts", 16)?,
            fetch_budget_ms: get_number_value(config, "fetch_budget_ms", 120_000)?,
            ledger_timeout_ms: get_number_value(config, "ledger_timeout_ms", 15_000)?,
            empty_markdown: get_string_value(config, &["empty_markdown"])
                .map(|value| EmptyBodyPolicy::from_config(&value))
                .unwrap_or_default(),
            log_level: get_string_value(config, &["log_level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(config, &["log_format"])
                .unwrap_or_else(|| "pretty".to_string()),
            banner: get_string_value(config, &["banner"])
                .unwrap_or_else(|| DEFAULT_BANNER.to_string()),
        };
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.lcd_url)
            .with_context(|| format!("lcd_url {:?} is not a valid URL", self.lcd_url))?;
        if self.max_provider_attempts == 0 {
            bail!("max_provider_attempts must be at least 1");
        }
        if self.provider_timeout_ms == 0 || self.fetch_budget_ms == 0 {
            bail!("provider_timeout_ms and fetch_budget_ms must be positive");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!("log_format must be \"pretty\" or \"json\", got {:?}", self.log_format);
        }
        if self.cache_enabled && self.cache_path.trim().is_empty() {
            bail!("cache_path must be set when the cache is enabled");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_path(&self) -> &Path {
        Path::new(&self.cache_path)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            provider_timeout: Duration::from_millis(self.provider_timeout_ms),
            max_attempts: self.max_provider_attempts,
            total_budget: Duration::from_millis(self.fetch_budget_ms),
            empty_markdown: self.empty_markdown,
        }
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

fn get_number_value<T>(config: &Config, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get_string_value(config, &[key]) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value {raw:?} for {key}")),
        None => Ok(default),
    }
}
