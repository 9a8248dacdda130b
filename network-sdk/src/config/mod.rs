//! Configuration management for transports and bundled delegates
//!
//! Values are read through `ConfigProvider` implementations: environment
//! variables, in-memory maps, or a chain of both. Typed configurations load
//! themselves from any provider and validate before use.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::services::UserAgent;

type Result<T> = std::result::Result<T, ConfigError>;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>().map_err(|e| ConfigError::invalid(key, e))
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            other => Err(ConfigError::invalid(key, format!("not a boolean: {}", other))),
        }
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Integer value, falling back only when the key is absent
    fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get_int(key) {
            Err(ConfigError::Missing(_)) => Ok(default),
            other => other,
        }
    }

    /// Boolean value, falling back only when the key is absent
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get_bool(key) {
            Err(ConfigError::Missing(_)) => Ok(default),
            other => other,
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Typed access by parsing from string
pub trait GenericConfigProvider: ConfigProvider {
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        let value = self.get_string(key)?;
        value.parse::<T>().map_err(|e| ConfigError::invalid(key, e))
    }

    fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.get::<T>(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> GenericConfigProvider for T {}

/// Environment variable based configuration provider
///
/// Keys are upper-cased, non-alphanumerics become underscores, and the
/// optional prefix and namespace are prepended: `transport_timeout_seconds`
/// with prefix `NETWORK_SDK` reads `NETWORK_SDK_TRANSPORT_TIMEOUT_SECONDS`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        for part in [&self.prefix, &self.namespace].into_iter().flatten() {
            env_key.push_str(part);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));
        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => ConfigError::Missing(env_key),
            env::VarError::NotUnicode(_) => ConfigError::invalid(env_key, "not valid unicode"),
        })
    }
}

/// In-memory provider for tests or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }
}

/// Tries each provider in order; the first one holding the key wins
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Arc::new(provider));
    }

    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            match provider.get_string(key) {
                Err(ConfigError::Missing(_)) => continue,
                other => return other,
            }
        }
        Err(ConfigError::Missing(key.to_string()))
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("NETWORK_SDK")));

/// A validated configuration section
pub trait ServiceConfig: Debug + Send + Sync {
    fn validate(&self) -> Result<()>;

    /// Name of the section, used as key prefix
    fn section(&self) -> &str;
}

/// Settings for the HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
    pub gzip: bool,
    pub cookies: bool,
    /// Headers sent with every request
    pub default_headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: UserAgent::default().to_string(),
            gzip: true,
            cookies: false,
            default_headers: Vec::new(),
        }
    }
}

impl TransportConfig {
    /// Load from a provider, falling back to defaults for absent keys
    ///
    /// `transport_default_headers` is a comma separated list of
    /// `name:value` pairs.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            timeout_seconds: seconds(provider, "transport_timeout_seconds", defaults.timeout_seconds)?,
            connect_timeout_seconds: seconds(
                provider,
                "transport_connect_timeout_seconds",
                defaults.connect_timeout_seconds,
            )?,
            user_agent: provider.get_string_or("transport_user_agent", &defaults.user_agent),
            gzip: provider.get_bool_or("transport_gzip", defaults.gzip)?,
            cookies: provider.get_bool_or("transport_cookies", defaults.cookies)?,
            default_headers: match provider.get_string("transport_default_headers") {
                Ok(raw) => parse_headers("transport_default_headers", &raw)?,
                Err(ConfigError::Missing(_)) => defaults.default_headers,
                Err(e) => return Err(e),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `DEFAULT_PROVIDER`
    pub fn from_env() -> Result<Self> {
        Self::from_provider(DEFAULT_PROVIDER.as_ref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl ServiceConfig for TransportConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation("transport timeout must be positive"));
        }
        if self.connect_timeout_seconds > self.timeout_seconds {
            return Err(ConfigError::validation(
                "transport connect timeout must not exceed the request timeout",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::validation("transport user agent is required"));
        }
        Ok(())
    }

    fn section(&self) -> &str {
        "transport"
    }
}

/// Settings for a JSON API reached through `JsonApi`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Key prefix, e.g. `billing` reads `billing_base_url`
    pub name: String,
    pub base_url: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl ApiConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P, name: &str) -> Result<Self> {
        let timeout_key = format!("{}_timeout_seconds", name);
        let timeout_seconds = match provider.get_int(&timeout_key) {
            Ok(value) => Some(u64::try_from(value).map_err(|e| ConfigError::invalid(&timeout_key, e))?),
            Err(ConfigError::Missing(_)) => None,
            Err(e) => return Err(e),
        };

        let api_key = match provider.get_string(&format!("{}_api_key", name)) {
            Ok(value) => Some(value),
            Err(ConfigError::Missing(_)) => None,
            Err(e) => return Err(e),
        };

        let config = Self {
            name: name.to_string(),
            base_url: provider.get_string(&format!("{}_base_url", name))?,
            api_key,
            timeout_seconds,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for ApiConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::validation(format!("{} base URL is required", self.name)));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid(format!("{}_base_url", self.name), e))?;
        if self.timeout_seconds == Some(0) {
            return Err(ConfigError::validation(format!("{} timeout must be positive", self.name)));
        }
        Ok(())
    }

    fn section(&self) -> &str {
        &self.name
    }
}

fn seconds<P: ConfigProvider + ?Sized>(provider: &P, key: &str, default: u64) -> Result<u64> {
    let value = provider.get_int_or(key, default as i64)?;
    u64::try_from(value).map_err(|e| ConfigError::invalid(key, e))
}

fn parse_headers(key: &str, raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::invalid(key, format!("expected name:value, got {}", pair))),
        })
        .collect()
}
