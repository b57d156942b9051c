use std::{
    fmt::{self, Display},
    fs,
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::{http::parse_base_url, optimistic::MutationPolicy, store::CacheMode};

pub const DEFAULT_CONFIG_FILE: &str = "kitchen.toml";

#[derive(Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    /// Zero disables the timeout.
    pub request_timeout_secs: u64,
    pub mutation_policy: MutationPolicy,
    pub cache_mode: CacheMode,
    pub reload_after_toggle: bool,
    pub expiring_soon_days: i64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".into(),
            auth_token: None,
            request_timeout_secs: 15,
            mutation_policy: MutationPolicy::default(),
            cache_mode: CacheMode::default(),
            reload_after_toggle: false,
            expiring_soon_days: 3,
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_base_url", &self.api_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("mutation_policy", &self.mutation_policy)
            .field("cache_mode", &self.cache_mode)
            .field("reload_after_toggle", &self.reload_after_toggle)
            .field("expiring_soon_days", &self.expiring_soon_days)
            .finish()
    }
}

/// Per-screen knobs derived from [`ClientSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenOptions {
    pub mutation_policy: MutationPolicy,
    pub reload_after_toggle: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    auth_token: Option<String>,
    request_timeout_secs: Option<u64>,
    mutation_policy: Option<MutationPolicy>,
    cache_mode: Option<CacheMode>,
    reload_after_toggle: Option<bool>,
    expiring_soon_days: Option<i64>,
}

impl ClientSettings {
    /// Defaults, then the TOML `file` contents, then `env`. Where two
    /// variables name the same setting the `APP__` one wins.
    pub fn from_sources(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Some(raw) = file {
            let file_cfg: FileSettings =
                toml::from_str(raw).context("failed to parse settings file")?;
            if let Some(v) = file_cfg.api_base_url {
                settings.api_base_url = v;
            }
            if let Some(v) = file_cfg.auth_token {
                settings.auth_token = Some(v);
            }
            if let Some(v) = file_cfg.request_timeout_secs {
                settings.request_timeout_secs = v;
            }
            if let Some(v) = file_cfg.mutation_policy {
                settings.mutation_policy = v;
            }
            if let Some(v) = file_cfg.cache_mode {
                settings.cache_mode = v;
            }
            if let Some(v) = file_cfg.reload_after_toggle {
                settings.reload_after_toggle = v;
            }
            if let Some(v) = file_cfg.expiring_soon_days {
                settings.expiring_soon_days = v;
            }
        }

        if let Some(v) = env("KITCHEN_API_URL") {
            settings.api_base_url = v;
        }
        if let Some(v) = env("APP__API_BASE_URL") {
            settings.api_base_url = v;
        }

        if let Some(v) = env("KITCHEN_TOKEN") {
            settings.auth_token = Some(v);
        }
        if let Some(v) = env("APP__AUTH_TOKEN") {
            settings.auth_token = Some(v);
        }

        if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
            settings.request_timeout_secs = parse_var("APP__REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = env("APP__MUTATION_POLICY") {
            settings.mutation_policy = parse_var("APP__MUTATION_POLICY", &v)?;
        }
        if let Some(v) = env("APP__CACHE_MODE") {
            settings.cache_mode = parse_var("APP__CACHE_MODE", &v)?;
        }
        if let Some(v) = env("APP__RELOAD_AFTER_TOGGLE") {
            settings.reload_after_toggle = parse_var("APP__RELOAD_AFTER_TOGGLE", &v)?;
        }
        if let Some(v) = env("APP__EXPIRING_SOON_DAYS") {
            settings.expiring_soon_days = parse_var("APP__EXPIRING_SOON_DAYS", &v)?;
        }

        settings.auth_token = settings
            .auth_token
            .filter(|token| !token.trim().is_empty());
        parse_base_url(&settings.api_base_url).context("invalid api_base_url")?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn screen_options(&self) -> ScreenOptions {
        ScreenOptions {
            mutation_policy: self.mutation_policy,
            reload_after_toggle: self.reload_after_toggle,
        }
    }
}

fn parse_var<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| anyhow!("invalid value for {key}: {err}"))
}

/// Reads `KITCHEN_CONFIG` (or `kitchen.toml` in the working directory) and the
/// process environment.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    let explicit = std::env::var("KITCHEN_CONFIG").ok();
    let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
    let raw = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(_) if explicit.is_none() => None,
        Err(err) => return Err(err).with_context(|| format!("failed to read config '{path}'")),
    };
    ClientSettings::from_sources(raw.as_deref(), |key| std::env::var(key).ok())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
