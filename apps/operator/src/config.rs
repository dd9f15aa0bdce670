use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use case_client::WorkflowConfig;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "operator.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub notification_ttl_ms: u64,
    pub reset_delay_ms: u64,
    pub result_wait_attempts: u32,
    pub result_wait_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 10,
            notification_ttl_ms: 3000,
            reset_delay_ms: 2000,
            result_wait_attempts: 10,
            result_wait_interval_ms: 2000,
        }
    }
}

impl Settings {
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            notification_ttl: Duration::from_millis(self.notification_ttl_ms),
            reset_delay: Duration::from_millis(self.reset_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn result_wait_interval(&self) -> Duration {
        Duration::from_millis(self.result_wait_interval_ms)
    }
}

/// An explicitly named file must exist; the default `operator.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None if Path::new(DEFAULT_SETTINGS_FILE).exists() => {
            read_settings_file(Path::new(DEFAULT_SETTINGS_FILE))?
        }
        None => Settings::default(),
    };
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    validate(&settings)?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    let numeric = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(v) = numeric("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = numeric("APP__NOTIFICATION_TTL_MS") {
        settings.notification_ttl_ms = v;
    }
    if let Some(v) = numeric("APP__RESET_DELAY_MS") {
        settings.reset_delay_ms = v;
    }
    if let Some(v) = numeric("APP__RESULT_WAIT_INTERVAL_MS") {
        settings.result_wait_interval_ms = v;
    }
    if let Some(v) = lookup("APP__RESULT_WAIT_ATTEMPTS").and_then(|v| v.trim().parse().ok()) {
        settings.result_wait_attempts = v;
    }
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    let url = Url::parse(&settings.backend_url)
        .with_context(|| format!("invalid backend url '{}'", settings.backend_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("backend url must use http or https, got '{}'", url.scheme());
    }
    if settings.request_timeout_secs == 0 {
        bail!("request_timeout_secs must be greater than zero");
    }
    Ok(())
}
