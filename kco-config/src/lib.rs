//! Loader for the operator's own settings: environment-only configuration,
//! no YAML file, matching the reference operator's pure-env `Settings`
//! object (it never reads a config file, only `os.environ`).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use serde_json::Value;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Process-wide knobs read once at startup. Every field has a default so the
/// operator runs with zero configuration in a default cluster, and every
/// field can be overridden by a `KCO_<FIELD>` environment variable (e.g.
/// `KCO_DEFAULT_RATE_LIMIT_RPM=120`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperatorSettings {
    /// Namespace to watch for `TargetApp` resources, or empty for all
    /// namespaces.
    pub watch_namespace: String,
    /// Default per-tenant requests-per-minute budget used when a TApp
    /// doesn't carry its own rate limit annotation.
    pub default_rate_limit_rpm: u32,
    /// Window during which identical events for the same tenant are
    /// suppressed rather than re-emitted.
    pub event_dedup_window_seconds: u64,
    /// How often idle rate-limiter buckets and stale dedup cache entries are
    /// swept.
    pub cleanup_interval_seconds: u64,
    pub metrics_port: u16,
    pub health_port: u16,
    pub log_level: String,
    /// `"text"` or `"json"`.
    pub log_format: String,
    /// Overrides `KUBECONFIG` / in-cluster discovery when set.
    pub kubeconfig_path: Option<String>,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            watch_namespace: String::new(),
            default_rate_limit_rpm: 60,
            event_dedup_window_seconds: 300,
            cleanup_interval_seconds: 60,
            metrics_port: 9090,
            health_port: 8080,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            kubeconfig_path: None,
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Hides the `config` crate wiring behind a small builder so callers don't
/// need to know which source layers exist.
pub struct SettingsLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Start from `KCO_`-prefixed environment variables only.
    ///
    /// ```
    /// use kco_config::SettingsLoader;
    ///
    /// let settings = SettingsLoader::new().load().expect("valid settings");
    /// assert_eq!(settings.metrics_port, 9090);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("KCO").separator("__"));
        Self { builder }
    }

    /// Merge an inline JSON snippet ahead of the environment layer; used by
    /// tests to seed values without touching process environment.
    pub fn with_json_str(mut self, json: &str) -> Self {
        self.builder = self
            .builder
            .add_source(config::File::from_str(json, config::FileFormat::Json));
        self
    }

    pub fn load(self) -> Result<OperatorSettings, ConfigError> {
        let cfg = self.builder.build()?;
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);
        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_environment() {
        let settings = SettingsLoader::new().load().unwrap();
        assert_eq!(settings.metrics_port, 9090);
        assert_eq!(settings.default_rate_limit_rpm, 60);
        assert_eq!(settings.log_format, "text");
    }

    #[test]
    fn env_prefix_overrides_defaults() {
        temp_env::with_vars(
            [
                ("KCO_METRICS_PORT", Some("9999")),
                ("KCO_LOG_LEVEL", Some("debug")),
            ],
            || {
                let settings = SettingsLoader::new().load().unwrap();
                assert_eq!(settings.metrics_port, 9999);
                assert_eq!(settings.log_level, "debug");
            },
        );
    }

    #[test]
    fn expands_env_placeholders_in_string_fields() {
        temp_env::with_vars(
            [
                ("KCO_KUBECONFIG_PATH", Some("${HOME}/.kube/config")),
                ("HOME", Some("/root")),
            ],
            || {
                let settings = SettingsLoader::new().load().unwrap();
                assert_eq!(
                    settings.kubeconfig_path.as_deref(),
                    Some("/root/.kube/config")
                );
            },
        );
    }

    #[test]
    fn expands_recursively_across_env_values() {
        let mut v = serde_json::json!("placeholder");
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                v = serde_json::json!("X=${FOO}");
                expand_env_in_value(&mut v);
            },
        );
        assert_eq!(v, serde_json::json!("X=start-mid-qux-end"));
    }
}
