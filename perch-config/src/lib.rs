//! Loader for workspace configuration with YAML + environment overlays.
//!
//! The expected file is `perch.yaml`; any field may reference environment
//! variables with `${VAR}` placeholders, and `PERCH_`-prefixed environment
//! variables override file values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct PerchConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub mode: RunMode,
    pub credentials: Credentials,
    pub fetch: FetchConfig,
    #[serde(default)]
    pub stream: Option<StreamConfig>,
}

/// Which top-level flow the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Fetch,
    Stream,
}

/// The four OAuth 1.0a user-context secrets, read once at startup and passed
/// by reference into the authenticator. Never read from ambient globals.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

// Secrets stay out of logs; only presence is shown.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchConfig {
    /// Screen name whose timeline is fetched.
    pub subject: String,
    /// Upper bound on fetched posts; 0 fetches none.
    pub count: usize,
    /// Upper bound on fetched friend ids; 0 skips the friends fetch.
    #[serde(default)]
    pub friends_count: usize,
    /// Optional file that receives one post text per line.
    #[serde(default)]
    pub timeline_out: Option<PathBuf>,
    /// Optional file that receives one friend id per line.
    #[serde(default)]
    pub friends_out: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct StreamConfig {
    /// Keywords the push subscription is filtered by.
    pub keywords: Vec<String>,
    /// Append-only file receiving one raw payload per line.
    pub target_file: PathBuf,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                // Values may reference variables that themselves contain
                // `${...}`; expand until a fixed point or the depth cap.
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

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct PerchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PerchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PerchConfigLoader {
    /// Start with sensible defaults: YAML file + `PERCH_` env overrides.
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("PERCH").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use perch_config::{PerchConfigLoader, RunMode};
    ///
    /// let cfg = PerchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "test"
    /// credentials:
    ///   consumer_key: "ck"
    ///   consumer_secret: "cs"
    ///   access_token: "at"
    ///   access_secret: "as"
    /// fetch:
    ///   subject: "jack"
    ///   count: 20
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("test"));
    /// assert_eq!(cfg.mode, RunMode::Fetch);
    /// assert_eq!(cfg.fetch.count, 20);
    /// assert!(cfg.stream.is_none());
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded before the strongly typed structs
    /// are materialised, so secrets can live in the environment while the
    /// file stays checked in.
    ///
    /// ```
    /// use perch_config::PerchConfigLoader;
    ///
    /// unsafe { std::env::set_var("PERCH_DOC_TOKEN", "injected-from-env"); }
    ///
    /// let cfg = PerchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// credentials:
    ///   consumer_key: "ck"
    ///   consumer_secret: "cs"
    ///   access_token: "${PERCH_DOC_TOKEN}"
    ///   access_secret: "as"
    /// fetch:
    ///   subject: "jack"
    ///   count: 1
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cfg.credentials.access_token, "injected-from-env");
    ///
    /// unsafe { std::env::remove_var("PERCH_DOC_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PerchConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Deserialize loosely first so `${VAR}` expansion can walk the tree.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PerchConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
