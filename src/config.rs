//! Layered tool configuration.
//!
//! Precedence is command-line flags, then the first config files found, then
//! environment variables, then built-in defaults. Passwords are only taken from the
//! command line or `MANGOSEED_DB_PW`, never from a config file.

use crate::connection::{ConnectionSettings, DEFAULT_AUTH_DB, DEFAULT_AUTH_MECHANISM, DEFAULT_SERVER};
use crate::errors::SeedError;
use crate::import::{ExistingEntryBehavior, ImportSettings};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "MANGOSEED_CONFIG";
pub const ENV_SERVER: &str = "MANGOSEED_SERVER";
pub const ENV_DATABASE: &str = "MANGOSEED_DB";
pub const ENV_USER: &str = "MANGOSEED_USER";
pub const ENV_PASSWORD: &str = "MANGOSEED_DB_PW";
pub const ENV_LOG_DIR: &str = "MANGOSEED_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "MANGOSEED_LOG_LEVEL";

const CONFIG_FILE: &str = "mangoseed.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub authentication_db: Option<String>,
    pub authentication_mechanism: Option<String>,
    pub tls_enabled: Option<bool>,
    pub allow_insecure_tls: Option<bool>,
    pub batch_size: Option<usize>,
    pub max_dop: Option<usize>,
    pub existing_entry_behavior: Option<ExistingEntryBehavior>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// Secret-looking keys found in loaded files, reported once logging is up.
    #[serde(skip)]
    pub ignored_keys: Vec<String>,
}

macro_rules! fill {
    ($dst:ident, $src:ident, $($field:ident),+ $(,)?) => {
        $( if $dst.$field.is_none() { $dst.$field = $src.$field; } )+
    };
}

impl AppConfig {
    /// # Errors
    /// `Config` when the text is not valid TOML for this structure.
    pub fn from_toml_str(text: &str) -> Result<Self, SeedError> {
        let table: toml::Table = toml::from_str(text).map_err(|e| SeedError::Config(e.to_string()))?;
        let ignored_keys = secret_keys(&toml::Value::Table(table));
        let cfg: Self = toml::from_str(text).map_err(|e| SeedError::Config(e.to_string()))?;
        Ok(Self { ignored_keys, ..cfg })
    }

    /// # Errors
    /// `Config` when the file cannot be read or parsed.
    pub fn load_file(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))?;
        let mut cfg =
            Self::from_toml_str(&text).map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))?;
        for key in &mut cfg.ignored_keys {
            *key = format!("{}: {key}", path.display());
        }
        Ok(cfg)
    }

    /// Values from the environment, looked up through `env`.
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            server: env(ENV_SERVER),
            database: env(ENV_DATABASE),
            user: env(ENV_USER),
            log_dir: env(ENV_LOG_DIR).map(PathBuf::from),
            log_level: env(ENV_LOG_LEVEL),
            ..Self::default()
        }
    }

    /// Fill every unset field from `lower`, keeping values already present.
    pub fn fill_from(&mut self, lower: Self) {
        fill!(
            self,
            lower,
            server,
            database,
            user,
            authentication_db,
            authentication_mechanism,
            tls_enabled,
            allow_insecure_tls,
            batch_size,
            max_dop,
            existing_entry_behavior,
            log_dir,
            log_level,
        );
        self.ignored_keys.extend(lower.ignored_keys);
    }

    /// Warn about every secret-looking key that was ignored in a config file.
    pub fn warn_ignored_keys(&self) {
        for key in &self.ignored_keys {
            log::warn!("ignoring secret-looking config key {key}; use {ENV_PASSWORD} or --password");
        }
    }

    /// Load config files and environment beneath `self`, which holds command-line values.
    ///
    /// An explicitly named file must exist; the well-known locations are optional.
    ///
    /// # Errors
    /// `Config` when a file that exists cannot be parsed or an explicit file is missing.
    pub fn layered(
        mut self,
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SeedError> {
        if let Some(p) = explicit
            && !p.exists()
        {
            return Err(SeedError::Config(format!("config file {} does not exist", p.display())));
        }
        for path in config_paths(explicit, &env) {
            if path.is_file() {
                log::debug!("loading config {}", path.display());
                self.fill_from(Self::load_file(&path)?);
            }
        }
        self.fill_from(Self::from_env(&env));
        Ok(self)
    }

    /// Connection settings with defaults applied. `password` comes from the command line or
    /// environment.
    ///
    /// # Errors
    /// `Config` when the credential is incomplete.
    pub fn connection_settings(&self, password: Option<String>) -> Result<ConnectionSettings, SeedError> {
        let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let settings = ConnectionSettings {
            server: trimmed(&self.server).unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            authentication_mechanism: Some(
                trimmed(&self.authentication_mechanism).unwrap_or_else(|| DEFAULT_AUTH_MECHANISM.to_string()),
            ),
            use_tls: self.tls_enabled.unwrap_or(false),
            allow_insecure_tls: self.allow_insecure_tls.unwrap_or(false),
            username: trimmed(&self.user),
            password: password.filter(|p| !p.is_empty()),
            authentication_database: Some(
                trimmed(&self.authentication_db).unwrap_or_else(|| DEFAULT_AUTH_DB.to_string()),
            ),
        };
        settings.validate()?;
        Ok(settings)
    }

    #[must_use]
    pub fn import_settings(&self) -> ImportSettings {
        let defaults = ImportSettings::default();
        ImportSettings {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            max_degree_of_parallelism: self.max_dop.unwrap_or(defaults.max_degree_of_parallelism),
            existing_entry_behavior: self.existing_entry_behavior.unwrap_or(defaults.existing_entry_behavior),
        }
    }

    /// # Errors
    /// `Config` when no database was given anywhere.
    pub fn database(&self) -> Result<&str, SeedError> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SeedError::Config(format!("Missing database (use --db or {ENV_DATABASE})")))
    }
}

/// Candidate config files, highest precedence first.
pub fn config_paths(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env(ENV_CONFIG) {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = dirs_next::home_dir() {
        paths.push(home.join(".config").join(CONFIG_FILE));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE));
    }
    paths
}

fn is_secret_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    ["password", "passwd", "secret", "token"].iter().any(|s| k.contains(s))
}

/// Dotted paths of keys that look like they hold secrets.
fn secret_keys(value: &toml::Value) -> Vec<String> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([(String::new(), value)]);
    while let Some((prefix, v)) = queue.pop_front() {
        if let toml::Value::Table(map) = v {
            for (k, child) in map {
                let full = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                if is_secret_key(k) {
                    found.push(full.clone());
                }
                queue.push_back((full, child));
            }
        }
    }
    found
}
