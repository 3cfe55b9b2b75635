//! Layered configuration loading with figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic merges ([`ConfigLoader::merge`])
//! 3. Profile-specific file (`courier.{profile}.toml` / `courier.{profile}.yaml`)
//! 4. Main file (`courier.toml`, `config.toml`, `courier.yaml`, ...)
//! 5. Environment variables (`COURIER_*`)
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: TOML files
//! - `yaml-config`: YAML files
//!
//! # Environment Variable Mapping
//!
//! Variables use the `COURIER_` prefix and `__` as the nesting separator:
//!
//! - `COURIER_BOT__TOKEN=123:abc` → `bot.token`
//! - `COURIER_UPDATER__MODE=webhook` → `updater.mode`
//! - `COURIER_UPDATER__POLLING__TIMEOUT_SECS=50` → `updater.polling.timeout_secs`
//!
//! The profile is taken from `COURIER_PROFILE` unless set explicitly.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("deploy/courier.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "COURIER_";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "COURIER_PROFILE";

#[cfg(feature = "toml-config")]
const TOML_NAMES: &[&str] = &["courier.toml", "config.toml"];
#[cfg(feature = "yaml-config")]
const YAML_NAMES: &[&str] = &["courier.yaml", "courier.yml", "config.yaml", "config.yml"];

/// Builds a [`CourierConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    figment: Figment,
    profile: Option<String>,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: std::env::var(PROFILE_ENV)
                .ok()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty()),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    /// Selects the profile, overriding `COURIER_PROFILE`.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into().to_lowercase());
        self
    }

    /// Adds a directory to search for configuration files.
    ///
    /// Without any search path the current directory and the user config
    /// directory (`~/.config/courier` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration values programmatically, below files and the
    /// environment.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let config: CourierConfig = self.build_figment()?.extract()?;
        debug!(
            profile = profile.as_deref().unwrap_or("none"),
            mode = %config.updater.mode,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let user = std::mem::take(&mut self.figment);
        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default())).merge(user);

        figment = match self.config_file.take() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                merge_file(figment, &path)?
            }
            Some(path) => return Err(ConfigError::FileNotFound(path)),
            None => self.search_files(figment),
        };

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        Ok(figment)
    }

    fn resolved_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("courier")))
            .collect()
    }

    /// Merges the first base file found, preceded by its profile variant.
    #[allow(unused_mut, unused_variables)]
    fn search_files(&self, mut figment: Figment) -> Figment {
        let paths = self.resolved_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (merged, hit) = self.search_format(figment, &paths, TOML_NAMES, |f, p| {
                f.merge(Toml::file(p))
            });
            figment = merged;
            found |= hit;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (merged, hit) = self.search_format(figment, &paths, YAML_NAMES, |f, p| {
                f.merge(Yaml::file(p))
            });
            figment = merged;
            found |= hit;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }

    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn search_format(
        &self,
        mut figment: Figment,
        paths: &[PathBuf],
        names: &[&str],
        merge: impl Fn(Figment, &Path) -> Figment,
    ) -> (Figment, bool) {
        for dir in paths {
            for name in names {
                let Some((stem, ext)) = name.rsplit_once('.') else {
                    continue;
                };
                if let Some(profile) = &self.profile {
                    let profiled = dir.join(format!("{stem}.{profile}.{ext}"));
                    if profiled.exists() {
                        debug!(path = %profiled.display(), "Loading profile configuration");
                        figment = merge(figment, &profiled);
                    }
                }
                let base = dir.join(name);
                if base.exists() {
                    info!(path = %base.display(), "Loading configuration file");
                    return (merge(figment, &base), true);
                }
            }
        }
        (figment, false)
    }
}

/// Merges one file, choosing the format from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load()
}
