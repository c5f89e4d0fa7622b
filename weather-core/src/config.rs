use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{gate::Permission, model::Coordinates, provider::openweather};

/// Environment variable consulted when no API key is stored on disk.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Stored answer to a location permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Undecided,
    Granted,
    Denied,
    NeverAsk,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub coarse: PermissionState,
    pub fine: PermissionState,
}

impl PermissionsConfig {
    pub fn get(&self, permission: Permission) -> PermissionState {
        match permission {
            Permission::CoarseLocation => self.coarse,
            Permission::FineLocation => self.fine,
        }
    }

    pub fn set(&mut self, permission: Permission, state: PermissionState) {
        match permission {
            Permission::CoarseLocation => self.coarse = state,
            Permission::FineLocation => self.fine = state,
        }
    }
}

/// Where location fixes come from.
///
/// Example TOML:
/// [location]
/// latitude = 43.51
/// longitude = 16.44
/// ip_lookup = false
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ip_lookup: bool,
    pub ip_lookup_url: String,
    pub timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            ip_lookup: true,
            ip_lookup_url: crate::location::ip::DEFAULT_LOOKUP_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Unit system token sent with every request.
    pub units: String,
    /// Overrides the locale configuration string read from the environment.
    pub locale: Option<String>,
    pub location: LocationConfig,
    pub permissions: PermissionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: openweather::BASE_URL.to_string(),
            units: openweather::METRIC_UNIT.to_string(),
            locale: None,
            location: LocationConfig::default(),
            permissions: PermissionsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "astriex", "checkweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the key-value stores.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// API key from the config file, falling back to `OPENWEATHER_API_KEY`.
    pub fn api_key(&self) -> Result<String> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// Like [`Config::api_key`], reading the fallback through `env`.
    pub fn api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather API key configured.\n\
                     Hint: run `checkweather configure` or set {API_KEY_ENV}."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Coordinates pinned in the config, if both halves are present.
    pub fn fixed_coordinates(&self) -> Option<Coordinates> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    pub fn set_fixed_coordinates(&mut self, coords: Option<Coordinates>) {
        self.location.latitude = coords.map(|c| c.latitude);
        self.location.longitude = coords.map(|c| c.longitude);
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location.timeout_secs.max(1))
    }

    /// The locale configuration string the unit heuristic inspects.
    pub fn locale_config(&self) -> String {
        if let Some(locale) = &self.locale {
            return locale.clone();
        }

        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_openweather_in_metric() {
        let cfg = Config::default();

        assert_eq!(cfg.base_url, "https://api.openweathermap.org/data/");
        assert_eq!(cfg.units, "metric");
        assert!(cfg.location.ip_lookup);
        assert_eq!(cfg.location_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.permissions, PermissionsConfig::default());
    }

    #[test]
    fn missing_api_key_falls_back_to_environment() {
        let cfg = Config::default();
        let key = cfg
            .api_key_with(|name| (name == API_KEY_ENV).then(|| "ENV_KEY".to_string()))
            .unwrap();
        assert_eq!(key, "ENV_KEY");
    }

    #[test]
    fn blank_api_key_everywhere_is_a_hint_error() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());

        let err = cfg.api_key_with(|_| Some(String::new())).unwrap_err();
        assert!(err.to_string().contains("Hint: run `checkweather configure`"));
    }

    #[test]
    fn stored_api_key_wins() {
        let mut cfg = Config::default();
        cfg.set_api_key("OPEN_KEY".into());

        assert_eq!(cfg.api_key().unwrap(), "OPEN_KEY");
    }

    #[test]
    fn fixed_coordinates_need_both_halves() {
        let mut cfg = Config::default();
        cfg.location.latitude = Some(43.5);
        assert_eq!(cfg.fixed_coordinates(), None);

        cfg.location.longitude = Some(16.4);
        assert_eq!(cfg.fixed_coordinates(), Some(Coordinates::new(43.5, 16.4)));

        cfg.set_fixed_coordinates(None);
        assert_eq!(cfg.location.latitude, None);
    }

    #[test]
    fn locale_override_is_used_verbatim() {
        let cfg = Config {
            locale: Some("{1.0 en_LR}".into()),
            ..Config::default()
        };

        assert_eq!(cfg.locale_config(), "{1.0 en_LR}");
    }

    #[test]
    fn permission_states_are_tracked_per_permission() {
        let mut perms = PermissionsConfig::default();
        perms.set(Permission::FineLocation, PermissionState::NeverAsk);

        assert_eq!(perms.get(Permission::CoarseLocation), PermissionState::Undecided);
        assert_eq!(perms.get(Permission::FineLocation), PermissionState::NeverAsk);
    }

    #[test]
    fn save_and_load_roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.set_fixed_coordinates(Some(Coordinates::new(1.5, -2.25)));
        cfg.permissions.coarse = PermissionState::Granted;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"K\"\n[location]\nip_lookup = false\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("K"));
        assert!(!loaded.location.ip_lookup);
        assert_eq!(loaded.location.timeout_secs, 30);
        assert_eq!(loaded.units, "metric");
    }
}
