//! Configuration management for harvester.
//!
//! [`Settings`] holds the resolved runtime values. [`Config`] is the optional
//! file layer (TOML, YAML or JSON) whose present fields override the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::City;
use crate::error::{HarvestError, Result};
use crate::extract::DEFAULT_SCRIPT_TAG;
use crate::scrapers::run::{DEFAULT_MAX_RETRIES, DEFAULT_WORKERS, DEFAULT_ZOOM};
use crate::scrapers::{CrawlConfig, DetailRequestBuilder, RateLimitConfig, DEFAULT_DETAIL_URL_TEMPLATE};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "listings.db";

/// Environment variable carrying the public detail API key.
pub const API_KEY_ENV: &str = "AIRBNB_PUBLIC_API_KEY";

/// File stems searched for when no `--config` is given.
const CONFIG_FILE_NAMES: &[&str] = &[
    "harvester.toml",
    "harvester.yaml",
    "harvester.yml",
    "harvester.json",
];

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename, relative to `data_dir` unless absolute.
    pub database_filename: String,
    /// User agent: None for the default, "impersonate" or a literal string.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Minimum delay between requests to one host, in milliseconds.
    pub request_delay_ms: u64,
    /// Requests allowed in flight per host.
    pub max_in_flight: usize,
    pub city: City,
    /// Number of grid cells; None uses the city's default.
    pub grid_size: Option<usize>,
    pub zoom: f64,
    /// Id of the script tag carrying the search state.
    pub script_tag: String,
    pub detail_url_template: String,
    pub api_key: Option<String>,
    pub workers: usize,
    pub max_retries: u32,
    /// Base retry pause in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/.local/share/harvester (or platform equivalent)
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("harvester");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 20,
            max_in_flight: 1,
            city: City::default(),
            grid_size: None,
            zoom: DEFAULT_ZOOM,
            script_tag: DEFAULT_SCRIPT_TAG.to_string(),
            detail_url_template: DEFAULT_DETAIL_URL_TEMPLATE.to_string(),
            api_key: None,
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 500,
        }
    }
}

impl Settings {
    /// Full path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
            .unwrap_or_else(|| self.city.default_grid_size())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let delay = Duration::from_millis(self.request_delay_ms);
        RateLimitConfig {
            max_in_flight: self.max_in_flight.max(1),
            base_delay: delay,
            min_delay: delay,
            ..Default::default()
        }
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            zoom: self.zoom,
            script_tag: self.script_tag.clone(),
            workers: self.workers.max(1),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Detail requests need the public API key; without one every fetch fails.
    pub fn detail_request_builder(&self) -> Result<DetailRequestBuilder> {
        let api_key = self.api_key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
            HarvestError::Config(format!(
                "no detail API key; set {} or api_key in the config file",
                API_KEY_ENV
            ))
        })?;
        DetailRequestBuilder::new(self.detail_url_template.clone(), Some(api_key))
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_url_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// The format is picked by extension; anything unknown is read as JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            HarvestError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| HarvestError::Config(format!("failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| HarvestError::Config(format!("failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| HarvestError::Config(format!("failed to parse JSON config: {}", e))),
        }
    }

    /// Find a config file in `dir`, then in the user config directory.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        let user_dir = dirs::config_dir().map(|d| d.join("harvester"));
        std::iter::once(dir.to_path_buf())
            .chain(user_dir)
            .flat_map(|d| CONFIG_FILE_NAMES.iter().map(move |name| d.join(name)))
            .find(|p| p.is_file())
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply present fields to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = shellexpand::tilde(database).into_owned();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(n) = self.max_in_flight {
            settings.max_in_flight = n;
        }
        if let Some(city) = self.city {
            settings.city = city;
        }
        if let Some(n) = self.grid_size {
            settings.grid_size = Some(n);
        }
        if let Some(zoom) = self.zoom {
            settings.zoom = zoom;
        }
        if let Some(ref tag) = self.script_tag {
            settings.script_tag = tag.clone();
        }
        if let Some(ref template) = self.detail_url_template {
            settings.detail_url_template = template.clone();
        }
        if let Some(ref key) = self.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(n) = self.workers {
            settings.workers = n;
        }
        if let Some(n) = self.max_retries {
            settings.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            settings.retry_delay_ms = ms;
        }
    }
}

/// Options for loading settings (from CLI flags).
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; when set, failing to load it is an error.
    pub config_path: Option<PathBuf>,
    /// Database path override.
    pub database: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Precedence: defaults < config file < environment < CLI flags.
pub async fn load_settings(options: &LoadOptions) -> Result<(Settings, Config)> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match &options.config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => match Config::discover(&cwd) {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                Config::load_from_path(&path).await?
            }
            None => Config::default(),
        },
    };

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using API key from {}", API_KEY_ENV);
        settings.api_key = Some(key);
    }

    if let Some(ref database) = options.database {
        let path = config.resolve_path(&database.to_string_lossy(), &cwd);
        settings.database_filename = path.to_string_lossy().into_owned();
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_formats() {
        let toml = Config::parse("workers = 8\ncity = \"vancouver\"\nzoom = 14.0\n", "toml").unwrap();
        assert_eq!(toml.workers, Some(8));
        assert_eq!(toml.city, Some(City::Vancouver));
        assert_eq!(toml.zoom, Some(14.0));

        let yaml = Config::parse("grid_size: 25\nmax_retries: 1\n", "yml").unwrap();
        assert_eq!(yaml.grid_size, Some(25));
        assert_eq!(yaml.max_retries, Some(1));

        let json = Config::parse(r#"{"script_tag": "data-state"}"#, "json").unwrap();
        assert_eq!(json.script_tag.as_deref(), Some("data-state"));

        assert!(Config::parse("workers = [", "toml").is_err());
    }

    #[test]
    fn test_apply_to_settings() {
        let config = Config {
            data_dir: Some("data".into()),
            request_delay_ms: Some(250),
            max_in_flight: Some(2),
            grid_size: Some(9),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/srv/harvest"));

        assert_eq!(settings.data_dir, PathBuf::from("/srv/harvest/data"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/srv/harvest/data/listings.db")
        );
        assert_eq!(settings.grid_size(), 9);
        let limits = settings.rate_limit_config();
        assert_eq!(limits.max_in_flight, 2);
        assert_eq!(limits.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.grid_size(), 100);
        assert_eq!(settings.rate_limit_config().max_in_flight, 1);
        assert_eq!(
            settings.rate_limit_config().base_delay,
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_detail_requests_require_api_key() {
        let mut settings = Settings::default();
        settings.api_key = None;
        assert!(matches!(
            settings.detail_request_builder(),
            Err(HarvestError::Config(_))
        ));

        settings.api_key = Some(String::new());
        assert!(settings.detail_request_builder().is_err());

        settings.api_key = Some("abc".into());
        let request = settings.detail_request_builder().unwrap().build("1");
        assert!(request
            .headers
            .contains(&("X-Airbnb-Api-Key".to_string(), "abc".to_string())));
    }

    #[test]
    fn test_absolute_database_overrides_data_dir() {
        let mut settings = Settings::default();
        settings.database_filename = "/tmp/other.db".into();
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/other.db"));
    }

    #[tokio::test]
    async fn test_load_from_path_and_discover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("harvester.yaml");
        std::fs::write(&path, "workers: 3\n").unwrap();

        assert_eq!(Config::discover(dir.path()), Some(path.clone()));
        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_explicit_missing_config_is_error() {
        let options = LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/harvester.toml")),
            database: None,
        };
        assert!(matches!(
            load_settings(&options).await,
            Err(HarvestError::Config(_))
        ));
    }
}
