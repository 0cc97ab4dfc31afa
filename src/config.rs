use crate::error::{DashboardError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Prefix for environment overrides, e.g. `DASHBOARD__DASHBOARD__TOP_N=20`.
pub const ENV_PREFIX: &str = "DASHBOARD";

/// Knobs of the aggregation and ranking pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Rows per ranked chart (and per exported ranking sheet).
    pub top_n: usize,
    /// Rows per ranked table.
    pub table_capacity: usize,
    /// Quantity percentile at or above which an item is high volume.
    pub qty_percentile: f64,
    /// Profit percentile at or below which an item is low profit.
    pub profit_percentile: f64,
    /// How many leading items the "share of total" insight covers.
    pub share_leaders: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            table_capacity: 100,
            qty_percentile: 0.75,
            profit_percentile: 0.25,
            share_leaders: 5,
        }
    }
}

impl DashboardConfig {
    /// Check the pipeline settings.
    ///
    /// # Returns
    /// * `Result<()>` - A config error when a count is zero or a percentile
    ///   lies outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(DashboardError::Config("top_n must be greater than zero".into()));
        }
        if self.table_capacity == 0 {
            return Err(DashboardError::Config(
                "table_capacity must be greater than zero".into(),
            ));
        }
        if self.share_leaders == 0 {
            return Err(DashboardError::Config(
                "share_leaders must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("qty_percentile", self.qty_percentile),
            ("profit_percentile", self.profit_percentile),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DashboardError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Where the transaction table comes from.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Source file (CSV or Excel). Optional for the web server, which
    /// also accepts uploads.
    pub path: Option<PathBuf>,
    /// Worksheet to read from Excel files; the first sheet when unset.
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted upload, in megabytes.
    pub upload_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            upload_limit_mb: 25,
        }
    }
}

/// Fixed credentials for the dashboard login.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub session_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
            session_hours: 24,
        }
    }
}

impl AuthConfig {
    pub fn uses_default_credentials(&self) -> bool {
        *self == AuthConfig {
            session_hours: self.session_hours,
            ..AuthConfig::default()
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub dashboard: DashboardConfig,
    pub data: DataConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

/// Loads the application configuration.
///
/// Sources, lowest priority first: built-in defaults, the TOML file (an
/// explicit `path` must exist; otherwise `dashboard.toml` is used when
/// present), then `DASHBOARD__SECTION__KEY` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();

    builder = match path {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = settings.try_deserialize()?;
    app.dashboard.validate()?;
    log::debug!("Loaded configuration: {:?}", app.dashboard);
    Ok(app)
}
