//! Configuration management.
//!
//! Settings are resolved from built-in defaults, then an optional config
//! file (TOML, YAML or JSON by extension), then environment variables.
//! CLI flags are applied on top by the command layer.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::Language;
use crate::repository::{Database, DbError};
use crate::scrapers::browser::BrowserConfig;
use crate::services::assets::AssetConfig;
use crate::services::translation::TranslatorConfig;

/// Config file looked up in the working directory and the data directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "sermitsiaq.toml";

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "sermitsiaq.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Upstream site addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_da_base_url")]
    pub da_base_url: String,
    #[serde(default = "default_kl_base_url")]
    pub kl_base_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

fn default_da_base_url() -> String {
    "https://www.sermitsiaq.ag".to_string()
}
fn default_kl_base_url() -> String {
    "https://kl.sermitsiaq.ag".to_string()
}
fn default_login_url() -> String {
    "https://www.sermitsiaq.ag/login".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            da_base_url: default_da_base_url(),
            kl_base_url: default_kl_base_url(),
            login_url: default_login_url(),
        }
    }
}

impl SiteConfig {
    /// Base URL of the host serving `language`. EN is served from the DA host.
    pub fn base_url(&self, language: Language) -> &str {
        match language {
            Language::Kl => &self.kl_base_url,
            Language::Da | Language::En => &self.da_base_url,
        }
    }
}

/// The on-disk config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Database URL; same forms as `DATABASE_URL`.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    #[serde(default)]
    pub controlled_origin: Option<String>,
    #[serde(default)]
    pub sites: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub assets: AssetConfig,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parsed = match ext {
            "json" => serde_json::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => toml::from_str(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Find a config file: the explicit path, else the working directory,
    /// else the default data directory.
    pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let candidates = [
            PathBuf::from(DEFAULT_CONFIG_FILENAME),
            default_data_dir().join(DEFAULT_CONFIG_FILENAME),
        ];
        candidates.into_iter().find(|p| p.exists())
    }

    /// Base directory for relative paths in this file.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }
}

/// Login credential pair of the ingestion identity.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sermitsiaq")
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Explicit database URL; otherwise a file in `data_dir`.
    pub database_url: Option<String>,
    /// Flat directory of downloaded images.
    pub uploads_dir: PathBuf,
    /// Origin serving `/static/uploads/images/`.
    pub controlled_origin: String,
    pub sites: SiteConfig,
    pub browser: BrowserConfig,
    pub translator: TranslatorConfig,
    pub assets: AssetConfig,
    pub credentials: Option<Credentials>,
    pub secret_key: Option<String>,
    pub environment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            uploads_dir: data_dir.join("static").join("uploads").join("images"),
            data_dir,
            database_url: None,
            controlled_origin: "https://www.sermitsiaq.com".to_string(),
            sites: SiteConfig::default(),
            browser: BrowserConfig::default(),
            translator: TranslatorConfig::default(),
            assets: AssetConfig::default(),
            credentials: None,
            secret_key: None,
            environment: "development".to_string(),
        }
    }

    /// Defaults, then `config_path` (or a discovered file), then env.
    pub async fn load(
        config_path: Option<&Path>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let config = match Config::discover(config_path) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Some(Config::load_from_path(&path).await?)
            }
            None => None,
        };

        let mut settings = Self::default();
        if let Some(config) = config {
            settings.apply_config(config);
        }
        settings.apply_env_from(|key| std::env::var(key).ok())?;
        if let Some(dir) = data_dir {
            settings.set_data_dir(dir);
        }
        Ok(settings)
    }

    fn set_data_dir(&mut self, dir: PathBuf) {
        let default_uploads = self.data_dir.join("static").join("uploads").join("images");
        if self.uploads_dir == default_uploads {
            self.uploads_dir = dir.join("static").join("uploads").join("images");
        }
        self.data_dir = dir;
    }

    /// Merge a config file over the current values.
    pub fn apply_config(&mut self, config: Config) {
        let base = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        if let Some(dir) = config.data_dir {
            self.set_data_dir(resolve(dir));
        }
        if let Some(dir) = config.uploads_dir {
            self.uploads_dir = resolve(dir);
        }
        if config.database.is_some() {
            self.database_url = config.database;
        }
        if let Some(origin) = config.controlled_origin {
            self.controlled_origin = origin;
        }
        self.sites = config.sites;
        self.browser = config.browser;
        self.translator = config.translator;
        self.assets = config.assets;
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(key) = lookup("SECRET_KEY") {
            self.secret_key = Some(key);
        }
        if let Some(env) = lookup("ENVIRONMENT").or_else(|| lookup("FLASK_ENV")) {
            self.environment = env;
        }
        if let Some(origin) = lookup("CONTROLLED_ORIGIN") {
            self.controlled_origin = origin;
        }
        if let Some(dir) = lookup("UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(backend) = lookup("TRANSLATOR") {
            self.translator.backend =
                backend
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "TRANSLATOR".to_string(),
                        value: backend.clone(),
                    })?;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.translator.ollama_endpoint = url;
        }
        if let (Some(email), Some(password)) =
            (lookup("SERMITSIAQ_EMAIL"), lookup("SERMITSIAQ_PASSWORD"))
        {
            self.credentials = Some(Credentials { email, password });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Database URL, constructed from the data directory when not set.
    pub fn database_url(&self) -> String {
        match self.database_url {
            Some(ref url) => url.clone(),
            None => format!(
                "sqlite:{}",
                self.data_dir.join(DEFAULT_DATABASE_FILENAME).display()
            ),
        }
    }

    /// Profile directory of the automated browser.
    pub fn profile_dir(&self) -> PathBuf {
        self.browser
            .profile_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("browser-profile"))
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.uploads_dir)?;
        Ok(())
    }

    /// Open the database and make sure the schema exists.
    pub async fn open_database(&self) -> Result<Database, DbError> {
        let db = Database::open(&self.database_url()).await?;
        db.init_schema().await?;
        Ok(db)
    }
}
