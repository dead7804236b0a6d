//! Rendered page fetching through a logged-in Chromium session.
//!
//! The pipelines only see the [`PageRenderer`] capability. The Chromium
//! implementation lives behind the `browser` feature; without it
//! [`BrowserSession::acquire`] fails with [`BrowserError::Disabled`].

mod process;
mod scroll;
mod session;

pub use process::{kill_lingering_browsers, reset_profile};
pub use scroll::{ScrollPolicy, ScrollTracker, StopReason};
pub use session::BrowserSession;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Elements counted while scrolling to exhaust lazy loading.
pub const CARD_SELECTOR: &str = "article[data-element-guid]";

/// Flags required to run Chromium on headless servers.
pub const SERVER_FLAGS: [&str; 3] = ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"];

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser failed to start after {attempts} attempts: {message}")]
    StartFailed { attempts: u32, message: String },

    #[error("login failed: {0}")]
    AuthFailed(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("page operation failed: {0}")]
    Page(String),

    #[error("browser support not compiled in (enable the `browser` feature)")]
    Disabled,
}

impl BrowserError {
    /// Errors worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Timeout(_) | Self::Page(_)
        )
    }
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        Self::Page(e.to_string())
    }
}

/// Element ids of the login form inside the login iframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFields {
    #[serde(default = "default_email_field")]
    pub email: String,
    #[serde(default = "default_password_field")]
    pub password: String,
}

impl Default for LoginFields {
    fn default() -> Self {
        Self {
            email: default_email_field(),
            password: default_password_field(),
        }
    }
}

fn default_email_field() -> String {
    "email".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

/// Browser settings (`[browser]` in the config file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a window (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome executable; searched in common locations when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// User profile directory; defaults to `<data_dir>/browser-profile`.
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    #[serde(default = "default_selector_timeout")]
    pub selector_timeout_secs: u64,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Pause after each scroll to the bottom.
    #[serde(default = "default_scroll_pause")]
    pub scroll_pause_ms: u64,

    /// Extra launch attempts after the first one.
    #[serde(default = "default_start_retries")]
    pub start_retries: u32,

    #[serde(default)]
    pub login_fields: LoginFields,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            profile_dir: None,
            selector_timeout_secs: default_selector_timeout(),
            navigation_timeout_secs: default_navigation_timeout(),
            scroll_pause_ms: default_scroll_pause(),
            start_retries: default_start_retries(),
            login_fields: LoginFields::default(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

fn default_headless() -> bool {
    true
}

fn default_selector_timeout() -> u64 {
    10
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_scroll_pause() -> u64 {
    1500
}

fn default_start_retries() -> u32 {
    2
}

/// Anything that can hand back post-JavaScript HTML for a URL.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url`, wait for `wait_for` to appear, apply the scroll
    /// policy and return the page HTML.
    async fn fetch_rendered(
        &self,
        url: &str,
        wait_for: &str,
        scroll: ScrollPolicy,
    ) -> Result<String, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config: BrowserConfig = toml::from_str("").unwrap();
        assert!(config.headless);
        assert_eq!(config.selector_timeout(), Duration::from_secs(10));
        assert_eq!(config.start_retries, 2);
        assert_eq!(config.login_fields.email, "email");
    }

    #[test]
    fn test_transient_classification() {
        assert!(BrowserError::Timeout("selector".into()).is_transient());
        assert!(!BrowserError::AuthFailed("no marker".into()).is_transient());
        assert!(!BrowserError::Disabled.is_transient());
    }
}
