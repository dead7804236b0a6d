//! Chromium session: launch with recovery, login and rendered fetches.

#[cfg(feature = "browser")]
pub use chromium::BrowserSession;
#[cfg(not(feature = "browser"))]
pub use stub::BrowserSession;

#[cfg(feature = "browser")]
mod chromium {
    use std::future::Future;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::page::ScreenshotParams;
    use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
    use chrono::Utc;
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::super::process::{kill_lingering_browsers, reset_profile};
    use super::super::scroll::{ScrollPolicy, ScrollTracker};
    use super::super::{BrowserConfig, BrowserError, PageRenderer, CARD_SELECTOR, SERVER_FLAGS};
    use crate::config::Credentials;

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    const LOGGED_IN_PHRASE: &str = "Du er allerede logget ind";

    /// Clicks the first visible consent button. Evaluates to whether one was found.
    const CLICK_CONSENT: &str = r#"(() => {
        const b = [...document.querySelectorAll('button, [role=button], a.button')]
            .find(e => e.offsetParent !== null && /ACCEPTER|ACCEPT/i.test(e.innerText || ''));
        if (!b) return false;
        b.click();
        return true;
    })()"#;

    const CONSENT_VISIBLE: &str = r#"[...document.querySelectorAll('button, [role=button], a.button')]
        .some(e => e.offsetParent !== null && /ACCEPTER|ACCEPT/i.test(e.innerText || ''))"#;

    const LOGGED_IN: &str = r#"(() => {
        const visible = [...document.querySelectorAll('a, button')].some(e =>
            e.offsetParent !== null &&
            (/log\s*ud|logout|log\s*out/i.test(e.innerText || '') || /logout|log-ud/i.test(e.getAttribute('href') || '')));
        return visible || document.documentElement.outerHTML.includes('PHRASE');
    })()"#;

    const FIRST_IFRAME_SRC: &str =
        r#"(() => { const f = document.querySelector('iframe[src]'); return f ? f.src : ''; })()"#;

    const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

    fn find_chrome(configured: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = configured {
            return Some(path.to_path_buf());
        }
        CHROME_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    /// A running Chromium bound to a persistent profile directory.
    pub struct BrowserSession {
        config: BrowserConfig,
        profile_dir: PathBuf,
        // Kept alive for the lifetime of the page.
        _browser: Browser,
        handler: JoinHandle<()>,
        page: Page,
    }

    impl BrowserSession {
        /// Launch Chromium, recovering from stale processes and profiles.
        ///
        /// After a failed launch every lingering browser process is killed,
        /// the profile is recreated and the launch retried, up to
        /// `config.start_retries` more times.
        pub async fn acquire(
            config: &BrowserConfig,
            profile_dir: &Path,
            headless: bool,
        ) -> Result<Self, BrowserError> {
            let attempts = config.start_retries + 1;
            let mut last_error = String::new();

            for attempt in 1..=attempts {
                if let Err(e) = tokio::fs::create_dir_all(profile_dir).await {
                    last_error = e.to_string();
                } else {
                    match Self::launch(config, profile_dir, headless).await {
                        Ok(session) => {
                            info!(
                                "Browser started (headless={}, attempt {})",
                                headless, attempt
                            );
                            return Ok(session);
                        }
                        Err(e) => last_error = e,
                    }
                }

                warn!(
                    "Browser start attempt {}/{} failed: {}",
                    attempt, attempts, last_error
                );
                if attempt < attempts {
                    kill_lingering_browsers();
                    tokio::time::sleep(Duration::from_millis(2500)).await;
                    if let Err(e) = reset_profile(profile_dir).await {
                        warn!("Profile reset failed: {}", e);
                    }
                }
            }

            Err(BrowserError::StartFailed {
                attempts,
                message: last_error,
            })
        }

        async fn launch(
            config: &BrowserConfig,
            profile_dir: &Path,
            headless: bool,
        ) -> Result<Self, String> {
            let chrome = find_chrome(config.chrome_path.as_deref())
                .ok_or_else(|| "Chrome/Chromium not found; set CHROME_PATH".to_string())?;

            let mut builder = ChromeConfig::builder()
                .chrome_executable(chrome)
                .user_data_dir(profile_dir)
                .request_timeout(config.navigation_timeout());
            if !headless {
                builder = builder.with_head();
            }
            for flag in SERVER_FLAGS {
                builder = builder.arg(flag);
            }
            for arg in &config.chrome_args {
                builder = builder.arg(arg);
            }
            let chrome_config = builder.build()?;

            let (browser, mut handler) = Browser::launch(chrome_config)
                .await
                .map_err(|e| e.to_string())?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    handler.abort();
                    return Err(format!("session not created: {}", e));
                }
            };

            Ok(Self {
                config: config.clone(),
                profile_dir: profile_dir.to_path_buf(),
                _browser: browser,
                handler,
                page,
            })
        }

        async fn eval_bool(&self, script: &str) -> bool {
            match self.page.evaluate(script.to_string()).await {
                Ok(result) => result.into_value::<bool>().unwrap_or(false),
                Err(e) => {
                    debug!("Script evaluation failed: {}", e);
                    false
                }
            }
        }

        async fn eval_string(&self, script: &str) -> Option<String> {
            let result = self.page.evaluate(script.to_string()).await.ok()?;
            result
                .into_value::<String>()
                .ok()
                .filter(|s| !s.is_empty())
        }

        async fn count(&self, selector: &str) -> usize {
            let script = format!(
                "document.querySelectorAll({}).length",
                serde_json::Value::String(selector.to_string())
            );
            match self.page.evaluate(script).await {
                Ok(result) => result.into_value::<usize>().unwrap_or(0),
                Err(_) => 0,
            }
        }

        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            debug!("Navigating to {}", url);
            let timeout = self.config.navigation_timeout();
            match tokio::time::timeout(timeout, self.page.goto(url)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(BrowserError::Timeout(format!("navigation to {}", url))),
            }
        }

        async fn wait_for_selector(&self, selector: &str) -> Result<(), BrowserError> {
            let deadline = tokio::time::Instant::now() + self.config.selector_timeout();
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(BrowserError::Timeout(format!("selector {}", selector)));
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        }

        async fn wait_until(&self, script: &str, expected: bool) -> bool {
            let deadline = tokio::time::Instant::now() + self.config.selector_timeout();
            while tokio::time::Instant::now() < deadline {
                if self.eval_bool(script).await == expected {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            false
        }

        async fn scroll(&self, policy: ScrollPolicy) {
            let mut tracker = ScrollTracker::new(policy);
            if tracker.start(self.count(CARD_SELECTOR).await).is_some() {
                return;
            }
            loop {
                if let Err(e) = self.page.evaluate(SCROLL_TO_BOTTOM.to_string()).await {
                    debug!("Scroll failed: {}", e);
                    return;
                }
                tokio::time::sleep(self.config.scroll_pause()).await;
                if let Some(reason) = tracker.observe(self.count(CARD_SELECTOR).await) {
                    debug!("Stopped scrolling after {} ({:?})", tracker.scrolls(), reason);
                    return;
                }
            }
        }

        async fn render_once(
            &self,
            url: &str,
            wait_for: &str,
            scroll: ScrollPolicy,
        ) -> Result<String, BrowserError> {
            self.navigate(url).await?;
            self.wait_for_selector(wait_for).await?;
            self.scroll(scroll).await;
            Ok(self.page.content().await?)
        }

        /// Save a full-page screenshot under `<profile>/screenshots`.
        async fn screenshot(&self, phase: &str) {
            let dir = self.profile_dir.join("screenshots");
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                debug!("No screenshot dir: {}", e);
                return;
            }
            let path = dir.join(format!("{}-{}.png", Utc::now().format("%Y%m%dT%H%M%S"), phase));
            let params = ScreenshotParams::builder().full_page(true).build();
            match self.page.save_screenshot(params, &path).await {
                Ok(_) => debug!("Screenshot {}", path.display()),
                Err(e) => debug!("Screenshot {} failed: {}", phase, e),
            }
        }

        async fn accept_consent(&self, login_url: &str) -> bool {
            if !self.eval_bool(CLICK_CONSENT).await {
                return true;
            }
            debug!("Accepted cookie consent");
            if !self.wait_until(CONSENT_VISIBLE, false).await {
                return false;
            }
            let current = self.page.url().await.ok().flatten().unwrap_or_default();
            if current.trim_end_matches('/') != login_url.trim_end_matches('/') {
                debug!("Consent navigated to {}, reloading login", current);
                return self.navigate(login_url).await.is_ok();
            }
            true
        }

        async fn is_logged_in(&self) -> bool {
            self.eval_bool(&LOGGED_IN.replace("PHRASE", LOGGED_IN_PHRASE))
                .await
        }

        async fn fill(&self, id: &str, value: &str) -> Result<(), BrowserError> {
            let element = self.page.find_element(format!("#{}", id)).await?;
            element.click().await?;
            element.type_str(value).await?;
            Ok(())
        }

        async fn submit_login(
            &self,
            credentials: &Credentials,
        ) -> Result<(), BrowserError> {
            let Some(src) = self.eval_string(FIRST_IFRAME_SRC).await else {
                return Err(BrowserError::Page("login iframe not found".into()));
            };
            self.navigate(&src).await?;
            let fields = &self.config.login_fields;
            self.wait_for_selector(&format!("#{}", fields.email)).await?;
            self.fill(&fields.email, &credentials.email).await?;
            self.fill(&fields.password, &credentials.password).await?;
            self.screenshot("filled").await;
            self.page.find_element("[type=submit]").await?.click().await?;
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }

        /// Make sure the profile holds a logged-in session.
        pub async fn ensure_logged_in(
            &self,
            login_url: &str,
            credentials: &Credentials,
        ) -> Result<(), BrowserError> {
            self.navigate(login_url).await?;
            self.screenshot("login-page").await;

            let mut consent_ok = self.accept_consent(login_url).await;
            if !consent_ok {
                warn!("Cookie consent did not clear, reloading");
                self.navigate(login_url).await?;
                consent_ok = self.accept_consent(login_url).await;
            }
            if !consent_ok {
                self.screenshot("consent-failed").await;
                return Err(BrowserError::AuthFailed("cookie consent did not clear".into()));
            }

            if self.is_logged_in().await {
                info!("Already logged in");
                return Ok(());
            }

            let mut submitted = self.submit_login(credentials).await;
            if let Err(e) = &submitted {
                warn!("Login form failed ({}), retrying once", e);
                self.navigate(login_url).await?;
                submitted = self.submit_login(credentials).await;
            }
            if let Err(e) = submitted {
                self.screenshot("form-failed").await;
                return Err(BrowserError::AuthFailed(e.to_string()));
            }

            self.navigate(login_url).await?;
            if self.wait_until(&LOGGED_IN.replace("PHRASE", LOGGED_IN_PHRASE), true).await {
                self.screenshot("logged-in").await;
                info!("Logged in as {}", credentials.email);
                Ok(())
            } else {
                self.screenshot("not-logged-in").await;
                Err(BrowserError::AuthFailed(
                    "logged-in marker not found after submit".into(),
                ))
            }
        }

        pub async fn close(self) {
            let _ = self.page.close().await;
            self.handler.abort();
        }
    }

    async fn retry_once<T, F, Fut>(what: &str, mut op: F) -> Result<T, BrowserError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrowserError>>,
    {
        match op().await {
            Err(e) if e.is_transient() => {
                warn!("{} failed ({}), retrying once", what, e);
                op().await
            }
            other => other,
        }
    }

    #[async_trait]
    impl PageRenderer for BrowserSession {
        async fn fetch_rendered(
            &self,
            url: &str,
            wait_for: &str,
            scroll: ScrollPolicy,
        ) -> Result<String, BrowserError> {
            retry_once(url, || self.render_once(url, wait_for, scroll)).await
        }
    }
}

#[cfg(not(feature = "browser"))]
mod stub {
    use std::path::Path;

    use async_trait::async_trait;

    use super::super::{BrowserConfig, BrowserError, PageRenderer, ScrollPolicy};
    use crate::config::Credentials;

    pub struct BrowserSession;

    impl BrowserSession {
        pub async fn acquire(
            _config: &BrowserConfig,
            _profile_dir: &Path,
            _headless: bool,
        ) -> Result<Self, BrowserError> {
            Err(BrowserError::Disabled)
        }

        pub async fn ensure_logged_in(
            &self,
            _login_url: &str,
            _credentials: &Credentials,
        ) -> Result<(), BrowserError> {
            Err(BrowserError::Disabled)
        }

        pub async fn close(self) {}
    }

    #[async_trait]
    impl PageRenderer for BrowserSession {
        async fn fetch_rendered(
            &self,
            _url: &str,
            _wait_for: &str,
            _scroll: ScrollPolicy,
        ) -> Result<String, BrowserError> {
            Err(BrowserError::Disabled)
        }
    }
}
