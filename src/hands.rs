use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dom;
use crate::error::ActuationError;
use crate::types::Action;

/// Capability to drive the live browser.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    async fn navigate(&self, address: &str) -> Result<(), ActuationError>;

    async fn current_address(&self) -> Result<String, ActuationError>;

    /// Returns whether a text field was found.
    async fn type_into_first_text_field(&self, value: &str) -> Result<bool, ActuationError>;

    /// Returns whether a matching button was clicked.
    async fn click_button_containing(&self, needle: &str) -> Result<bool, ActuationError>;

    /// Wait for the page to report it finished loading. `Ok(false)` means no
    /// readiness signal arrived within `timeout`.
    async fn wait_until_ready(&self, _timeout: Duration) -> Result<bool, ActuationError> {
        Ok(false)
    }

    /// Opaque identity of the document currently shown, if the browser can
    /// tell documents apart.
    async fn page_marker(&self) -> Result<Option<String>, ActuationError> {
        Ok(None)
    }

    /// Wait until a document other than `previous` is showing. `Ok(false)`
    /// means the page did not change within `timeout`.
    async fn wait_for_new_page(
        &self,
        _previous: &str,
        _timeout: Duration,
    ) -> Result<bool, ActuationError> {
        Ok(false)
    }
}

/// Where to find or how to start Chrome.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub debug_url: String,
    pub executable: Option<PathBuf>,
    pub profile_dir: PathBuf,
    pub headless: bool,
}

/// Persistent browser session. Created once, reused for all sessions.
pub struct ChromeBrowser {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeBrowser {
    pub fn launch(options: &ChromeOptions) -> anyhow::Result<Self> {
        // 1. Attach to a Chrome started with --remote-debugging-port
        info!("Attempting to attach to existing Chrome at {}", options.debug_url);
        if let Ok(browser) = Browser::connect(options.debug_url.clone()) {
            info!("Attached to existing Chrome");
            let existing = {
                let tabs = browser.get_tabs();
                let tabs = tabs
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Chrome tab list lock poisoned"))?;
                tabs.first().cloned()
            };
            let tab = match existing {
                Some(tab) => tab,
                None => browser.new_tab()?,
            };
            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        // 2. Launch our own instance with a dedicated profile
        info!("Could not attach. Launching Chrome with profile {:?}", options.profile_dir);
        std::fs::create_dir_all(&options.profile_dir)?;

        let launch = LaunchOptions {
            headless: options.headless,
            path: options.executable.clone(),
            user_data_dir: Some(options.profile_dir.clone()),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        let browser = Browser::new(launch)
            .map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking DevTools call off the async runtime.
    async fn on_tab<T, F>(&self, f: F) -> Result<T, ActuationError>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Tab>) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| ActuationError::Unavailable(format!("browser task panicked: {}", e)))?
            .map_err(|e| ActuationError::Unavailable(format!("{:#}", e)))
    }
}

#[async_trait]
impl BrowserControl for ChromeBrowser {
    async fn navigate(&self, address: &str) -> Result<(), ActuationError> {
        let address = address.to_string();
        self.on_tab(move |tab| {
            tab.navigate_to(&address)?;
            if let Err(e) = tab.wait_until_navigated() {
                warn!("Navigation to {} did not settle: {}", address, e);
            }
            Ok(())
        })
        .await
    }

    async fn current_address(&self) -> Result<String, ActuationError> {
        self.on_tab(dom::get_current_url).await
    }

    async fn type_into_first_text_field(&self, value: &str) -> Result<bool, ActuationError> {
        let value = value.to_string();
        self.on_tab(move |tab| dom::type_into_first_text_field(tab, &value))
            .await
    }

    async fn click_button_containing(&self, needle: &str) -> Result<bool, ActuationError> {
        let needle = needle.to_string();
        self.on_tab(move |tab| dom::click_button_containing(tab, &needle))
            .await
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<bool, ActuationError> {
        self.on_tab(move |tab| dom::wait_until_complete(tab, timeout))
            .await
    }

    async fn page_marker(&self) -> Result<Option<String>, ActuationError> {
        self.on_tab(|tab| dom::page_marker(tab).map(Some)).await
    }

    async fn wait_for_new_page(
        &self,
        previous: &str,
        timeout: Duration,
    ) -> Result<bool, ActuationError> {
        let previous = previous.to_string();
        self.on_tab(move |tab| dom::wait_for_new_page(tab, &previous, timeout))
            .await
    }
}

/// Executes interpreted actions against the browser.
#[derive(Clone)]
pub struct BrowserActuator {
    browser: Arc<dyn BrowserControl>,
    search_button: String,
    strict_clicks: bool,
}

impl BrowserActuator {
    /// `search_button` is clicked after typing a query. With `strict_clicks`
    /// a click that matches no button is an error instead of a no-op.
    pub fn new(
        browser: Arc<dyn BrowserControl>,
        search_button: impl Into<String>,
        strict_clicks: bool,
    ) -> Self {
        Self {
            browser,
            search_button: search_button.into(),
            strict_clicks,
        }
    }

    pub async fn navigate(&self, address: &str) -> Result<(), ActuationError> {
        info!("Navigating to {}", address);
        self.browser.navigate(address).await
    }

    pub async fn current_address(&self) -> Result<String, ActuationError> {
        self.browser.current_address().await
    }

    pub async fn actuate(&self, action: &Action) -> Result<(), ActuationError> {
        match action {
            Action::TypeInSearch(query) => {
                let query = query.trim();
                if !self.browser.type_into_first_text_field(query).await? {
                    warn!("No text field to type '{}' into", query);
                }
                self.click(&self.search_button).await?;
                info!("Typed '{}' in the search box and pressed {}", query, self.search_button);
                Ok(())
            }
            Action::ClickButton(name) => self.click(name).await,
            Action::Stop | Action::Unrecognized => {
                Err(ActuationError::NotActuatable(format!("{:?}", action)))
            }
        }
    }

    async fn click(&self, name: &str) -> Result<(), ActuationError> {
        if self.browser.click_button_containing(name).await? {
            debug!("Clicked the '{}' button", name);
            return Ok(());
        }
        if self.strict_clicks {
            return Err(ActuationError::NoMatchingButton(name.to_string()));
        }
        warn!("No button matching '{}'; nothing clicked", name);
        Ok(())
    }

    /// Identity of the page before an action, so `settle` can tell when the
    /// action replaced it. Failures just disable that check.
    pub async fn page_marker(&self) -> Option<String> {
        match self.browser.page_marker().await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Could not read the page marker: {}", e);
                None
            }
        }
    }

    /// Wait for the page to finish updating.
    ///
    /// With a `before` marker, an action that navigates is followed until the
    /// new document appears (watching for at most `fallback`) and then until it
    /// reports ready. Without one, the current page's readiness signal is used
    /// and `fallback` is only slept when no signal arrives within
    /// `ready_timeout`.
    pub async fn settle(&self, before: Option<&str>, ready_timeout: Duration, fallback: Duration) {
        if let Some(before) = before {
            match self.browser.wait_for_new_page(before, fallback).await {
                Ok(true) => debug!("A new page replaced the one acted on"),
                Ok(false) => {
                    debug!("Page unchanged after {:?}", fallback);
                    return;
                }
                Err(e) => {
                    warn!("Page change check failed: {}", e);
                    tokio::time::sleep(fallback).await;
                    return;
                }
            }
        }

        match self.browser.wait_until_ready(ready_timeout).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(fallback).await,
            Err(e) => {
                warn!("Readiness check failed: {}", e);
                tokio::time::sleep(fallback).await;
            }
        }
    }
}
