//! Chromium driven through [`playwright-rs`](https://github.com/padamson/playwright-rust).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use playwright_rs::api::LaunchOptions;
use playwright_rs::protocol::{Browser, Page, Playwright};
use serde_json::Value;
use tracing::debug;

use super::{decode_json, json_wrapped, BrowserHost, BrowserPage};

/// Owns the Playwright driver process and one Chromium instance.
///
/// Every suite gets its own page from [`BrowserService::new_page`].
pub struct BrowserService {
    _playwright: Playwright,
    browser: Browser,
}

impl std::fmt::Debug for BrowserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserService")
            .field("backend", &"playwright-rs")
            .finish()
    }
}

impl BrowserService {
    /// Launch the Playwright driver and Chromium.
    pub async fn launch(headless: bool) -> anyhow::Result<Self> {
        let playwright = Playwright::launch()
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch Playwright server: {e}"))?;

        let launch_opts = LaunchOptions::new().headless(headless);
        let browser = playwright
            .chromium()
            .launch_with_options(launch_opts)
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch Chromium: {e}"))?;

        debug!(headless, "chromium launched");
        Ok(Self {
            _playwright: playwright,
            browser,
        })
    }

    /// Open a fresh tab whose operations are bounded by `timeout`.
    ///
    /// The driver's own defaults (30 s) are raised to `timeout` as well, so
    /// navigations are not cut short before the outer bound.
    pub async fn new_page(&self, timeout: Duration) -> anyhow::Result<PlaywrightPage> {
        let page = self
            .browser
            .new_page()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create page: {e}"))?;
        let ms = driver_timeout_ms(timeout);
        page.set_default_timeout(ms).await;
        page.set_default_navigation_timeout(ms).await;
        debug!(timeout_ms = ms, "page opened");
        Ok(PlaywrightPage { page, timeout })
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("browser close failed: {e}"))
    }
}

#[async_trait]
impl BrowserHost for BrowserService {
    type Page = PlaywrightPage;

    async fn new_page(&self, timeout: Duration) -> anyhow::Result<PlaywrightPage> {
        BrowserService::new_page(self, timeout).await
    }

    async fn close_page(&self, page: &PlaywrightPage) -> anyhow::Result<()> {
        page.close().await
    }

    async fn close(&self) -> anyhow::Result<()> {
        BrowserService::close(self).await
    }
}

/// Playwright takes timeouts as fractional milliseconds.
pub(crate) fn driver_timeout_ms(timeout: Duration) -> f64 {
    timeout.as_millis() as f64
}

/// A single Chromium tab.
pub struct PlaywrightPage {
    page: Page,
    timeout: Duration,
}

impl PlaywrightPage {
    async fn bounded<T, E, F>(&self, what: &str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(anyhow::anyhow!("{what} failed: {e}")),
            Err(_) => Err(anyhow::anyhow!(
                "{what} timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }

    async fn evaluate(&self, expr: &str) -> anyhow::Result<String> {
        self.bounded("eval", self.page.evaluate_value(expr)).await
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("page close failed: {e}"))
    }
}

#[async_trait]
impl BrowserPage for PlaywrightPage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let _response = self
            .bounded(&format!("goto {url}"), self.page.goto(url, None))
            .await?;
        debug!(url, "navigated");
        Ok(())
    }

    async fn title(&self) -> anyhow::Result<String> {
        self.bounded("title", self.page.title()).await
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        // Hash changes are not always reflected by the driver's cached URL.
        self.evaluate("window.location.href").await
    }

    async fn count(&self, selector: &str) -> anyhow::Result<usize> {
        let locator = self.page.locator(selector).await;
        let n = self
            .bounded(&format!("count {selector}"), locator.count())
            .await?;
        Ok(n as usize)
    }

    async fn content(&self) -> anyhow::Result<String> {
        self.evaluate("new XMLSerializer().serializeToString(document)")
            .await
    }

    async fn eval_json(&self, expr: &str) -> anyhow::Result<Value> {
        let raw = self.evaluate(&json_wrapped(expr)).await?;
        Ok(decode_json(&raw))
    }
}
