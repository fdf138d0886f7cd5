//! Headless browser access.
//!
//! Suites talk to pages through [`BrowserPage`], so the same case code can
//! run against a real Chromium tab ([`PlaywrightPage`]) or a scripted stand-in
//! in tests.

pub mod inject;
pub mod session;
mod service;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use inject::{inject_cpn, CpnAssets};
pub use service::{BrowserService, PlaywrightPage};
pub use session::establish_session;

/// The page operations the suites need.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    /// The document title.
    async fn title(&self) -> anyhow::Result<String>;

    /// `window.location.href`, hash included.
    async fn current_url(&self) -> anyhow::Result<String>;

    /// Number of elements matching a CSS selector.
    async fn count(&self, selector: &str) -> anyhow::Result<usize>;

    /// The serialized document, XML documents included.
    async fn content(&self) -> anyhow::Result<String>;

    /// Evaluate a JavaScript expression and return its JSON-serialized value.
    ///
    /// `undefined` comes back as `Value::Null`.
    async fn eval_json(&self, expr: &str) -> anyhow::Result<Value>;
}

/// Something that hands out pages and cleans them up afterwards.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    type Page: BrowserPage + 'static;

    /// Open a page whose operations are bounded by `timeout`.
    async fn new_page(&self, timeout: Duration) -> anyhow::Result<Self::Page>;

    async fn close_page(&self, page: &Self::Page) -> anyhow::Result<()>;

    /// Shut the browser down. Pages still open go with it.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Wrap `expr` so its value crosses the protocol boundary as a JSON string.
pub(crate) fn json_wrapped(expr: &str) -> String {
    format!("JSON.stringify((() => {{ const __v = ({expr}); return __v === undefined ? null : __v; }})())")
}

/// Decode what a [`json_wrapped`] expression returned.
///
/// Some drivers hand strings back unquoted, so anything that is not valid JSON
/// is kept as a plain string.
pub(crate) fn decode_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
