//! A scripted `BrowserPage` for exercising suites and the runner without Chromium.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cpn_e2e::browser::{BrowserHost, BrowserPage};
use serde_json::Value;

type CountFn = Box<dyn Fn() -> usize + Send + Sync>;

#[derive(Default)]
struct State {
    current: String,
    visited: Vec<String>,
    evaluated: Vec<String>,
}

/// Answers DOM queries from tables filled in by the test.
///
/// Selector counts are global unless registered for a specific URL; unknown
/// selectors count zero. Navigations follow the redirect table once.
#[derive(Default)]
pub struct ScriptedPage {
    state: Mutex<State>,
    redirects: HashMap<String, String>,
    titles: HashMap<String, String>,
    contents: HashMap<String, String>,
    counts: HashMap<String, CountFn>,
    counts_at: HashMap<(String, String), usize>,
    evals: Vec<(String, Value)>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.insert(from.into(), to.into());
        self
    }

    pub fn title(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.titles.insert(url.into(), title.into());
        self
    }

    pub fn content(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.contents.insert(url.into(), body.into());
        self
    }

    pub fn count(self, selector: impl Into<String>, n: usize) -> Self {
        self.count_fn(selector, move || n)
    }

    pub fn count_fn<F>(mut self, selector: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        self.counts.insert(selector.into(), Box::new(f));
        self
    }

    pub fn count_at(mut self, url: impl Into<String>, selector: impl Into<String>, n: usize) -> Self {
        self.counts_at.insert((url.into(), selector.into()), n);
        self
    }

    /// Any evaluated expression containing `needle` yields `value`.
    pub fn eval(mut self, needle: impl Into<String>, value: Value) -> Self {
        self.evals.push((needle.into(), value));
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.state.lock().unwrap().evaluated.clone()
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        state.current = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn title(&self) -> anyhow::Result<String> {
        let current = self.state.lock().unwrap().current.clone();
        Ok(self.titles.get(&current).cloned().unwrap_or_default())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn count(&self, selector: &str) -> anyhow::Result<usize> {
        let current = self.state.lock().unwrap().current.clone();
        if let Some(n) = self.counts_at.get(&(current, selector.to_string())) {
            return Ok(*n);
        }
        Ok(self.counts.get(selector).map(|f| f()).unwrap_or(0))
    }

    async fn content(&self) -> anyhow::Result<String> {
        let current = self.state.lock().unwrap().current.clone();
        Ok(self.contents.get(&current).cloned().unwrap_or_default())
    }

    async fn eval_json(&self, expr: &str) -> anyhow::Result<Value> {
        self.state.lock().unwrap().evaluated.push(expr.to_string());
        Ok(self
            .evals
            .iter()
            .find(|(needle, _)| expr.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }
}

/// Hands out prepared `ScriptedPage`s and counts what gets closed.
///
/// Asking for more pages than were prepared fails like a crashed browser.
#[derive(Default)]
pub struct ScriptedBrowser {
    pending: Mutex<VecDeque<ScriptedPage>>,
    opened: AtomicUsize,
    pages_closed: AtomicUsize,
    closed: AtomicUsize,
}

impl ScriptedBrowser {
    pub fn with_pages(pages: impl IntoIterator<Item = ScriptedPage>) -> Self {
        Self {
            pending: Mutex::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserHost for ScriptedBrowser {
    type Page = ScriptedPage;

    async fn new_page(&self, _timeout: Duration) -> anyhow::Result<ScriptedPage> {
        let page = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("failed to create page: target closed"))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(page)
    }

    async fn close_page(&self, _page: &ScriptedPage) -> anyhow::Result<()> {
        self.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
