//! Read-and-compare helpers used by the suites.
//!
//! Each helper returns an error naming what was expected and what the page
//! actually had. None of them retry or touch page state.

use serde_json::Value;

use crate::browser::BrowserPage;

pub async fn expect_present(page: &dyn BrowserPage, selector: &str) -> anyhow::Result<()> {
    let n = page.count(selector).await?;
    anyhow::ensure!(n > 0, "expected `{selector}` to be present, found none");
    Ok(())
}

pub async fn expect_absent(page: &dyn BrowserPage, selector: &str) -> anyhow::Result<()> {
    let n = page.count(selector).await?;
    anyhow::ensure!(n == 0, "expected `{selector}` to be absent, found {n}");
    Ok(())
}

pub async fn expect_count(page: &dyn BrowserPage, selector: &str, expected: usize) -> anyhow::Result<()> {
    let n = page.count(selector).await?;
    anyhow::ensure!(
        n == expected,
        "expected {expected} match(es) for `{selector}`, found {n}"
    );
    Ok(())
}

pub async fn expect_min_count(page: &dyn BrowserPage, selector: &str, min: usize) -> anyhow::Result<()> {
    let n = page.count(selector).await?;
    anyhow::ensure!(
        n >= min,
        "expected at least {min} match(es) for `{selector}`, found {n}"
    );
    Ok(())
}

pub async fn expect_title_contains(page: &dyn BrowserPage, needle: &str) -> anyhow::Result<()> {
    let title = page.title().await?;
    anyhow::ensure!(
        title.contains(needle),
        "expected page title to contain {needle:?}, got {title:?}"
    );
    Ok(())
}

pub async fn expect_url_eq(page: &dyn BrowserPage, expected: &str) -> anyhow::Result<()> {
    let url = page.current_url().await?;
    anyhow::ensure!(url == expected, "expected URL {expected:?}, got {url:?}");
    Ok(())
}

pub async fn expect_url_contains(page: &dyn BrowserPage, needle: &str) -> anyhow::Result<()> {
    let url = page.current_url().await?;
    anyhow::ensure!(
        url.contains(needle),
        "expected URL to contain {needle:?}, got {url:?}"
    );
    Ok(())
}

pub async fn expect_content_contains(page: &dyn BrowserPage, needle: &str) -> anyhow::Result<()> {
    let content = page.content().await?;
    anyhow::ensure!(
        content.contains(needle),
        "expected page content to contain {needle:?}, got {:?}",
        crate::utils::truncate_str(&content, 200)
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Leading decimal digits of `s` as an integer, like JavaScript's `parseInt`.
pub fn parse_leading_int(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// The course id in a Canvas URL: the integer right after `courses/`.
pub fn course_id_from_url(url: &str) -> Option<u64> {
    let (_, rest) = url.split_once("courses/")?;
    parse_leading_int(rest)
}

/// Interpret an `ENV` value that may be a number or a numeric string.
pub fn json_as_id(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

/// Where Canvas redirects `/courses/:c/modules/:m`.
pub fn module_hash_url(host: &str, course_id: u64, module_id: u64) -> String {
    format!("{host}/courses/{course_id}/modules#module_{module_id}")
}

pub fn course_url(host: &str, course_id: u64) -> String {
    format!("{host}/courses/{course_id}")
}

pub fn modules_url(host: &str, course_id: u64) -> String {
    format!("{host}/courses/{course_id}/modules")
}

pub fn module_item_url(host: &str, course_id: u64, item_id: u64) -> String {
    format!("{host}/courses/{course_id}/modules/items/{item_id}")
}
