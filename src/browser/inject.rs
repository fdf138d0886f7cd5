//! Injection of the script under test into a live Canvas page.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use super::BrowserPage;

/// Global flag that makes the script run regardless of its own gating.
pub const FORCE_FLAG: &str = "FORCE_CPN";

/// Marker attribute on the injected elements.
pub const MARKER_ATTR: &str = "data-cpn-e2e";

/// The script and stylesheet under test, read once per run.
#[derive(Debug, Clone)]
pub struct CpnAssets {
    script: String,
    style: String,
}

impl CpnAssets {
    pub async fn load(script_path: &Path, style_path: &Path) -> anyhow::Result<Self> {
        let script = tokio::fs::read_to_string(script_path)
            .await
            .with_context(|| format!("failed to read CPN script: {}", script_path.display()))?;
        let style = tokio::fs::read_to_string(style_path)
            .await
            .with_context(|| format!("failed to read CPN stylesheet: {}", style_path.display()))?;
        debug!(
            script = %script_path.display(),
            script_bytes = script.len(),
            style_bytes = style.len(),
            "CPN assets loaded"
        );
        Ok(Self { script, style })
    }

    pub fn from_sources(script: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            style: style.into(),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn style(&self) -> &str {
        &self.style
    }
}

/// Expression that sets the force flag on the page's `ENV` object.
pub fn force_flag_expr() -> String {
    format!("(() => {{ window.ENV = window.ENV || {{}}; window.ENV['{FORCE_FLAG}'] = true; return true; }})()")
}

/// Expression that appends the stylesheet and script inline.
///
/// Inline scripts execute synchronously on insertion; errors they throw are
/// caught through a temporary `error` listener and returned as `{error}`.
pub fn attach_expr(assets: &CpnAssets) -> anyhow::Result<String> {
    let style = serde_json::to_string(assets.style()).context("encoding stylesheet")?;
    let script = serde_json::to_string(assets.script()).context("encoding script")?;
    Ok(format!(
        r#"(() => {{
    let failure = null;
    const onError = (ev) => {{ failure = String(ev.message || ev.error); }};
    window.addEventListener('error', onError);
    try {{
        const style = document.createElement('style');
        style.setAttribute('{MARKER_ATTR}', 'style');
        style.textContent = {style};
        document.head.appendChild(style);
        const script = document.createElement('script');
        script.setAttribute('{MARKER_ATTR}', 'script');
        script.textContent = {script};
        document.head.appendChild(script);
    }} finally {{
        window.removeEventListener('error', onError);
    }}
    return failure === null ? {{ ok: true }} : {{ error: failure }};
}})()"#
    ))
}

/// Force the script on and inject it with its stylesheet.
pub async fn inject_cpn(page: &dyn BrowserPage, assets: &CpnAssets) -> anyhow::Result<()> {
    page.eval_json(&force_flag_expr())
        .await
        .context("setting ENV.FORCE_CPN")?;

    let outcome = page
        .eval_json(&attach_expr(assets)?)
        .await
        .context("injecting CPN script and stylesheet")?;

    if let Some(err) = outcome.get("error").and_then(Value::as_str) {
        anyhow::bail!("CPN script threw while loading: {err}");
    }
    debug!("CPN injected");
    Ok(())
}
