//! Logs the browser into Canvas with the API token.

use anyhow::Context;
use tracing::debug;

use super::BrowserPage;
use crate::canvas::CanvasClient;

/// Exchange the bearer token for a one-time session URL and open it.
///
/// Canvas sets the session cookie while serving that URL, so later
/// navigations on `page` are authenticated. No retry: a stall beyond the
/// page timeout fails the caller.
pub async fn establish_session(canvas: &CanvasClient, page: &dyn BrowserPage) -> anyhow::Result<()> {
    let session_url = canvas
        .session_url()
        .await
        .context("error logging in")?;
    page.goto(&session_url)
        .await
        .context("error opening session URL")?;
    debug!(host = canvas.host(), "logged in");
    Ok(())
}
