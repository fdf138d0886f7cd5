//! Canvas REST API client.
//!
//! Covers only the endpoints the suites provision fixtures with and
//! assert on: courses, modules, assignments, module items, and the
//! session-token exchange used to log the browser in.

mod link;
mod types;

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

pub use link::Links;
pub use types::{
    Assignment, Course, DefaultView, Module, ModuleItem, ModuleItemKind, NewCourse, NewModule,
    NewModuleItem, Paged, SessionToken,
};

/// Canvas caps `per_page` at 100.
pub const MAX_PER_PAGE: u32 = 100;

/// Thin typed wrapper around the Canvas REST API.
#[derive(Clone)]
pub struct CanvasClient {
    client: Client,
    host: String,
    token: String,
}

impl std::fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasClient")
            .field("host", &self.host)
            .finish()
    }
}

impl CanvasClient {
    /// Build a client for `host` (no trailing slash) authenticating with `token`.
    pub fn new(host: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("cpn-e2e/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client for Canvas")?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether `link` points at this client's scheme, host and port, with no
    /// credentials of its own.
    pub fn is_same_origin(&self, link: &str) -> bool {
        let (Ok(base), Ok(link)) = (Url::parse(&self.host), Url::parse(link)) else {
            return false;
        };
        link.username().is_empty()
            && link.password().is_none()
            && link.scheme() == base.scheme()
            && link.host_str().is_some()
            && link.host_str() == base.host_str()
            && link.port_or_known_default() == base.port_or_known_default()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> anyhow::Result<Response> {
        let resp = self
            .authed(req)
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "{what}: Canvas answered {status}: {}",
                crate::utils::truncate_str(body.trim(), 300)
            );
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> anyhow::Result<T> {
        self.send(req, what)
            .await?
            .json()
            .await
            .with_context(|| format!("{what}: unexpected response body"))
    }

    // -- courses -------------------------------------------------------------

    pub async fn create_course(
        &self,
        account_id: &str,
        course: &NewCourse,
    ) -> anyhow::Result<Course> {
        let req = self
            .client
            .post(self.url(&format!("/api/v1/accounts/{account_id}/courses")))
            .json(&json!({ "course": course }));
        let created: Course = self.send_json(req, "create course").await?;
        debug!(course_id = created.id, name = %created.name, "course created");
        Ok(created)
    }

    /// Change what the course home page shows.
    ///
    /// Sent form-encoded, the way the Canvas UI does it.
    pub async fn set_default_view(&self, course_id: u64, view: DefaultView) -> anyhow::Result<()> {
        let req = self
            .client
            .put(self.url(&format!("/api/v1/courses/{course_id}")))
            .form(&[("course[default_view]", view.as_str())]);
        self.send(req, "update course default view").await?;
        debug!(course_id, view = view.as_str(), "course default view updated");
        Ok(())
    }

    /// Permanently delete a course.
    pub async fn delete_course(&self, course_id: u64) -> anyhow::Result<()> {
        let req = self
            .client
            .delete(self.url(&format!("/api/v1/courses/{course_id}")))
            .json(&json!({ "event": "delete" }));
        self.send(req, "delete course").await?;
        debug!(course_id, "course deleted");
        Ok(())
    }

    // -- modules -------------------------------------------------------------

    pub async fn create_module(&self, course_id: u64, module: &NewModule) -> anyhow::Result<Module> {
        let req = self
            .client
            .post(self.url(&format!("/api/v1/courses/{course_id}/modules")))
            .json(&json!({ "module": module }));
        self.send_json(req, "create module").await
    }

    /// Fetch the first page of a course's modules.
    pub async fn list_modules(&self, course_id: u64, per_page: u32) -> anyhow::Result<Paged<Module>> {
        let url = self.url(&format!(
            "/api/v1/courses/{course_id}/modules?per_page={per_page}"
        ));
        self.get_page(&url, "list modules").await
    }

    /// Fetch every module of a course, following `rel="next"` links.
    pub async fn list_all_modules(&self, course_id: u64) -> anyhow::Result<Vec<Module>> {
        let mut page = self.list_modules(course_id, MAX_PER_PAGE).await?;
        let mut modules = std::mem::take(&mut page.items);
        while let Some(next) = page.links.next().map(str::to_string) {
            // The bearer token goes with the request, so stay on the tenant.
            if !self.is_same_origin(&next) {
                anyhow::bail!("list modules: refusing to follow pagination link off-host: {next}");
            }
            page = self.get_page(&next, "list modules").await?;
            modules.append(&mut page.items);
        }
        Ok(modules)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, what: &str) -> anyhow::Result<Paged<T>> {
        let resp = self.send(self.client.get(url), what).await?;
        let link_header = resp
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let items: Vec<T> = resp
            .json()
            .await
            .with_context(|| format!("{what}: unexpected response body"))?;
        let links = link_header.as_deref().map(Links::parse).unwrap_or_default();
        Ok(Paged {
            items,
            link_header,
            links,
        })
    }

    // -- assignments & items -------------------------------------------------

    pub async fn create_assignment(&self, course_id: u64, name: &str) -> anyhow::Result<Assignment> {
        let req = self
            .client
            .post(self.url(&format!("/api/v1/courses/{course_id}/assignments")))
            .json(&json!({ "assignment": { "name": name } }));
        self.send_json(req, "create assignment").await
    }

    pub async fn create_module_item(
        &self,
        course_id: u64,
        module_id: u64,
        item: &NewModuleItem,
    ) -> anyhow::Result<ModuleItem> {
        let req = self
            .client
            .post(self.url(&format!(
                "/api/v1/courses/{course_id}/modules/{module_id}/items"
            )))
            .json(&json!({ "module_item": item }));
        self.send_json(req, "create module item").await
    }

    // -- session -------------------------------------------------------------

    /// Exchange the bearer token for a one-time browser login URL.
    pub async fn session_url(&self) -> anyhow::Result<String> {
        let req = self.client.get(self.url("/login/session_token"));
        let token: SessionToken = self.send_json(req, "session token exchange").await?;
        Ok(token.session_url)
    }
}
