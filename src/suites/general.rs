//! DOM elements, `ENV` globals, Canvas API behaviour and the S3 bucket
//! the CPN script relies on, checked against a course with modules and items.

use async_trait::async_trait;
use tracing::warn;

use super::{CaseContext, Suite};
use crate::canvas::{CanvasClient, Course, Module, ModuleItem, MAX_PER_PAGE};
use crate::checks::{self, course_url, module_item_url, modules_url};
use crate::fixtures::{self, GENERAL_COURSE};

pub const COURSE_NAVIGABLE: &str = "General: Check the course is created and navigable.";
pub const MODULES_CREATED: &str = "General: Check modules have been created.";
pub const ITEM_NAVIGABLE: &str = "General: Check one module item is created and navigable.";
pub const S3_BUCKET_EXISTS: &str = "General: Check the Amazon S3 Bucket exists.";
pub const ENV_COURSE_ID: &str = "General: Check the COURSE_ID is in the ENV variable.";
pub const URL_COURSE_ID: &str = "General: Check the alternative way to get the COURSE_ID from the url.";
pub const ENV_ROOT_ACCOUNT_ID: &str = "General: Check the DOMAIN_ROOT_ACCOUNT_ID is in the ENV variable.";
pub const API_LISTS_MODULES: &str = "General: Check the modules API returns the module objects of the course.";
pub const API_PAGEABLE: &str = "General: Check the modules API is pageable.";
pub const HOME_CONTENT_DIV: &str = "Tile View: Check course_home_content DIV exists.";
pub const CONTENT_DIV: &str = "Tile View: Check content DIV exists.";
pub const SORTABLE_CONTAINER_DIV: &str = "Tile View: Check context_modules_sortable_container DIV exists.";
pub const SEQUENCE_FOOTER: &str = "Progress bar: Check module item footer exists, for the progress bar.";
pub const ITEM_ID_PARAM: &str = "Progress bar: Check the method to get the moduleItemId from the module_item_id param.";
pub const EXTERNAL_ITEM_URL: &str = "Progress bar: Check the method to get the moduleItemId from an external url module item.";
pub const MODULE_ID_ATTR: &str = "Modules list: Check the data-module-id attribute exists.";
pub const MODULE_ID_HASH: &str = "Modules list: Check the method to get the moduleId from the hash.";

const CASES: &[&str] = &[
    COURSE_NAVIGABLE,
    MODULES_CREATED,
    ITEM_NAVIGABLE,
    S3_BUCKET_EXISTS,
    ENV_COURSE_ID,
    URL_COURSE_ID,
    ENV_ROOT_ACCOUNT_ID,
    API_LISTS_MODULES,
    API_PAGEABLE,
    HOME_CONTENT_DIV,
    CONTENT_DIV,
    SORTABLE_CONTAINER_DIV,
    SEQUENCE_FOOTER,
    ITEM_ID_PARAM,
    EXTERNAL_ITEM_URL,
    MODULE_ID_ATTR,
    MODULE_ID_HASH,
];

/// Canvas always renders one extra, hidden `#context_module_blank` template module.
const BLANK_TEMPLATE_MODULES: usize = 1;

/// S3 answers an anonymous bucket listing with this when the bucket exists.
const S3_ACCESS_DENIED: &str = "<Message>Access Denied</Message>";

pub struct GeneralSuite {
    account_id: String,
    s3_bucket_url: String,
    module_count: usize,
    external_url: String,
    course: Option<Course>,
    modules: Vec<Module>,
    items: Vec<ModuleItem>,
}

impl GeneralSuite {
    pub fn new(
        account_id: String,
        s3_bucket_url: String,
        module_count: usize,
        external_url: String,
    ) -> Self {
        Self {
            account_id,
            s3_bucket_url,
            module_count,
            external_url,
            course: None,
            modules: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn course(&self) -> Option<&Course> {
        self.course.as_ref()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn items(&self) -> &[ModuleItem] {
        &self.items
    }

    fn course_id(&self) -> anyhow::Result<u64> {
        self.course
            .as_ref()
            .map(|c| c.id)
            .ok_or_else(|| anyhow::anyhow!("no course provisioned"))
    }

    fn item(&self, idx: usize) -> anyhow::Result<&ModuleItem> {
        self.items
            .get(idx)
            .ok_or_else(|| anyhow::anyhow!("module item {idx} was not provisioned"))
    }

    fn random_module(&self) -> anyhow::Result<&Module> {
        crate::utils::pick_random(&self.modules)
            .ok_or_else(|| anyhow::anyhow!("no modules provisioned"))
    }

    async fn course_navigable(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let course = self
            .course
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no course provisioned"))?;
        cx.page.goto(&course_url(cx.host(), course.id)).await?;
        checks::expect_title_contains(cx.page, &course.name).await
    }

    async fn modules_created(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        cx.page.goto(&modules_url(cx.host(), self.course_id()?)).await?;
        checks::expect_present(cx.page, "#context_modules").await?;
        checks::expect_count(
            cx.page,
            ".context_module",
            self.modules.len() + BLANK_TEMPLATE_MODULES,
        )
        .await
    }

    async fn item_navigable(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let item = self.item(0)?;
        cx.page
            .goto(&module_item_url(cx.host(), self.course_id()?, item.id))
            .await?;
        checks::expect_title_contains(cx.page, &item.title).await
    }

    async fn s3_bucket_exists(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        cx.page.goto(&self.s3_bucket_url).await?;
        checks::expect_content_contains(cx.page, S3_ACCESS_DENIED).await
    }

    async fn env_course_id(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let course_id = self.course_id()?;
        cx.page.goto(&modules_url(cx.host(), course_id)).await?;
        let value = cx.page.eval_json("ENV.COURSE_ID || ENV.course_id").await?;
        let found = checks::json_as_id(&value);
        anyhow::ensure!(
            found == Some(course_id),
            "expected ENV course id {course_id}, got {value}"
        );
        Ok(())
    }

    async fn url_course_id(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let course_id = self.course_id()?;
        cx.page.goto(&modules_url(cx.host(), course_id)).await?;
        let url = cx.page.current_url().await?;
        let found = checks::course_id_from_url(&url);
        anyhow::ensure!(
            found == Some(course_id),
            "expected course id {course_id} in URL, got {url:?}"
        );
        Ok(())
    }

    async fn env_root_account_id(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        cx.page.goto(&modules_url(cx.host(), self.course_id()?)).await?;
        let value = cx.page.eval_json("ENV.DOMAIN_ROOT_ACCOUNT_ID").await?;
        anyhow::ensure!(!value.is_null(), "ENV.DOMAIN_ROOT_ACCOUNT_ID is not set");
        Ok(())
    }

    async fn api_lists_modules(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let page = cx.canvas.list_modules(self.course_id()?, MAX_PER_PAGE).await?;
        anyhow::ensure!(
            page.items.len() == self.modules.len(),
            "expected {} modules from the API, got {}",
            self.modules.len(),
            page.items.len()
        );
        Ok(())
    }

    async fn api_pageable(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let page = cx.canvas.list_modules(self.course_id()?, 1).await?;
        let header = page
            .link_header
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("modules API sent no Link header"))?;
        anyhow::ensure!(
            header.contains(r#"rel="next""#) && page.links.has_next(),
            "Link header has no rel=\"next\": {header}"
        );
        Ok(())
    }

    async fn home_has(&self, cx: &CaseContext<'_>, selector: &str) -> anyhow::Result<()> {
        cx.page.goto(&course_url(cx.host(), self.course_id()?)).await?;
        checks::expect_present(cx.page, selector).await
    }

    async fn sequence_footer(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let item = self.item(0)?;
        cx.page
            .goto(&module_item_url(cx.host(), self.course_id()?, item.id))
            .await?;
        checks::expect_present(cx.page, "#sequence_footer").await?;
        checks::expect_present(cx.page, ".module-sequence-footer-content").await
    }

    async fn item_id_param(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let item = self.item(0)?;
        cx.page
            .goto(&module_item_url(cx.host(), self.course_id()?, item.id))
            .await?;
        checks::expect_url_contains(cx.page, "module_item_id").await
    }

    async fn external_item_url(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let item = self.item(1)?;
        let url = module_item_url(cx.host(), self.course_id()?, item.id);
        cx.page.goto(&url).await?;
        checks::expect_url_eq(cx.page, &url).await
    }

    async fn module_id_attr(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let module = self.random_module()?;
        cx.page.goto(&modules_url(cx.host(), self.course_id()?)).await?;
        let rendered = self.modules.len() + BLANK_TEMPLATE_MODULES;
        checks::expect_count(cx.page, "div.context_module", rendered).await?;
        // Every rendered module but the picked one.
        let others = format!("div.context_module:not([data-module-id='{}'])", module.id);
        checks::expect_count(cx.page, &others, rendered - 1).await
    }

    async fn module_id_hash(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let course_id = self.course_id()?;
        let module = self.random_module()?;
        cx.page
            .goto(&format!("{}/{}", modules_url(cx.host(), course_id), module.id))
            .await?;
        checks::expect_url_eq(
            cx.page,
            &checks::module_hash_url(cx.host(), course_id, module.id),
        )
        .await
    }
}

#[async_trait]
impl Suite for GeneralSuite {
    fn name(&self) -> &'static str {
        "general"
    }

    fn cases(&self) -> &'static [&'static str] {
        CASES
    }

    async fn before_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()> {
        let course = fixtures::create_course(canvas, &self.account_id, GENERAL_COURSE).await?;
        let course_id = course.id;
        // Record the course before anything else can fail, so teardown finds it.
        self.course = Some(course);

        self.modules = fixtures::create_modules(canvas, course_id, self.module_count).await?;
        let first = self
            .modules
            .first()
            .ok_or_else(|| anyhow::anyhow!("no modules were created"))?;

        self.items =
            fixtures::create_module_items(canvas, course_id, first.id, &self.external_url).await?;
        Ok(())
    }

    async fn run_case(&self, case: &str, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        match case {
            COURSE_NAVIGABLE => self.course_navigable(cx).await,
            MODULES_CREATED => self.modules_created(cx).await,
            ITEM_NAVIGABLE => self.item_navigable(cx).await,
            S3_BUCKET_EXISTS => self.s3_bucket_exists(cx).await,
            ENV_COURSE_ID => self.env_course_id(cx).await,
            URL_COURSE_ID => self.url_course_id(cx).await,
            ENV_ROOT_ACCOUNT_ID => self.env_root_account_id(cx).await,
            API_LISTS_MODULES => self.api_lists_modules(cx).await,
            API_PAGEABLE => self.api_pageable(cx).await,
            HOME_CONTENT_DIV => self.home_has(cx, "#course_home_content").await,
            CONTENT_DIV => self.home_has(cx, "#content").await,
            SORTABLE_CONTAINER_DIV => self.home_has(cx, "#context_modules_sortable_container").await,
            SEQUENCE_FOOTER => self.sequence_footer(cx).await,
            ITEM_ID_PARAM => self.item_id_param(cx).await,
            EXTERNAL_ITEM_URL => self.external_item_url(cx).await,
            MODULE_ID_ATTR => self.module_id_attr(cx).await,
            MODULE_ID_HASH => self.module_id_hash(cx).await,
            other => Err(anyhow::anyhow!("unknown case in suite general: {other}")),
        }
    }

    async fn after_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()> {
        let Some(course) = self.course.take() else {
            warn!("no course to delete");
            return Ok(());
        };
        self.modules.clear();
        self.items.clear();
        fixtures::teardown_course(canvas, course.id).await
    }
}
