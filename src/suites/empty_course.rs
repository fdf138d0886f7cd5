//! The CPN script must leave a course without modules untouched.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{CaseContext, Suite};
use crate::browser::inject_cpn;
use crate::canvas::{CanvasClient, Course, DefaultView};
use crate::checks::{self, course_url};
use crate::fixtures::{self, EMPTY_COURSE};

pub const COURSE_NAVIGABLE: &str = "General: Check the course is created and navigable.";
pub const CONTENT_DIV: &str = "Tile View: Check content DIV exists.";
pub const HOME_UNCHANGED: &str = "Tile View: Check the script does not make any changes in the home page.";
pub const OTHER_HOMES_UNCHANGED: &str = "Tile View: Ensure the script does not perform any action in other course homes.";
pub const MENU_UNCHANGED: &str = "Modules submenu: Check the script does not make any changes in LHS menu.";

// HOME_UNCHANGED must run before OTHER_HOMES_UNCHANGED switches the home page to the feed.
const CASES: &[&str] = &[
    COURSE_NAVIGABLE,
    CONTENT_DIV,
    HOME_UNCHANGED,
    OTHER_HOMES_UNCHANGED,
    MENU_UNCHANGED,
];

pub struct EmptyCourseSuite {
    account_id: String,
    course: Option<Course>,
}

impl EmptyCourseSuite {
    pub fn new(account_id: String) -> Self {
        Self {
            account_id,
            course: None,
        }
    }

    pub fn course(&self) -> Option<&Course> {
        self.course.as_ref()
    }

    fn course_ref(&self) -> anyhow::Result<&Course> {
        self.course
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no course provisioned"))
    }

    async fn go_to_course(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        cx.page.goto(&course_url(cx.host(), self.course_ref()?.id)).await
    }

    async fn go_to_course_with_cpn(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        self.go_to_course(cx).await?;
        inject_cpn(cx.page, cx.assets()?).await
    }

    async fn course_navigable(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        self.go_to_course(cx).await?;
        checks::expect_title_contains(cx.page, &self.course_ref()?.name).await
    }

    async fn content_div(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        self.go_to_course(cx).await?;
        checks::expect_present(cx.page, "#content").await
    }

    async fn home_unchanged(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        self.go_to_course_with_cpn(cx).await?;
        // The "no modules yet" placeholder stays.
        checks::expect_present(cx.page, "#no_context_modules_message").await?;
        checks::expect_present(cx.page, "#course_home_content").await?;
        checks::expect_absent(cx.page, "#module_nav").await?;
        // Teachers can still add modules.
        checks::expect_present(cx.page, ".add_module_link").await
    }

    async fn other_homes_unchanged(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        let course_id = self.course_ref()?.id;
        cx.canvas
            .set_default_view(course_id, DefaultView::Feed)
            .await?;
        info!(course_id, "course home switched to feed");

        self.go_to_course_with_cpn(cx).await?;
        checks::expect_absent(cx.page, "#no_context_modules_message").await?;
        checks::expect_present(cx.page, ".recent_activity").await?;
        checks::expect_present(cx.page, "#course_home_content").await?;
        checks::expect_absent(cx.page, "#module_nav").await
    }

    async fn menu_unchanged(&self, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        self.go_to_course_with_cpn(cx).await?;
        checks::expect_min_count(cx.page, "li.section a.modules", 1).await?;
        checks::expect_absent(cx.page, ".ou-section-tabs-sub").await
    }
}

#[async_trait]
impl Suite for EmptyCourseSuite {
    fn name(&self) -> &'static str {
        "empty-course"
    }

    fn cases(&self) -> &'static [&'static str] {
        CASES
    }

    fn needs_assets(&self) -> bool {
        true
    }

    async fn before_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()> {
        self.course = Some(fixtures::create_course(canvas, &self.account_id, EMPTY_COURSE).await?);
        Ok(())
    }

    async fn run_case(&self, case: &str, cx: &CaseContext<'_>) -> anyhow::Result<()> {
        match case {
            COURSE_NAVIGABLE => self.course_navigable(cx).await,
            CONTENT_DIV => self.content_div(cx).await,
            HOME_UNCHANGED => self.home_unchanged(cx).await,
            OTHER_HOMES_UNCHANGED => self.other_homes_unchanged(cx).await,
            MENU_UNCHANGED => self.menu_unchanged(cx).await,
            other => Err(anyhow::anyhow!("unknown case in suite empty-course: {other}")),
        }
    }

    async fn after_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()> {
        let Some(course) = self.course.take() else {
            warn!("no course to delete");
            return Ok(());
        };
        fixtures::teardown_course(canvas, course.id).await
    }
}
