//! Suites: a fixture lifecycle plus an ordered list of named cases.

pub mod empty_course;
pub mod general;

use async_trait::async_trait;

use crate::browser::{BrowserPage, CpnAssets};
use crate::canvas::CanvasClient;
use crate::config::{Credentials, Settings};

pub use empty_course::EmptyCourseSuite;
pub use general::GeneralSuite;

/// Everything a case may touch.
pub struct CaseContext<'a> {
    pub canvas: &'a CanvasClient,
    pub page: &'a dyn BrowserPage,
    pub assets: Option<&'a CpnAssets>,
}

impl CaseContext<'_> {
    pub fn host(&self) -> &str {
        self.canvas.host()
    }

    pub fn assets(&self) -> anyhow::Result<&CpnAssets> {
        self.assets
            .ok_or_else(|| anyhow::anyhow!("CPN assets were not loaded for this suite"))
    }
}

#[async_trait]
pub trait Suite: Send + Sync {
    /// Short identifier used on the command line and in reports.
    fn name(&self) -> &'static str;

    /// Case names, in execution order.
    fn cases(&self) -> &'static [&'static str];

    /// Whether cases inject the script under test.
    fn needs_assets(&self) -> bool {
        false
    }

    /// Provision fixtures. An error here skips every case.
    async fn before_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()>;

    async fn run_case(&self, case: &str, cx: &CaseContext<'_>) -> anyhow::Result<()>;

    /// Remove whatever `before_all` managed to create.
    async fn after_all(&mut self, canvas: &CanvasClient) -> anyhow::Result<()>;
}

/// Which suites to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SuiteSelection {
    General,
    EmptyCourse,
    All,
}

/// Instantiate the selected suites.
///
/// Fails up front when the selection needs configuration that is missing.
pub fn build_suites(
    selection: SuiteSelection,
    creds: &Credentials,
    settings: &Settings,
) -> anyhow::Result<Vec<Box<dyn Suite>>> {
    let mut suites: Vec<Box<dyn Suite>> = Vec::new();
    if matches!(selection, SuiteSelection::General | SuiteSelection::All) {
        suites.push(Box::new(GeneralSuite::new(
            creds.account_id.clone(),
            creds.require_s3_bucket_url()?.to_string(),
            settings.module_count,
            settings.external_url.clone(),
        )));
    }
    if matches!(selection, SuiteSelection::EmptyCourse | SuiteSelection::All) {
        suites.push(Box::new(EmptyCourseSuite::new(creds.account_id.clone())));
    }
    Ok(suites)
}
