//! Runs suites through `before_all → (session → case)* → after_all` and
//! gathers the outcome of every case.

use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::browser::{establish_session, BrowserHost, BrowserPage, BrowserService, CpnAssets};
use crate::canvas::CanvasClient;
use crate::config::Settings;
use crate::suites::{CaseContext, Suite};

/// Knobs for a run that do not come from the settings file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only run cases whose name contains this (case-insensitive).
    pub filter: Option<String>,
    pub case_timeout: Duration,
    /// Run suites concurrently, one page each.
    pub parallel: bool,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            filter: None,
            case_timeout: settings.case_timeout(),
            parallel: false,
        }
    }

    fn selects(&self, case: &str) -> bool {
        match &self.filter {
            Some(f) => case.to_lowercase().contains(&f.to_lowercase()),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Log lines emitted while a failing case ran.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.cases.iter().filter(|c| c.outcome == outcome).count()
    }

    pub fn is_success(&self) -> bool {
        self.setup_error.is_none()
            && self.teardown_error.is_none()
            && self.cases.iter().all(|c| c.outcome == Outcome::Passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.suites.iter().all(SuiteReport::is_success)
    }

    /// Failed or skipped cases plus setup/teardown errors.
    pub fn problem_count(&self) -> usize {
        self.suites
            .iter()
            .map(|s| {
                s.count(Outcome::Failed)
                    + s.count(Outcome::Skipped)
                    + usize::from(s.setup_error.is_some())
                    + usize::from(s.teardown_error.is_some())
            })
            .sum()
    }

    pub async fn write_json(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize run report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write report: {}", path.display()))
    }

    pub fn print_summary(&self) {
        for suite in &self.suites {
            println!("\n{}", suite.suite);
            if let Some(e) = &suite.setup_error {
                println!("  setup failed: {e}");
            }
            for case in &suite.cases {
                let mark = match case.outcome {
                    Outcome::Passed => "✓",
                    Outcome::Failed => "✗",
                    Outcome::Skipped => "-",
                };
                println!("  {mark} {} ({} ms)", case.name, case.duration_ms);
                if let Some(e) = &case.error {
                    println!("      {e}");
                }
            }
            if let Some(e) = &suite.teardown_error {
                println!("  teardown failed: {e}");
            }
            println!(
                "  {} passed, {} failed, {} skipped",
                suite.count(Outcome::Passed),
                suite.count(Outcome::Failed),
                suite.count(Outcome::Skipped)
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run one suite against `page`.
///
/// Never returns early: setup failures skip the cases, case failures are
/// recorded, and teardown always runs.
pub async fn run_suite(
    suite: &mut dyn Suite,
    canvas: &CanvasClient,
    page: &dyn BrowserPage,
    assets: Option<&CpnAssets>,
    opts: &RunOptions,
) -> SuiteReport {
    let name = suite.name();
    let started_at = Utc::now();
    let selected: Vec<&'static str> = suite
        .cases()
        .iter()
        .copied()
        .filter(|c| opts.selects(c))
        .collect();

    let mut report = SuiteReport {
        suite: name.to_string(),
        started_at,
        setup_error: None,
        teardown_error: None,
        cases: Vec::with_capacity(selected.len()),
    };

    if selected.is_empty() {
        info!(suite = name, "no cases selected, skipping suite");
        return report;
    }

    info!(suite = name, cases = selected.len(), "provisioning fixtures");
    let setup = suite
        .before_all(canvas)
        .instrument(info_span!("setup", suite = name))
        .await;

    match setup {
        Err(e) => {
            let msg = format!("{e:#}");
            error!(suite = name, "fixture setup failed: {msg}");
            report.cases = selected
                .iter()
                .map(|c| CaseReport {
                    name: c.to_string(),
                    outcome: Outcome::Skipped,
                    error: Some("fixture setup failed".to_string()),
                    duration_ms: 0,
                    logs: Vec::new(),
                })
                .collect();
            report.setup_error = Some(msg);
        }
        Ok(()) => {
            let cx = CaseContext {
                canvas,
                page,
                assets,
            };
            for case in selected {
                let case_report = run_case(&*suite, case, &cx, opts).await;
                report.cases.push(case_report);
            }
        }
    }

    if let Err(e) = suite
        .after_all(canvas)
        .instrument(info_span!("teardown", suite = name))
        .await
    {
        let msg = format!("{e:#}");
        error!(suite = name, "fixture teardown failed: {msg}");
        report.teardown_error = Some(msg);
    }

    info!(
        suite = name,
        passed = report.count(Outcome::Passed),
        failed = report.count(Outcome::Failed),
        skipped = report.count(Outcome::Skipped),
        "suite finished"
    );
    report
}

async fn run_case(
    suite: &dyn Suite,
    case: &'static str,
    cx: &CaseContext<'_>,
    opts: &RunOptions,
) -> CaseReport {
    let suite_name = suite.name();
    let mut rx = crate::logs::subscribe();
    let start = Instant::now();

    let body = async {
        establish_session(cx.canvas, cx.page).await?;
        suite.run_case(case, cx).await
    };
    let result = match tokio::time::timeout(opts.case_timeout, body)
        .instrument(info_span!("case", suite = suite_name, case = case))
        .await
    {
        Ok(r) => r,
        Err(_) => Err(anyhow::anyhow!(
            "case timed out after {}s",
            opts.case_timeout.as_secs()
        )),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            info!(suite = suite_name, case, duration_ms, "passed");
            CaseReport {
                name: case.to_string(),
                outcome: Outcome::Passed,
                error: None,
                duration_ms,
                logs: Vec::new(),
            }
        }
        Err(e) => {
            let msg = format!("{e:#}");
            warn!(suite = suite_name, case, "failed: {msg}");
            let logs = rx
                .as_mut()
                .map(|rx| crate::logs::drain_for(rx, suite_name, case))
                .unwrap_or_default();
            CaseReport {
                name: case.to_string(),
                outcome: Outcome::Failed,
                error: Some(msg),
                duration_ms,
                logs,
            }
        }
    }
}

/// Read the CPN assets when any of `suites` injects them.
///
/// Runs before a browser is launched or a fixture created, so a missing
/// file aborts the run without touching Canvas.
pub async fn load_assets(
    suites: &[Box<dyn Suite>],
    settings: &Settings,
) -> anyhow::Result<Option<CpnAssets>> {
    if !suites.iter().any(|s| s.needs_assets()) {
        return Ok(None);
    }
    let assets = CpnAssets::load(&settings.script_path, &settings.style_path).await?;
    Ok(Some(assets))
}

/// Run `suites` in a fresh Chromium, one page per suite.
pub async fn execute(
    suites: &mut [Box<dyn Suite>],
    canvas: &CanvasClient,
    settings: &Settings,
    opts: &RunOptions,
) -> anyhow::Result<RunReport> {
    let assets = load_assets(suites, settings).await?;
    let browser = BrowserService::launch(settings.headless).await?;
    run_in_browser(
        &browser,
        suites,
        canvas,
        settings.page_timeout(),
        assets.as_ref(),
        opts,
    )
    .await
}

/// Open one page per suite on `host`, run the suites, and close everything.
///
/// The host is closed on every path, including a failure to open a page.
pub async fn run_in_browser<H: BrowserHost>(
    host: &H,
    suites: &mut [Box<dyn Suite>],
    canvas: &CanvasClient,
    page_timeout: Duration,
    assets: Option<&CpnAssets>,
    opts: &RunOptions,
) -> anyhow::Result<RunReport> {
    let mut pages = Vec::with_capacity(suites.len());
    for _ in 0..suites.len() {
        match host.new_page(page_timeout).await {
            Ok(page) => pages.push(page),
            Err(e) => {
                close_all(host, &pages).await;
                return Err(e);
            }
        }
    }

    let views: Vec<&dyn BrowserPage> = pages.iter().map(|p| p as &dyn BrowserPage).collect();
    let report = run_suites(suites, canvas, &views, assets, opts).await;
    close_all(host, &pages).await;
    report
}

async fn close_all<H: BrowserHost>(host: &H, pages: &[H::Page]) {
    for page in pages {
        if let Err(e) = host.close_page(page).await {
            warn!("{e:#}");
        }
    }
    if let Err(e) = host.close().await {
        warn!("{e:#}");
    }
}

/// Run each suite on its own page, concurrently when `opts.parallel` is set.
pub async fn run_suites(
    suites: &mut [Box<dyn Suite>],
    canvas: &CanvasClient,
    pages: &[&dyn BrowserPage],
    assets: Option<&CpnAssets>,
    opts: &RunOptions,
) -> anyhow::Result<RunReport> {
    anyhow::ensure!(
        pages.len() == suites.len(),
        "{} page(s) for {} suite(s)",
        pages.len(),
        suites.len()
    );
    let started_at = Utc::now();

    let reports = if opts.parallel {
        join_all(
            suites
                .iter_mut()
                .zip(pages.iter())
                .map(|(suite, page)| run_suite(suite.as_mut(), canvas, *page, assets, opts)),
        )
        .await
    } else {
        let mut reports = Vec::with_capacity(suites.len());
        for (suite, page) in suites.iter_mut().zip(pages.iter()) {
            reports.push(run_suite(suite.as_mut(), canvas, *page, assets, opts).await);
        }
        reports
    };

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        suites: reports,
    })
}
