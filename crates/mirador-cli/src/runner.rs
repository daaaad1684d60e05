//! Suite runner
//!
//! Every case runs on a page of its own. Up to `jobs` cases are in flight at
//! once; their reports are merged into one [`RunReport`]. A case that cannot
//! be run (page creation, navigation or collection failure) is recorded as
//! aborted and counts as one failure.

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use futures::stream::{self, StreamExt};
use mirador::{
    BrowserConfig, HarnessConfig, MiradorResult, PageCase, PageDriver, PageSession, RunReport,
    Suite,
};
use std::future::Future;
use tracing::{error, warn};

/// Runs a suite against pages from a browser
#[derive(Debug)]
pub struct SuiteRunner {
    config: CliConfig,
    harness: HarnessConfig,
    browser: BrowserConfig,
}

impl SuiteRunner {
    /// Create a runner
    #[must_use]
    pub const fn new(config: CliConfig, harness: HarnessConfig, browser: BrowserConfig) -> Self {
        Self {
            config,
            harness,
            browser,
        }
    }

    /// The harness configuration cases run with
    #[must_use]
    pub const fn harness(&self) -> &HarnessConfig {
        &self.harness
    }

    /// Launch chromium and run every case of `suite`
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or closed. Case
    /// failures are reported in the returned [`RunReport`].
    #[cfg(feature = "browser")]
    pub async fn run(&self, suite: &Suite, reporter: &ProgressReporter) -> CliResult<RunReport> {
        use mirador::ChromiumBrowser;

        tracing::info!(
            headless = self.browser.headless,
            jobs = self.config.jobs,
            "launching chromium"
        );
        let browser = ChromiumBrowser::launch(self.browser.clone()).await?;
        let report = run_cases(suite, &self.harness, self.config.jobs, reporter, || {
            browser.new_page()
        })
        .await;
        browser.close().await?;
        Ok(report)
    }

    /// Without the `browser` feature there is nothing to drive
    ///
    /// # Errors
    ///
    /// Always returns [`crate::CliError::BrowserUnavailable`].
    #[cfg(not(feature = "browser"))]
    pub async fn run(&self, suite: &Suite, _reporter: &ProgressReporter) -> CliResult<RunReport> {
        warn!(
            cases = suite.cases.len(),
            jobs = self.config.jobs,
            headless = self.browser.headless,
            "browser support not compiled in"
        );
        Err(crate::error::CliError::BrowserUnavailable)
    }
}

/// Run every case of `suite` on a fresh page from `open_page`
pub async fn run_cases<D, F, Fut>(
    suite: &Suite,
    harness: &HarnessConfig,
    jobs: usize,
    reporter: &ProgressReporter,
    open_page: F,
) -> RunReport
where
    D: PageDriver,
    F: Fn() -> Fut,
    Fut: Future<Output = MiradorResult<D>>,
{
    let open_page = &open_page;
    let reports: Vec<RunReport> = stream::iter(&suite.cases)
        .map(|case| async move {
            let report = run_case(case, &suite.base_url, harness, open_page).await;
            reporter.case_done(&case.name, &report);
            report
        })
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;

    let mut total = RunReport::default();
    for report in reports {
        total.merge(report);
    }
    total
}

async fn run_case<D, F, Fut>(
    case: &PageCase,
    base_url: &str,
    harness: &HarnessConfig,
    open_page: &F,
) -> RunReport
where
    D: PageDriver,
    F: Fn() -> Fut,
    Fut: Future<Output = MiradorResult<D>>,
{
    let mut driver = match open_page().await {
        Ok(driver) => driver,
        Err(err) => {
            error!(case = %case.name, error = %err, "could not open page");
            return RunReport::aborted(&case.name, &err);
        }
    };

    let result = PageSession::new(&mut driver, harness, base_url)
        .run(case)
        .await;
    if let Err(err) = driver.close().await {
        warn!(case = %case.name, error = %err, "page did not close cleanly");
    }

    match result {
        Ok(report) => report,
        Err(err) => {
            error!(case = %case.name, error = %err, "case aborted");
            RunReport::aborted(&case.name, &err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mirador::{
        Check, DocumentState, MiradorError, MockDriver, RawElement, Rule, StyleProperty,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn suite() -> Suite {
        Suite::new("t", "https://example.com")
            .case(PageCase::new("title", "/").rule(Rule::new("title", Check::TitleNonEmpty)))
            .case(PageCase::new("colors", "/").rule(Rule::new(
                "no-transparent-text",
                Check::NoTransparentText {
                    selector: mirador::Locator::css("p"),
                    leaf_text: false,
                },
            )))
    }

    fn page() -> MockDriver {
        MockDriver::new()
            .with_document(DocumentState {
                title: "Home".to_string(),
                ..DocumentState::default()
            })
            .with_elements(
                "p",
                vec![RawElement::new(1, "p").with_style(StyleProperty::Color, "transparent")],
            )
    }

    fn quiet() -> ProgressReporter {
        ProgressReporter::new(false, true)
    }

    mod run_cases_tests {
        use super::*;

        #[tokio::test]
        async fn test_merges_reports_from_every_case() {
            let report = run_cases(&suite(), &HarnessConfig::default(), 2, &quiet(), || async {
                Ok(page())
            })
            .await;
            assert_eq!(report.summary.verdicts, 2);
            assert_eq!(report.summary.passed, 1);
            assert_eq!(report.summary.failed, 1);
            assert!(report
                .verdicts
                .iter()
                .any(|v| v.page == "colors" && !v.passed));
        }

        #[tokio::test]
        async fn test_one_page_per_case() {
            let opened = AtomicUsize::new(0);
            run_cases(&suite(), &HarnessConfig::default(), 1, &quiet(), || {
                opened.fetch_add(1, Ordering::SeqCst);
                async { Ok(page()) }
            })
            .await;
            assert_eq!(opened.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn test_page_failure_aborts_case() {
            let report = run_cases(&suite(), &HarnessConfig::default(), 1, &quiet(), || async {
                Err::<MockDriver, _>(MiradorError::BrowserLaunch {
                    message: "no chromium".to_string(),
                })
            })
            .await;
            assert_eq!(report.aborted.len(), 2);
            assert_eq!(report.summary.total_failures, 2);
        }

        #[tokio::test]
        async fn test_navigation_failure_aborts_only_that_case() {
            let calls = AtomicUsize::new(0);
            let report = run_cases(&suite(), &HarnessConfig::default(), 1, &quiet(), || {
                let mut driver = page();
                driver.fail_navigation = calls.fetch_add(1, Ordering::SeqCst) == 0;
                async move { Ok(driver) }
            })
            .await;
            assert_eq!(report.aborted.len(), 1);
            assert_eq!(report.summary.verdicts, 1);
        }

        #[tokio::test]
        async fn test_empty_suite() {
            let suite = Suite::new("empty", "https://example.com");
            let report = run_cases(&suite, &HarnessConfig::default(), 4, &quiet(), || async {
                Ok(page())
            })
            .await;
            assert!(report.is_success());
            assert_eq!(report.summary.verdicts, 0);
        }
    }

    mod runner_tests {
        use super::*;

        #[test]
        fn test_harness_accessor() {
            let runner = SuiteRunner::new(
                CliConfig::default(),
                HarnessConfig::default().with_settle(std::time::Duration::ZERO),
                BrowserConfig::default(),
            );
            assert_eq!(runner.harness().settle, std::time::Duration::ZERO);
        }
    }
}
