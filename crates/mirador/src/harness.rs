//! Page sessions.
//!
//! A [`PageSession`] runs one [`PageCase`] on one driver, strictly in order:
//!
//! ```text
//! arm recorder ─► navigate (bounded) ─► collect ─► evaluate rules
//!      ─► screenshot ─► interactions ─► flush events ─► stop recorder
//!      ─► console rules ─► RunReport
//! ```

use crate::aggregator::{ReportAggregator, RunReport};
use crate::collector::collect;
use crate::driver::PageDriver;
use crate::interaction::{Bounds, DEFAULT_CLICK_TIMEOUT, DEFAULT_SETTLE, DEFAULT_SUBMIT_TIMEOUT};
use crate::recorder::EventRecorder;
use crate::result::{MiradorError, MiradorResult};
use crate::snapshot::PageSnapshot;
use crate::style::StyleProperty;
use crate::suite::PageCase;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound for navigation plus readiness
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts and artifact location for sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Bound for navigation plus readiness
    pub navigation_timeout: Duration,
    /// Bound for a single click
    pub click_timeout: Duration,
    /// Bound for the submit probe click
    pub submit_timeout: Duration,
    /// Pause after the submit probe click
    pub settle: Duration,
    /// Directory screenshots are written to
    pub artifacts_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            click_timeout: DEFAULT_CLICK_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            settle: DEFAULT_SETTLE,
            artifacts_dir: PathBuf::from("."),
        }
    }
}

impl HarnessConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set click bound
    #[must_use]
    pub const fn with_click_timeout(mut self, timeout: Duration) -> Self {
        self.click_timeout = timeout;
        self
    }

    /// Set submit probe bound
    #[must_use]
    pub const fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the post-submit pause
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Interaction bounds
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        Bounds {
            click: self.click_timeout,
            submit: self.submit_timeout,
            settle: self.settle,
        }
    }
}

/// Runs page cases on one driver
pub struct PageSession<'a, D: PageDriver + ?Sized> {
    driver: &'a mut D,
    config: &'a HarnessConfig,
    base_url: String,
}

impl<D: PageDriver + ?Sized> fmt::Debug for PageSession<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSession")
            .field("config", self.config)
            .field("base_url", &self.base_url)
            .field("ready", &self.driver.ready_state())
            .finish_non_exhaustive()
    }
}

impl<'a, D: PageDriver + ?Sized> PageSession<'a, D> {
    /// Session over `driver` resolving case paths against `base_url`
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig, base_url: impl Into<String>) -> Self {
        Self {
            driver,
            config,
            base_url: base_url.into(),
        }
    }

    /// Run one case
    ///
    /// # Errors
    ///
    /// Returns an error when the case is invalid, navigation fails or times
    /// out, collection fails, or a screenshot cannot be written. Rule and
    /// interaction failures are reported in the returned [`RunReport`].
    pub async fn run(&mut self, case: &PageCase) -> MiradorResult<RunReport> {
        case.validate()?;
        let url = case.url(&self.base_url);
        info!(case = %case.name, %url, readiness = %case.readiness, "running page case");

        let recording = EventRecorder::start(self.driver).await?;

        let nav_ms = u64::try_from(self.config.navigation_timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(
            self.config.navigation_timeout,
            self.driver.navigate(&url, case.readiness),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(MiradorError::NavigationTimeout { url, ms: nav_ms });
            }
        }

        let snapshot = collect(&*self.driver, &case.observation_spec()).await?;
        log_snapshot(&snapshot);

        let mut aggregator = ReportAggregator::new(case.name.clone());
        for rule in case.snapshot_rules() {
            let verdict = rule.evaluate(&snapshot);
            debug!(verdict = %verdict, "evaluated rule");
            aggregator.record(verdict);
        }

        if let Some(path) = &case.screenshot {
            self.capture(path).await?;
        }

        for interaction in &case.interactions {
            let verdicts = interaction.run(self.driver, self.config.bounds()).await?;
            aggregator.record_all(verdicts);
        }

        if let Err(e) = self.driver.flush_events().await {
            warn!(case = %case.name, error = %e, "event flush failed, log may be incomplete");
        }
        let log = recording.stop();
        for rule in case.console_rules() {
            aggregator.record_events(&log, rule)?;
        }
        for entry in log.errors() {
            warn!(case = %case.name, kind = %entry.kind, text = %entry.text, "page reported error");
        }
        aggregator.attach_log(log);

        let report = aggregator.summarize();
        info!(
            case = %case.name,
            passed = report.summary.passed,
            failures = report.summary.total_failures,
            "page case finished"
        );
        Ok(report)
    }

    async fn capture(&mut self, path: &std::path::Path) -> MiradorResult<()> {
        let bytes = self.driver.screenshot().await?;
        let target = self.config.artifacts_dir.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        info!(path = %target.display(), "screenshot saved");
        Ok(())
    }
}

fn log_snapshot(snapshot: &PageSnapshot) {
    debug!(
        url = snapshot.url(),
        title = snapshot.title(),
        fonts = snapshot.fonts().count,
        fonts_ready = snapshot.fonts().ready,
        root_color_properties = snapshot.root_color_properties(),
        "snapshot collected"
    );
    for sheet in snapshot.stylesheets() {
        if sheet.error.is_some() {
            warn!("{sheet}");
        } else {
            debug!("{sheet}");
        }
    }
    for family in snapshot.font_faces() {
        debug!(family, "@font-face");
    }
    for (selector, n) in snapshot.counts() {
        info!(selector = %selector, count = n, "element count");
    }
    for (scope, elements) in snapshot.observations() {
        for el in elements.iter().filter(|el| !el.attributes.is_empty()) {
            debug!(scope = %scope, element = %el.label(), attributes = ?el.attributes, "attributes");
        }
        let families: std::collections::BTreeSet<&str> = elements
            .iter()
            .filter_map(|el| el.style(StyleProperty::FontFamily))
            .collect();
        if !families.is_empty() {
            debug!(scope = %scope, families = ?families, "font families");
        }
    }
}
