//! Bounded page interactions.
//!
//! Each click gets exactly one attempt under a fixed bound. A timeout is not
//! an error for the run: it is downgraded to a failing verdict for that one
//! element and the caller moves on to the next.

use crate::driver::{ElementQuery, PageDriver};
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::rule::{Severity, Verdict};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Default bound for a single click
pub const DEFAULT_CLICK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default bound for the submit probe click
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default pause after submitting before counting validation errors
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Selector matching validation error elements
pub const VALIDATION_ERROR_SELECTOR: &str =
    "[role=\"alert\"], .error, .validation-error, [class*=\"error\"]";

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A scripted interaction in a page case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Interaction {
    /// Click every matched element once
    ClickEach {
        /// Elements to click
        selector: Locator,
        /// Bound per click; the session default when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        /// Severity of a failed click
        #[serde(default = "warning")]
        severity: Severity,
    },
    /// Submit a form empty and count validation errors
    SubmitProbe {
        /// Submit control
        #[serde(default = "default_submit")]
        submit: Locator,
        /// Validation error elements
        #[serde(default = "default_errors")]
        errors: Locator,
        /// Bound for the click
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        /// Pause before counting
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settle_ms: Option<u64>,
    },
    /// Click a link and expect the URL to match
    FollowLink {
        /// Link to click
        selector: Locator,
        /// Case-insensitive URL pattern
        url_pattern: String,
        /// Bound for the click and URL change
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClickEach { selector, .. } => write!(f, "click each {selector}"),
            Self::SubmitProbe { submit, .. } => write!(f, "submit probe {submit}"),
            Self::FollowLink {
                selector,
                url_pattern,
                ..
            } => write!(f, "follow {selector} -> /{url_pattern}/i"),
        }
    }
}

const fn warning() -> Severity {
    Severity::Warning
}

fn default_submit() -> Locator {
    Locator::css("button[type=\"submit\"]")
}

fn default_errors() -> Locator {
    Locator::css(VALIDATION_ERROR_SELECTOR)
}

/// Default bounds applied when an interaction does not set its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Bound for clicks and link follows
    pub click: Duration,
    /// Bound for the submit probe click
    pub submit: Duration,
    /// Pause after the submit probe click
    pub settle: Duration,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            click: DEFAULT_CLICK_TIMEOUT,
            submit: DEFAULT_SUBMIT_TIMEOUT,
            settle: DEFAULT_SETTLE,
        }
    }
}

impl Interaction {
    /// Run the interaction
    ///
    /// # Errors
    ///
    /// Propagates collection errors (the page handle is unusable). Click
    /// failures and timeouts are returned as verdicts.
    pub async fn run<D>(&self, driver: &mut D, bounds: Bounds) -> MiradorResult<Vec<Verdict>>
    where
        D: PageDriver + ?Sized,
    {
        let ms = |v: &Option<u64>, d: Duration| v.map_or(d, Duration::from_millis);
        match self {
            Self::ClickEach {
                selector,
                timeout_ms,
                severity,
            } => click_each(driver, selector, ms(timeout_ms, bounds.click), *severity).await,
            Self::SubmitProbe {
                submit,
                errors,
                timeout_ms,
                settle_ms,
            } => {
                let verdict = probe_submission(
                    driver,
                    submit,
                    errors,
                    ms(timeout_ms, bounds.submit),
                    ms(settle_ms, bounds.settle),
                )
                .await?;
                Ok(vec![verdict])
            }
            Self::FollowLink {
                selector,
                url_pattern,
                timeout_ms,
            } => {
                let verdict =
                    follow_link(driver, selector, url_pattern, ms(timeout_ms, bounds.click)).await?;
                Ok(vec![verdict])
            }
        }
    }
}

/// One click attempt under `bound`
///
/// # Errors
///
/// Returns [`MiradorError::InteractionTimeout`] when the bound elapses, or
/// whatever the driver reports.
pub async fn click_once<D>(
    driver: &mut D,
    locator: &Locator,
    index: usize,
    bound: Duration,
) -> MiradorResult<()>
where
    D: PageDriver + ?Sized,
{
    match timeout(bound, driver.click(locator, index)).await {
        Ok(result) => result,
        Err(_) => Err(MiradorError::InteractionTimeout {
            target: format!("{locator} #{index}"),
            ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Click each element `locator` matches, one attempt each
///
/// Hidden or disabled elements are skipped with a passing advisory verdict.
///
/// # Errors
///
/// Returns an error only if the elements cannot be read at all.
pub async fn click_each<D>(
    driver: &mut D,
    locator: &Locator,
    bound: Duration,
    severity: Severity,
) -> MiradorResult<Vec<Verdict>>
where
    D: PageDriver + ?Sized,
{
    let elements = driver
        .query(&ElementQuery::new(locator.clone()).with_attributes(["aria-label"]))
        .await?;
    info!(locator = %locator, count = elements.len(), "clicking elements");

    let mut verdicts = Vec::with_capacity(elements.len());
    for (index, el) in elements.iter().enumerate() {
        let label = el
            .attributes
            .get("aria-label")
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| el.text.chars().take(20).collect());
        let rule = format!("click {locator} #{}", index + 1);

        if !el.visible || !el.enabled {
            debug!(%rule, visible = el.visible, enabled = el.enabled, "skipping click");
            verdicts.push(Verdict::pass(
                rule,
                format!(
                    "Cannot click {label:?} (Visible: {}, Enabled: {})",
                    el.visible, el.enabled
                ),
            ));
            continue;
        }

        match click_once(driver, locator, index, bound).await {
            Ok(()) => verdicts.push(Verdict::pass(rule, format!("Clicked {label:?}"))),
            Err(err @ MiradorError::Collection { .. }) => return Err(err),
            Err(err) => {
                warn!(%rule, error = %err, "click failed");
                verdicts.push(Verdict::fail(
                    rule,
                    severity,
                    format!("Error clicking {label:?}"),
                    err.to_string(),
                ));
            }
        }
    }
    Ok(verdicts)
}

/// Click the submit control once, wait `settle`, and count validation errors
///
/// The verdict is advisory: it fails with warning severity when no submit
/// control exists, the click fails, or no validation error appears.
///
/// # Errors
///
/// Returns an error only if the page handle is unusable.
pub async fn probe_submission<D>(
    driver: &mut D,
    submit: &Locator,
    errors: &Locator,
    bound: Duration,
    settle: Duration,
) -> MiradorResult<Verdict>
where
    D: PageDriver + ?Sized,
{
    let rule = format!("submit probe {submit}");
    if driver.count(submit).await? == 0 {
        return Ok(Verdict::fail(
            rule,
            Severity::Warning,
            "No submit button found",
            format!("{submit} matched nothing"),
        ));
    }

    match click_once(driver, submit, 0, bound).await {
        Ok(()) => {}
        Err(err @ MiradorError::Collection { .. }) => return Err(err),
        Err(err) => {
            warn!(%rule, error = %err, "submit click failed");
            return Ok(Verdict::fail(
                rule,
                Severity::Warning,
                "Error during form submission test",
                err.to_string(),
            ));
        }
    }

    driver.pause(settle).await;
    let shown = driver.count(errors).await?;
    if shown > 0 {
        Ok(Verdict::pass(rule, format!("Validation errors shown: {shown}")))
    } else {
        Ok(Verdict::fail(
            rule,
            Severity::Warning,
            "No validation errors shown on empty form submission",
            format!("{errors} matched nothing after {}ms", settle.as_millis()),
        ))
    }
}

/// Click a link and wait (within `bound`) for the URL to match `pattern`
///
/// # Errors
///
/// Returns an error for an invalid pattern or an unusable page handle.
pub async fn follow_link<D>(
    driver: &mut D,
    link: &Locator,
    pattern: &str,
    bound: Duration,
) -> MiradorResult<Verdict>
where
    D: PageDriver + ?Sized,
{
    let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    let rule = format!("follow {link}");
    let started = Instant::now();

    match click_once(driver, link, 0, bound).await {
        Ok(()) => {}
        Err(err @ MiradorError::Collection { .. }) => return Err(err),
        Err(err) => {
            return Ok(Verdict::fail(
                rule,
                Severity::Error,
                format!("Could not click {link}"),
                err.to_string(),
            ));
        }
    }

    loop {
        let url = driver.document().await?.url;
        if re.is_match(&url) {
            return Ok(Verdict::pass(rule, format!("url: {url}")));
        }
        if started.elapsed() >= bound {
            return Ok(Verdict::fail(
                rule,
                Severity::Error,
                format!("URL does not match /{pattern}/i"),
                format!("url: {url}"),
            ));
        }
        driver.pause(URL_POLL_INTERVAL).await;
    }
}
