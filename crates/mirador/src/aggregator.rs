//! Report aggregation.
//!
//! Collects verdicts and console findings for a run and summarises them into
//! a [`RunReport`]. The report does not depend on recording order: verdicts
//! and findings are kept sorted, and failures are partitioned by rule name.

use crate::recorder::{EventLog, EventLogEntry};
use crate::result::{MiradorError, MiradorResult};
use crate::rule::{EventFinding, Rule, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Accumulates results for one page case (or a whole run)
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    page: String,
    verdicts: Vec<Verdict>,
    findings: Vec<EventFinding>,
    events: BTreeMap<String, Vec<EventLogEntry>>,
}

impl ReportAggregator {
    /// Aggregator whose results are labelled with `page`
    #[must_use]
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            ..Self::default()
        }
    }

    /// Page label
    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }

    /// Add a verdict; an unlabelled verdict takes the aggregator's page label
    pub fn record(&mut self, mut verdict: Verdict) {
        if verdict.page.is_empty() {
            verdict.page.clone_from(&self.page);
        }
        self.verdicts.push(verdict);
    }

    /// Add several verdicts
    pub fn record_all(&mut self, verdicts: impl IntoIterator<Item = Verdict>) {
        for verdict in verdicts {
            self.record(verdict);
        }
    }

    /// Evaluate a console rule over a log and add the finding
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `rule` is not a console rule.
    pub fn record_events(&mut self, log: &EventLog, rule: &Rule) -> MiradorResult<()> {
        let mut finding = rule.evaluate_events(log)?;
        finding.page.clone_from(&self.page);
        self.findings.push(finding);
        Ok(())
    }

    /// Keep the full log in the report for context
    pub fn attach_log(&mut self, log: EventLog) {
        self.events
            .entry(self.page.clone())
            .or_default()
            .extend(log.into_entries());
    }

    /// Number of verdicts and findings recorded
    #[must_use]
    pub fn len(&self) -> usize {
        self.verdicts.len() + self.findings.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the report
    #[must_use]
    pub fn summarize(&self) -> RunReport {
        RunReport::from_parts(
            self.verdicts.clone(),
            self.findings.clone(),
            self.events.clone(),
        )
    }
}

/// Counts for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Verdicts recorded
    pub verdicts: usize,
    /// Verdicts that passed
    pub passed: usize,
    /// Error-severity verdicts that failed
    pub failed: usize,
    /// Warning-severity verdicts that failed
    pub warnings: usize,
    /// Console findings recorded
    pub findings: usize,
    /// Matching entries of failing error-severity findings
    pub disallowed_events: usize,
    /// `failed + disallowed_events`
    pub total_failures: usize,
}

/// One failure attributed to a rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Failure {
    /// Page case
    pub page: String,
    /// Failure message
    pub message: String,
    /// Diagnostic detail
    pub detail: String,
}

/// Aggregate of a run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Counts
    pub summary: Summary,
    /// Every verdict, sorted
    pub verdicts: Vec<Verdict>,
    /// Every console finding, sorted
    pub findings: Vec<EventFinding>,
    /// Failures (error and warning severity) by rule name
    pub failures_by_rule: BTreeMap<String, Vec<Failure>>,
    /// Recorded events by page
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, Vec<EventLogEntry>>,
    /// Cases that could not be run at all, by page
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aborted: BTreeMap<String, String>,
}

impl RunReport {
    fn from_parts(
        mut verdicts: Vec<Verdict>,
        mut findings: Vec<EventFinding>,
        events: BTreeMap<String, Vec<EventLogEntry>>,
    ) -> Self {
        verdicts.sort();
        findings.sort();
        let mut report = Self {
            summary: Summary::default(),
            verdicts,
            findings,
            failures_by_rule: BTreeMap::new(),
            events,
            aborted: BTreeMap::new(),
        };
        report.recount();
        report
    }

    /// Report for a case that aborted before producing verdicts
    #[must_use]
    pub fn aborted(page: impl Into<String>, error: &MiradorError) -> Self {
        let mut report = Self::default();
        report.aborted.insert(page.into(), error.to_string());
        report.recount();
        report
    }

    fn recount(&mut self) {
        let mut summary = Summary {
            verdicts: self.verdicts.len(),
            findings: self.findings.len(),
            ..Summary::default()
        };
        let mut failures_by_rule: BTreeMap<String, Vec<Failure>> = BTreeMap::new();

        for v in &self.verdicts {
            if v.passed {
                summary.passed += 1;
                continue;
            }
            if v.is_failure() {
                summary.failed += 1;
            } else {
                summary.warnings += 1;
            }
            failures_by_rule
                .entry(v.rule.clone())
                .or_default()
                .push(Failure {
                    page: v.page.clone(),
                    message: v.message.clone(),
                    detail: v.detail.clone(),
                });
        }

        for f in &self.findings {
            summary.disallowed_events += f.disallowed();
            if f.passed {
                continue;
            }
            let texts: Vec<&str> = f.matched.iter().map(|e| e.text.as_str()).collect();
            failures_by_rule
                .entry(f.rule.clone())
                .or_default()
                .push(Failure {
                    page: f.page.clone(),
                    message: f.message.clone(),
                    detail: texts.join(" | "),
                });
        }

        for list in failures_by_rule.values_mut() {
            list.sort();
        }

        summary.total_failures = summary.failed + summary.disallowed_events + self.aborted.len();
        self.summary = summary;
        self.failures_by_rule = failures_by_rule;
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: Self) {
        self.verdicts.extend(other.verdicts);
        self.findings.extend(other.findings);
        for (page, entries) in other.events {
            self.events.entry(page).or_default().extend(entries);
        }
        self.aborted.extend(other.aborted);
        self.verdicts.sort();
        self.findings.sort();
        self.recount();
    }

    /// Whether the run has no counted failures
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.summary.total_failures == 0
    }

    /// Rules with at least one failure
    pub fn failing_rules(&self) -> impl Iterator<Item = &str> {
        self.failures_by_rule.keys().map(String::as_str)
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> MiradorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Convert into a result for a test runner
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::AssertionFailure`] for failing verdicts or
    /// aborted cases, otherwise [`MiradorError::UnexpectedConsoleEvent`] for
    /// the first failing console finding.
    pub fn into_result(self) -> MiradorResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let failed: Vec<String> = self
            .verdicts
            .iter()
            .filter(|v| v.is_failure())
            .map(|v| format!("{}/{}: {}", v.page, v.rule, v.message))
            .chain(self.aborted.iter().map(|(page, err)| format!("{page}: {err}")))
            .collect();
        if !failed.is_empty() {
            return Err(MiradorError::AssertionFailure {
                message: failed.join("; "),
            });
        }
        match self.findings.iter().find(|f| f.disallowed() > 0) {
            Some(f) => Err(MiradorError::UnexpectedConsoleEvent {
                rule: f.rule.clone(),
                found: f.matched.len(),
                max_allowed: f.max_allowed,
            }),
            None => Ok(self),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in &self.verdicts {
            writeln!(f, "{}: {v}", v.page)?;
            for o in &v.offenders {
                writeln!(f, "    - {} ({})", o.label, o.detail)?;
            }
        }
        for finding in &self.findings {
            writeln!(f, "{}: {finding}", finding.page)?;
            for e in &finding.matched {
                writeln!(f, "    - [{}] {}", e.kind, e.text)?;
            }
        }
        for (page, err) in &self.aborted {
            writeln!(f, "{page}: [ABORTED] {err}")?;
        }
        let s = &self.summary;
        write!(
            f,
            "{} verdicts: {} passed, {} failed, {} warnings; {} disallowed console events; {} total failures",
            s.verdicts, s.passed, s.failed, s.warnings, s.disallowed_events, s.total_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{EventKind, PageEvent};
    use crate::rule::{Check, Severity};
    use proptest::prelude::*;

    fn console_rule(max: usize) -> Rule {
        Rule::new(
            "console-errors",
            Check::ConsoleTextMatch {
                kinds: [EventKind::Error].into_iter().collect(),
                substrings: vec![],
            },
        )
        .allow(max)
    }

    fn errors(n: usize) -> EventLog {
        (0..n)
            .map(|i| PageEvent::new(EventKind::Error, format!("error {i}")))
            .collect()
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_failure_total_counts_errors_and_disallowed_events() {
            let mut agg = ReportAggregator::new("landing");
            agg.record(Verdict::pass("a", "ok"));
            agg.record(Verdict::fail("b", Severity::Error, "broken", "1 of 1"));
            agg.record(Verdict::fail("c", Severity::Warning, "meh", "1 of 1"));
            agg.record_events(&errors(3), &console_rule(0)).unwrap();
            let report = agg.summarize();
            assert_eq!(report.summary.passed, 1);
            assert_eq!(report.summary.failed, 1);
            assert_eq!(report.summary.warnings, 1);
            assert_eq!(report.summary.disallowed_events, 3);
            assert_eq!(report.summary.total_failures, 4);
            assert_eq!(report.failing_rules().collect::<Vec<_>>(), vec!["b", "c", "console-errors"]);
        }

        #[test]
        fn test_events_within_allowance_not_counted() {
            let mut agg = ReportAggregator::new("landing");
            agg.record_events(&errors(2), &console_rule(2)).unwrap();
            let report = agg.summarize();
            assert!(report.is_success());
            assert_eq!(report.summary.disallowed_events, 0);
        }

        #[test]
        fn test_verdicts_take_page_label() {
            let mut agg = ReportAggregator::new("register");
            agg.record(Verdict::pass("title", "ok"));
            assert_eq!(agg.summarize().verdicts[0].page, "register");
        }

        #[test]
        fn test_empty_report_succeeds() {
            let report = ReportAggregator::default().summarize();
            assert!(report.is_success());
            assert!(report.into_result().is_ok());
        }
    }

    mod result_tests {
        use super::*;

        #[test]
        fn test_assertion_failure_preferred() {
            let mut agg = ReportAggregator::new("landing");
            agg.record(Verdict::fail("b", Severity::Error, "broken", ""));
            agg.record_events(&errors(1), &console_rule(0)).unwrap();
            let err = agg.summarize().into_result().unwrap_err();
            assert!(matches!(err, MiradorError::AssertionFailure { .. }));
        }

        #[test]
        fn test_console_failure_surfaces() {
            let mut agg = ReportAggregator::new("landing");
            agg.record_events(&errors(2), &console_rule(0)).unwrap();
            let err = agg.summarize().into_result().unwrap_err();
            assert!(matches!(
                err,
                MiradorError::UnexpectedConsoleEvent {
                    found: 2,
                    max_allowed: 0,
                    ..
                }
            ));
        }

        #[test]
        fn test_warning_only_run_succeeds() {
            let mut agg = ReportAggregator::new("register");
            agg.record(Verdict::fail("submit", Severity::Warning, "no errors shown", ""));
            assert!(agg.summarize().into_result().is_ok());
        }

        #[test]
        fn test_aborted_case_counts() {
            let report = RunReport::aborted("menu", &MiradorError::collection("closed"));
            assert_eq!(report.summary.total_failures, 1);
            assert!(report.into_result().is_err());
        }
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_merge_recounts() {
            let mut a = ReportAggregator::new("landing");
            a.record(Verdict::fail("x", Severity::Error, "m", ""));
            let mut b = ReportAggregator::new("register");
            b.record(Verdict::fail("x", Severity::Error, "m", ""));
            b.attach_log(errors(1));
            let mut report = a.summarize();
            report.merge(b.summarize());
            assert_eq!(report.summary.failed, 2);
            assert_eq!(report.failures_by_rule["x"].len(), 2);
            assert_eq!(report.events["register"].len(), 1);
        }

        #[test]
        fn test_json_and_text() {
            let mut agg = ReportAggregator::new("landing");
            agg.record(Verdict::pass("a", "0 of 3 examined, 0 allowed"));
            let report = agg.summarize();
            let json = report.to_json().unwrap();
            let back: RunReport = serde_json::from_str(&json).unwrap();
            assert_eq!(back, report);
            assert!(report.to_string().contains("[PASS] a"));
        }
    }

    mod property_tests {
        use super::*;

        fn verdict() -> impl Strategy<Value = Verdict> {
            ("[a-d]", any::<bool>(), any::<bool>()).prop_map(|(rule, passed, warning)| {
                let severity = if warning { Severity::Warning } else { Severity::Error };
                if passed {
                    Verdict::pass(rule, "ok")
                } else {
                    Verdict::fail(rule, severity, "failed", "detail")
                }
            })
        }

        proptest! {
            #[test]
            fn prop_aggregation_is_order_independent(
                verdicts in prop::collection::vec(verdict(), 0..20),
                seed in any::<u64>(),
            ) {
                let mut forward = ReportAggregator::new("page");
                forward.record_all(verdicts.clone());

                let mut shuffled = verdicts;
                let len = shuffled.len();
                if len > 1 {
                    let rotate = (seed as usize) % len;
                    shuffled.rotate_left(rotate);
                    shuffled.reverse();
                }
                let mut backward = ReportAggregator::new("page");
                backward.record_all(shuffled);

                prop_assert_eq!(forward.summarize(), backward.summarize());
            }

            #[test]
            fn prop_failure_total_invariant(
                verdicts in prop::collection::vec(verdict(), 0..20),
                n_errors in 0usize..5,
                max in 0usize..5,
            ) {
                let mut agg = ReportAggregator::new("page");
                agg.record_all(verdicts.clone());
                agg.record_events(&errors(n_errors), &console_rule(max)).unwrap();
                let report = agg.summarize();
                let failing = verdicts.iter().filter(|v| v.is_failure()).count();
                let disallowed = if n_errors > max { n_errors } else { 0 };
                prop_assert_eq!(report.summary.total_failures, failing + disallowed);
            }
        }
    }
}
