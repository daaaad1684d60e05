//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use mirador::{RunReport, Severity, Suite};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output format for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON report
    Json,
}

/// Progress reporter for suite execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` cases
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Mark one case finished
    pub fn case_done(&self, name: &str, report: &RunReport) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
            pb.set_message(name.to_string());
        }
        if report.is_success() {
            if self.progress_bar.is_none() {
                self.success(name);
            }
        } else {
            let message = format!("{name} ({} failures)", report.summary.total_failures);
            match &self.progress_bar {
                Some(pb) => pb.suspend(|| self.failure(&message)),
                None => self.failure(&message),
            }
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print every failing or warning verdict and finding, grouped by page
    pub fn report(&self, report: &RunReport) {
        for (page, error) in &report.aborted {
            self.failure(&format!("{page}: aborted: {error}"));
        }
        for v in report.verdicts.iter().filter(|v| !v.passed) {
            let line = format!("{}/{}: {} ({})", v.page, v.rule, v.message, v.detail);
            match v.severity {
                Severity::Error => self.failure(&line),
                Severity::Warning => self.warning(&line),
            }
            if self.quiet {
                continue;
            }
            for o in &v.offenders {
                let _ = self.term.write_line(&format!("    - {} ({})", o.label, o.detail));
            }
        }
        for f in report.findings.iter().filter(|f| !f.passed) {
            let line = format!("{}/{}: {f}", f.page, f.message);
            match f.severity {
                Severity::Error => self.failure(&line),
                Severity::Warning => self.warning(&line),
            }
            if self.quiet {
                continue;
            }
            for entry in &f.matched {
                let _ = self.term.write_line(&format!("    - [{}] {}", entry.kind, entry.text));
            }
        }
    }

    /// Print run summary
    pub fn summary(&self, report: &RunReport, duration: Duration) {
        let s = &report.summary;
        if self.quiet && s.total_failures == 0 {
            return;
        }

        let _ = self.term.write_line("");
        let duration_secs = duration.as_secs_f64();
        let aborted = report.aborted.len();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let warn_style = Style::new().yellow();

            let status = if s.total_failures > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} checks in {:.2}s ({} passed, {} failed, {} warnings, {} disallowed events, {} aborted)",
                status,
                s.verdicts + s.findings,
                duration_secs,
                passed_style.apply_to(s.passed),
                if s.failed > 0 {
                    failed_style.apply_to(s.failed).to_string()
                } else {
                    s.failed.to_string()
                },
                warn_style.apply_to(s.warnings),
                s.disallowed_events,
                aborted
            ));
        } else {
            let status = if s.total_failures > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {} checks in {duration_secs:.2}s ({} passed, {} failed, {} warnings, {} disallowed events, {aborted} aborted)",
                s.verdicts + s.findings,
                s.passed,
                s.failed,
                s.warnings,
                s.disallowed_events
            ));
        }
    }
}

/// Render a suite as one line per case followed by its rules and interactions
#[must_use]
pub fn render_outline(suite: &Suite) -> String {
    let mut out = format!("{} ({})\n", suite.name, suite.base_url);
    for case in &suite.cases {
        out.push_str(&format!(
            "{} {} [{}]\n",
            case.name,
            case.url(&suite.base_url),
            case.readiness
        ));
        for rule in &case.rules {
            out.push_str(&format!(
                "    rule {} (max {}, {})\n",
                rule.name, rule.max_allowed, rule.severity
            ));
        }
        for interaction in &case.interactions {
            out.push_str(&format!("    {interaction}\n"));
        }
    }
    out
}
