//! Declarative rules and their evaluation.
//!
//! A [`Rule`] pairs a name with one [`Check`] from a closed set. Snapshot
//! checks are evaluated with [`Rule::evaluate`]; the console check is
//! evaluated against an [`EventLog`] with [`Rule::evaluate_events`].
//! Evaluation is pure: the same rule over the same snapshot always yields the
//! same verdict.

use crate::driver::EventKind;
use crate::locator::Locator;
use crate::recorder::{EventLog, EventLogEntry};
use crate::result::{MiradorError, MiradorResult};
use crate::snapshot::{ElementObservation, ObservationSpec, PageSnapshot, Scope};
use crate::style::{
    is_transparent, is_zero_px, StyleProperty, RGB_BLACK, RGB_WHITE, TRANSPARENT_RGBA,
};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// Rule definition
// =============================================================================

/// How a failing rule counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Counts toward the run's failure total
    #[default]
    Error,
    /// Reported only
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// The closed set of checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "kebab-case")]
pub enum Check {
    /// Text color is `rgba(0, 0, 0, 0)` or `transparent`
    NoTransparentText {
        /// Elements to examine
        selector: Locator,
        /// Only leaf text elements
        #[serde(default)]
        leaf_text: bool,
    },
    /// Buttons and `.btn` elements with a transparent background
    BackgroundPresence {
        /// Elements to examine
        selector: Locator,
        /// Only leaf text elements
        #[serde(default)]
        leaf_text: bool,
    },
    /// Property computed as exactly `0px`
    NonZero {
        /// Elements to examine
        selector: Locator,
        /// Property to read
        property: StyleProperty,
        /// Only leaf text elements
        #[serde(default)]
        leaf_text: bool,
    },
    /// No value of the property observed at all
    SetNonEmpty {
        /// Elements to examine
        selector: Locator,
        /// Property to read
        property: StyleProperty,
    },
    /// Text and background both black or both white
    SameColorContrast {
        /// Elements to examine
        selector: Locator,
        /// Only leaf text elements
        #[serde(default)]
        leaf_text: bool,
    },
    /// `font-family` empty or `inherit`
    FontFamilyDefined {
        /// Elements to examine
        selector: Locator,
        /// Only leaf text elements
        #[serde(default)]
        leaf_text: bool,
    },
    /// Every match is an offender
    Absent {
        /// Elements that must not exist
        selector: Locator,
    },
    /// At least one element must match
    Present {
        /// Elements that must exist
        selector: Locator,
    },
    /// The first match, if any, must be enabled
    FirstEnabled {
        /// Elements to look for
        selector: Locator,
    },
    /// Document title must be non-empty
    TitleNonEmpty,
    /// Current URL must match a case-insensitive pattern
    UrlMatches {
        /// Regular expression
        pattern: String,
    },
    /// Stylesheets whose rules could not be read
    StylesheetsLoaded,
    /// `document.fonts.ready` must be truthy
    FontsReady,
    /// Console entries of the given kinds containing one of the substrings
    ConsoleTextMatch {
        /// Event kinds to consider
        kinds: BTreeSet<EventKind>,
        /// Case-sensitive substrings; empty matches every entry
        #[serde(default)]
        substrings: Vec<String>,
    },
}

impl Check {
    /// Observation scope the check reads, if any
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        let (selector, leaf) = match self {
            Self::NoTransparentText { selector, leaf_text }
            | Self::BackgroundPresence { selector, leaf_text }
            | Self::NonZero {
                selector, leaf_text, ..
            }
            | Self::SameColorContrast { selector, leaf_text }
            | Self::FontFamilyDefined { selector, leaf_text } => (selector, *leaf_text),
            Self::SetNonEmpty { selector, .. }
            | Self::Absent { selector }
            | Self::Present { selector }
            | Self::FirstEnabled { selector } => (selector, false),
            _ => return None,
        };
        Some(Scope {
            locator: selector.clone(),
            leaf_text_only: leaf,
        })
    }

    /// Computed properties the check reads
    #[must_use]
    pub fn properties(&self) -> Vec<StyleProperty> {
        match self {
            Self::NoTransparentText { .. } => vec![StyleProperty::Color],
            Self::BackgroundPresence { .. } => vec![StyleProperty::BackgroundColor],
            Self::NonZero { property, .. } | Self::SetNonEmpty { property, .. } => vec![*property],
            Self::SameColorContrast { .. } => {
                vec![StyleProperty::Color, StyleProperty::BackgroundColor]
            }
            Self::FontFamilyDefined { .. } => vec![StyleProperty::FontFamily],
            _ => Vec::new(),
        }
    }

    /// Whether the check reads the event log rather than a snapshot
    #[must_use]
    pub const fn targets_events(&self) -> bool {
        matches!(self, Self::ConsoleTextMatch { .. })
    }

    fn default_message(&self) -> String {
        match self {
            Self::NoTransparentText { .. } => "Transparent text color".to_string(),
            Self::BackgroundPresence { .. } => "Button with transparent background".to_string(),
            Self::NonZero { property, .. } => format!("Zero {property}"),
            Self::SetNonEmpty { property, .. } => format!("No {property} values observed"),
            Self::SameColorContrast { .. } => "Same text and background color".to_string(),
            Self::FontFamilyDefined { .. } => "Missing font family".to_string(),
            Self::Absent { selector } => format!("Unexpected {selector} elements"),
            Self::Present { selector } => format!("No {selector} elements"),
            Self::FirstEnabled { selector } => format!("First {selector} is disabled"),
            Self::TitleNonEmpty => "Empty document title".to_string(),
            Self::UrlMatches { pattern } => format!("URL does not match /{pattern}/i"),
            Self::StylesheetsLoaded => "Unreadable stylesheet".to_string(),
            Self::FontsReady => "Fonts not ready".to_string(),
            Self::ConsoleTextMatch { .. } => "Unexpected console messages".to_string(),
        }
    }
}

/// A named check with its allowance and severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique name within a page case
    pub name: String,
    /// What to check
    #[serde(flatten)]
    pub check: Check,
    /// Offenders (or matching events) tolerated before the rule fails
    #[serde(default)]
    pub max_allowed: usize,
    /// How a failure counts
    #[serde(default)]
    pub severity: Severity,
    /// Failure message; derived from the check when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Rule {
    /// Create an error-severity rule allowing no offenders
    #[must_use]
    pub fn new(name: impl Into<String>, check: Check) -> Self {
        Self {
            name: name.into(),
            check,
            max_allowed: 0,
            severity: Severity::Error,
            message: None,
        }
    }

    /// Tolerate up to `n` offenders
    #[must_use]
    pub const fn allow(mut self, n: usize) -> Self {
        self.max_allowed = n;
        self
    }

    /// Downgrade to warning severity
    #[must_use]
    pub const fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    /// Set the failure message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Failure message
    #[must_use]
    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.check.default_message())
    }

    /// Whether the rule reads the event log
    #[must_use]
    pub const fn targets_events(&self) -> bool {
        self.check.targets_events()
    }

    /// What the collector must gather for this rule
    #[must_use]
    pub fn requirements(&self) -> ObservationSpec {
        let mut spec = ObservationSpec::new().properties(self.check.properties());
        if let Some(scope) = self.check.scope() {
            spec.add_scope(scope);
        }
        spec
    }

    /// Reject rules that can never evaluate
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name, an invalid URL pattern, or a
    /// console check without kinds.
    pub fn validate(&self) -> MiradorResult<()> {
        if self.name.trim().is_empty() {
            return Err(MiradorError::config("rule name must not be empty"));
        }
        match &self.check {
            Check::UrlMatches { pattern } => {
                RegexBuilder::new(pattern).case_insensitive(true).build()?;
            }
            Check::ConsoleTextMatch { kinds, .. } if kinds.is_empty() => {
                return Err(MiradorError::config(format!(
                    "rule '{}' matches no event kinds",
                    self.name
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// Evaluate a snapshot check
    #[must_use]
    pub fn evaluate(&self, snapshot: &PageSnapshot) -> Verdict {
        match &self.check {
            Check::NoTransparentText { .. } => self.per_element(snapshot, |el| {
                let color = el.style(StyleProperty::Color)?;
                is_transparent(color).then(|| format!("color: {color}"))
            }),
            Check::BackgroundPresence { .. } => self.per_element(snapshot, |el| {
                if !el.is_interactive() {
                    return None;
                }
                let bg = el.style(StyleProperty::BackgroundColor)?;
                (bg == TRANSPARENT_RGBA).then(|| format!("background-color: {bg}"))
            }),
            Check::NonZero { property, .. } => self.per_element(snapshot, |el| {
                let value = el.style(*property)?;
                // an unset font size collapses the text too
                let unset = value.is_empty() && *property == StyleProperty::FontSize;
                (unset || is_zero_px(value)).then(|| format!("{property}: {value:?}"))
            }),
            Check::SameColorContrast { .. } => self.per_element(snapshot, |el| {
                let color = el.style(StyleProperty::Color)?;
                let bg = el.style(StyleProperty::BackgroundColor)?;
                let same = (color == RGB_BLACK && bg == RGB_BLACK)
                    || (color == RGB_WHITE && bg == RGB_WHITE);
                same.then(|| format!("color: {color}, background-color: {bg}"))
            }),
            Check::FontFamilyDefined { .. } => self.per_element(snapshot, |el| {
                let family = el.style(StyleProperty::FontFamily).unwrap_or("");
                (family.is_empty() || family == "inherit")
                    .then(|| format!("font-family: {family:?}"))
            }),
            Check::Absent { .. } => self.per_element(snapshot, |_| Some("present".to_string())),
            Check::SetNonEmpty { selector, property } => {
                let scope = Scope::all(selector.clone());
                let values = snapshot.distinct_values(&scope, *property);
                let examined = snapshot.elements(&scope).len();
                let detail = format!("{} distinct {property} values", values.len());
                self.document_level(!values.is_empty(), examined, detail)
            }
            Check::Present { selector } => {
                let examined = snapshot.elements(&Scope::all(selector.clone())).len();
                self.document_level(examined > 0, examined, format!("{examined} matched"))
            }
            Check::FirstEnabled { selector } => {
                let elements = snapshot.elements(&Scope::all(selector.clone()));
                let offenders = elements
                    .first()
                    .filter(|el| !el.enabled)
                    .map(|el| Offender {
                        subject: Subject::Element(el.node_id),
                        label: el.label(),
                        detail: "disabled".to_string(),
                    })
                    .into_iter()
                    .collect();
                self.with_offenders(elements.len().min(1), offenders)
            }
            Check::TitleNonEmpty => {
                let title = snapshot.title();
                self.document_level(!title.is_empty(), 1, format!("title: {title:?}"))
            }
            Check::UrlMatches { pattern } => {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(re) => {
                        let url = snapshot.url();
                        self.document_level(re.is_match(url), 1, format!("url: {url}"))
                    }
                    Err(e) => self.document_level(false, 0, format!("invalid pattern: {e}")),
                }
            }
            Check::FontsReady => {
                let fonts = snapshot.fonts();
                self.document_level(
                    fonts.ready,
                    1,
                    format!("{} fonts, ready: {}", fonts.count, fonts.ready),
                )
            }
            Check::StylesheetsLoaded => {
                let offenders = snapshot
                    .stylesheets()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, sheet)| {
                        sheet.error.as_ref().map(|err| Offender {
                            subject: Subject::Stylesheet(i),
                            label: sheet.name().to_string(),
                            detail: err.clone(),
                        })
                    })
                    .collect();
                self.with_offenders(snapshot.stylesheets().len(), offenders)
            }
            Check::ConsoleTextMatch { .. } => self.document_level(
                false,
                0,
                "console rules evaluate against the event log".to_string(),
            ),
        }
    }

    /// Evaluate the console check against an event log
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the rule is a snapshot check.
    pub fn evaluate_events(&self, log: &EventLog) -> MiradorResult<EventFinding> {
        let Check::ConsoleTextMatch { kinds, substrings } = &self.check else {
            return Err(MiradorError::config(format!(
                "rule '{}' does not read the event log",
                self.name
            )));
        };
        let matched = log.matching(kinds, substrings);
        Ok(EventFinding {
            page: String::new(),
            rule: self.name.clone(),
            severity: self.severity,
            passed: matched.len() <= self.max_allowed,
            message: self.message(),
            max_allowed: self.max_allowed,
            matched,
        })
    }

    fn per_element<F>(&self, snapshot: &PageSnapshot, predicate: F) -> Verdict
    where
        F: Fn(&ElementObservation) -> Option<String>,
    {
        let Some(scope) = self.check.scope() else {
            return self.document_level(false, 0, "check has no selector".to_string());
        };
        let elements = snapshot.elements(&scope);
        let offenders = elements
            .iter()
            .filter_map(|el| {
                predicate(el).map(|detail| Offender {
                    subject: Subject::Element(el.node_id),
                    label: el.label(),
                    detail,
                })
            })
            .collect();
        self.with_offenders(elements.len(), offenders)
    }

    fn with_offenders(&self, examined: usize, offenders: Vec<Offender>) -> Verdict {
        let mut unique: BTreeMap<Subject, Offender> = BTreeMap::new();
        for offender in offenders {
            unique.entry(offender.subject).or_insert(offender);
        }
        let offenders: Vec<Offender> = unique.into_values().collect();
        let passed = offenders.len() <= self.max_allowed;
        let detail = format!(
            "{} of {examined} examined, {} allowed",
            offenders.len(),
            self.max_allowed
        );
        self.verdict(passed, examined, offenders, detail)
    }

    fn document_level(&self, passed: bool, examined: usize, detail: String) -> Verdict {
        self.verdict(passed, examined, Vec::new(), detail)
    }

    fn verdict(&self, passed: bool, examined: usize, offenders: Vec<Offender>, detail: String) -> Verdict {
        Verdict {
            page: String::new(),
            rule: self.name.clone(),
            passed,
            severity: self.severity,
            message: self.message(),
            detail,
            examined,
            max_allowed: self.max_allowed,
            offenders,
        }
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// What an offender is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "id")]
pub enum Subject {
    /// Element by node identity
    Element(u64),
    /// Stylesheet by document position
    Stylesheet(usize),
}

/// One element (or stylesheet) failing a check
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offender {
    /// Identity
    pub subject: Subject,
    /// Short human-readable label
    pub label: String,
    /// Offending values
    pub detail: String,
}

/// Outcome of one rule (or one interaction)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Verdict {
    /// Page case the verdict belongs to
    #[serde(default)]
    pub page: String,
    /// Rule name
    pub rule: String,
    /// Whether the rule held
    pub passed: bool,
    /// How a failure counts
    pub severity: Severity,
    /// Failure message
    pub message: String,
    /// Diagnostic summary
    pub detail: String,
    /// Elements (or items) examined
    pub examined: usize,
    /// Allowance applied
    pub max_allowed: usize,
    /// Distinct offenders ordered by identity
    pub offenders: Vec<Offender>,
}

impl Verdict {
    /// A passing verdict not tied to a rule definition
    #[must_use]
    pub fn pass(rule: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::outcome(rule, true, Severity::Error, String::new(), detail)
    }

    /// A failing verdict not tied to a rule definition
    #[must_use]
    pub fn fail(
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::outcome(rule, false, severity, message.into(), detail)
    }

    fn outcome(
        rule: impl Into<String>,
        passed: bool,
        severity: Severity,
        message: String,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            page: String::new(),
            rule: rule.into(),
            passed,
            severity,
            message,
            detail: detail.into(),
            examined: 1,
            max_allowed: 0,
            offenders: Vec::new(),
        }
    }

    /// Failed and counts toward the run's failure total
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }

    /// Failed with warning severity
    #[must_use]
    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.passed, self.severity) {
            (true, _) => "PASS",
            (false, Severity::Error) => "FAIL",
            (false, Severity::Warning) => "WARN",
        };
        write!(f, "[{status}] {}", self.rule)?;
        if !self.passed && !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        write!(f, " ({})", self.detail)
    }
}

/// Outcome of a console rule over an event log
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventFinding {
    /// Page case the finding belongs to
    #[serde(default)]
    pub page: String,
    /// Rule name
    pub rule: String,
    /// How a failure counts
    pub severity: Severity,
    /// Whether the match count stayed within the allowance
    pub passed: bool,
    /// Failure message
    pub message: String,
    /// Allowance applied
    pub max_allowed: usize,
    /// Matching entries in emission order
    pub matched: Vec<EventLogEntry>,
}

impl EventFinding {
    /// Entries counted toward the run's failure total
    #[must_use]
    pub fn disallowed(&self) -> usize {
        if !self.passed && self.severity == Severity::Error {
            self.matched.len()
        } else {
            0
        }
    }
}

impl fmt::Display for EventFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.passed, self.severity) {
            (true, _) => "PASS",
            (false, Severity::Error) => "FAIL",
            (false, Severity::Warning) => "WARN",
        };
        write!(
            f,
            "[{status}] {}: {} matching, {} allowed",
            self.rule,
            self.matched.len(),
            self.max_allowed
        )
    }
}
