//! Suites of page cases.
//!
//! A suite is a base URL plus page cases, loaded from YAML or built in.

use crate::driver::{EventKind, Readiness};
use crate::interaction::{Interaction, VALIDATION_ERROR_SELECTOR};
use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::rule::{Check, Rule, Severity};
use crate::snapshot::{ObservationSpec, Scope};
use crate::style::StyleProperty;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Base URL of the built-in suite
pub const DEFAULT_BASE_URL: &str = "http://kalm.lk/";

/// Transparent-background buttons tolerated on the landing page (fewer than 5)
pub const MAX_TRANSPARENT_BUTTONS: usize = 4;

/// Color-related console messages tolerated (fewer than 3)
pub const MAX_COLOR_CONSOLE_MESSAGES: usize = 2;

/// Font-related console errors tolerated
pub const MAX_FONT_CONSOLE_ERRORS: usize = 0;

/// Screenshot taken by the landing color case
pub const COLORS_SCREENSHOT: &str = "landing-page-colors.png";

/// Screenshot taken by the landing font case
pub const FONTS_SCREENSHOT: &str = "landing-page-fonts.png";

/// Call-to-action selectors on the landing page, keyed by rule suffix
pub const CTA_SELECTORS: [(&str, &str); 6] = [
    ("submit", "button:has-text(\"Submit\")"),
    ("click", "button:has-text(\"Click\")"),
    ("sign", "button:has-text(\"Sign\")"),
    ("get", "button:has-text(\"Get\")"),
    ("contact", "button:has-text(\"Contact\")"),
    ("role-button", "a[role=\"button\"]"),
];

/// A page to open and check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCase {
    /// Case name, unique within a suite
    pub name: String,
    /// Path joined onto the base URL, or an absolute URL
    #[serde(default = "root_path")]
    pub path: String,
    /// When the page counts as ready
    #[serde(default)]
    pub readiness: Readiness,
    /// Extra observations beyond what the rules need
    #[serde(default)]
    pub observe: ObservationSpec,
    /// Snapshot and console rules
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Interactions run after evaluation
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Screenshot path, relative to the artifacts directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

fn root_path() -> String {
    "/".to_string()
}

impl PageCase {
    /// Case for `path` with no rules
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            readiness: Readiness::default(),
            observe: ObservationSpec::default(),
            rules: Vec::new(),
            interactions: Vec::new(),
            screenshot: None,
        }
    }

    /// Set readiness
    #[must_use]
    pub const fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Add a rule
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add an interaction
    #[must_use]
    pub fn interaction(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    /// Set extra observations
    #[must_use]
    pub fn with_observe(mut self, observe: ObservationSpec) -> Self {
        self.observe = observe;
        self
    }

    /// Set the screenshot path
    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot = Some(path.into());
        self
    }

    /// Observation spec covering `observe` and every snapshot rule
    #[must_use]
    pub fn observation_spec(&self) -> ObservationSpec {
        let mut spec = self.observe.clone();
        for rule in self.rules.iter().filter(|r| !r.targets_events()) {
            spec.merge(&rule.requirements());
        }
        spec
    }

    /// Rules evaluated against the snapshot
    pub fn snapshot_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| !r.targets_events())
    }

    /// Rules evaluated against the event log
    pub fn console_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.targets_events())
    }

    /// Full URL of the case
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        if self.path.starts_with("http://") || self.path.starts_with("https://") {
            return self.path.clone();
        }
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Reject duplicate rule names and invalid rules
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> MiradorResult<()> {
        if self.name.trim().is_empty() {
            return Err(MiradorError::config("page case name must not be empty"));
        }
        let mut names = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !names.insert(rule.name.as_str()) {
                return Err(MiradorError::config(format!(
                    "duplicate rule '{}' in case '{}'",
                    rule.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Base URL plus page cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    /// Suite name
    pub name: String,
    /// URL page case paths are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page cases
    #[serde(default)]
    pub cases: Vec<PageCase>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Suite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            cases: Vec::new(),
        }
    }

    /// Add a case
    #[must_use]
    pub fn case(mut self, case: PageCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Parse and validate YAML
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or an invalid suite.
    pub fn from_yaml(yaml: &str) -> MiradorResult<Self> {
        let suite: Self = serde_yaml_ng::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load a suite file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> MiradorResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize as YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> MiradorResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Validate every case and reject duplicate case names
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> MiradorResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(MiradorError::config("base_url must not be empty"));
        }
        let mut names = HashSet::new();
        for case in &self.cases {
            case.validate()?;
            if !names.insert(case.name.as_str()) {
                return Err(MiradorError::config(format!(
                    "duplicate page case '{}'",
                    case.name
                )));
            }
        }
        Ok(())
    }

    /// Keep only cases whose name contains `pattern`
    #[must_use]
    pub fn filter(mut self, pattern: &str) -> Self {
        self.cases.retain(|c| c.name.contains(pattern));
        self
    }

    /// Total rules and interactions across cases
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.cases
            .iter()
            .map(|c| c.rules.len() + c.interactions.len())
            .sum()
    }

    /// Landing, menu and register checks against `base_url`
    #[must_use]
    pub fn builtin(base_url: impl Into<String>) -> Self {
        Self::new("landing-and-register", base_url)
            .case(landing_console())
            .case(landing_colors())
            .case(landing_ui_colors())
            .case(landing_fonts())
            .case(landing_buttons())
            .case(menu_links())
            .case(register_console())
            .case(register_form())
            .case(register_accessibility())
            .case(register_submit())
    }
}

fn kinds(list: &[EventKind]) -> BTreeSet<EventKind> {
    list.iter().copied().collect()
}

fn css(selector: &str) -> Locator {
    Locator::css(selector)
}

fn console_errors(name: &str) -> Rule {
    Rule::new(
        name,
        Check::ConsoleTextMatch {
            kinds: kinds(&[EventKind::Error, EventKind::PageError]),
            substrings: Vec::new(),
        },
    )
    .with_message("Console errors on page")
}

fn landing_console() -> PageCase {
    PageCase::new("landing-console", "/")
        .rule(console_errors("console-errors"))
        .rule(Rule::new("title", Check::TitleNonEmpty))
}

fn landing_colors() -> PageCase {
    PageCase::new("landing-colors", "/")
        .rule(Rule::new(
            "no-transparent-text",
            Check::NoTransparentText {
                selector: css("p, h1, h2, h3, span"),
                leaf_text: false,
            },
        ))
        .rule(
            Rule::new(
                "button-background",
                Check::BackgroundPresence {
                    selector: css("button, a, div"),
                    leaf_text: false,
                },
            )
            .allow(MAX_TRANSPARENT_BUTTONS),
        )
        .rule(Rule::new(
            "button-colors",
            Check::SetNonEmpty {
                selector: css("button"),
                property: StyleProperty::BackgroundColor,
            },
        ))
        .rule(Rule::new(
            "link-colors",
            Check::SetNonEmpty {
                selector: css("a"),
                property: StyleProperty::Color,
            },
        ))
        .rule(Rule::new(
            "heading-colors",
            Check::SetNonEmpty {
                selector: css("h1, h2, h3, h4, h5, h6"),
                property: StyleProperty::Color,
            },
        ))
        .rule(Rule::new(
            "same-color-contrast",
            Check::SameColorContrast {
                selector: css("body *"),
                leaf_text: true,
            },
        ))
        .rule(Rule::new(
            "color-palette",
            Check::SetNonEmpty {
                selector: css("*"),
                property: StyleProperty::Color,
            },
        ))
        .rule(
            Rule::new(
                "color-console-messages",
                Check::ConsoleTextMatch {
                    kinds: kinds(&[EventKind::Error, EventKind::Warning]),
                    substrings: vec!["color".to_string(), "Color".to_string()],
                },
            )
            .allow(MAX_COLOR_CONSOLE_MESSAGES),
        )
        .with_observe(ObservationSpec::new().properties([
            StyleProperty::BackgroundColor,
            StyleProperty::BorderColor,
        ]))
        .with_screenshot(COLORS_SCREENSHOT)
}

fn landing_ui_colors() -> PageCase {
    PageCase::new("landing-ui-colors", "/")
        .rule(Rule::new(
            "ui-transparent-text",
            Check::NoTransparentText {
                selector: css("body *"),
                leaf_text: false,
            },
        ))
        .rule(Rule::new(
            "ui-button-background",
            Check::BackgroundPresence {
                selector: css("body *"),
                leaf_text: false,
            },
        ))
}

fn landing_fonts() -> PageCase {
    PageCase::new("landing-fonts", "/")
        .rule(Rule::new("fonts-ready", Check::FontsReady))
        .rule(Rule::new(
            "body-font-family",
            Check::FontFamilyDefined {
                selector: css("body"),
                leaf_text: false,
            },
        ))
        .rule(Rule::new(
            "body-text-color",
            Check::NoTransparentText {
                selector: css("body"),
                leaf_text: false,
            },
        ))
        .rule(Rule::new(
            "heading-font-size",
            Check::NonZero {
                selector: css("h1"),
                property: StyleProperty::FontSize,
                leaf_text: false,
            },
        ))
        .rule(
            Rule::new(
                "heading-font-weight",
                Check::SetNonEmpty {
                    selector: css("h1"),
                    property: StyleProperty::FontWeight,
                },
            )
            .warning(),
        )
        .rule(Rule::new(
            "paragraph-line-height",
            Check::NonZero {
                selector: css("p"),
                property: StyleProperty::LineHeight,
                leaf_text: false,
            },
        ))
        .rule(Rule::new(
            "text-font-family",
            Check::FontFamilyDefined {
                selector: css("body *"),
                leaf_text: true,
            },
        ))
        .rule(Rule::new(
            "text-font-size",
            Check::NonZero {
                selector: css("body *"),
                property: StyleProperty::FontSize,
                leaf_text: true,
            },
        ))
        .rule(Rule::new(
            "text-line-height",
            Check::NonZero {
                selector: css("body *"),
                property: StyleProperty::LineHeight,
                leaf_text: true,
            },
        ))
        .rule(Rule::new("stylesheets", Check::StylesheetsLoaded).warning())
        .rule(
            Rule::new(
                "font-console-errors",
                Check::ConsoleTextMatch {
                    kinds: kinds(&[EventKind::Error]),
                    substrings: vec!["font".to_string()],
                },
            )
            .allow(MAX_FONT_CONSOLE_ERRORS),
        )
        .with_screenshot(FONTS_SCREENSHOT)
}

fn landing_buttons() -> PageCase {
    let mut observe = ObservationSpec::new();
    let mut case = PageCase::new("landing-buttons", "/");
    for (suffix, selector) in CTA_SELECTORS {
        observe = observe.count(selector);
        case = case.rule(
            Rule::new(
                format!("cta-{suffix}-enabled"),
                Check::FirstEnabled {
                    selector: Locator::from(selector),
                },
            )
            .warning(),
        );
    }
    case.with_observe(observe)
        .interaction(Interaction::ClickEach {
            selector: css("button"),
            timeout_ms: None,
            severity: Severity::Warning,
        })
}

fn menu_links() -> PageCase {
    PageCase::new("menu-links", "/")
        .with_readiness(Readiness::Load)
        .interaction(Interaction::FollowLink {
            selector: Locator::text("About"),
            url_pattern: "about".to_string(),
            timeout_ms: None,
        })
        .interaction(Interaction::FollowLink {
            selector: Locator::text("Contact"),
            url_pattern: "contact".to_string(),
            timeout_ms: None,
        })
}

fn register_console() -> PageCase {
    PageCase::new("register-console", "/register")
        .rule(console_errors("console-errors"))
        .rule(
            Rule::new(
                "console-warnings",
                Check::ConsoleTextMatch {
                    kinds: kinds(&[EventKind::Warning]),
                    substrings: Vec::new(),
                },
            )
            .warning(),
        )
        .rule(Rule::new("title", Check::TitleNonEmpty))
}

fn register_form() -> PageCase {
    PageCase::new("register-form", "/register")
        .with_observe(
            ObservationSpec::new()
                .scope(Scope::all("input"))
                .scope(Scope::all("button"))
                .attributes(["type", "name", "placeholder", "required", "disabled"]),
        )
        .rule(Rule::new("form-present", Check::Present { selector: css("form") }).warning())
}

fn register_accessibility() -> PageCase {
    PageCase::new("register-accessibility", "/register")
        .with_observe(
            ObservationSpec::new()
                .count("label")
                .count("h1")
                .count("h2")
                .count("[aria-label]"),
        )
        .rule(
            Rule::new(
                "inputs-without-id",
                Check::Absent {
                    selector: css("input:not([id])"),
                },
            )
            .warning(),
        )
        .rule(
            Rule::new(
                "images-without-alt",
                Check::Absent {
                    selector: css("img:not([alt])"),
                },
            )
            .warning(),
        )
}

fn register_submit() -> PageCase {
    PageCase::new("register-submit", "/register").interaction(Interaction::SubmitProbe {
        submit: css("button[type=\"submit\"]"),
        errors: css(VALIDATION_ERROR_SELECTOR),
        timeout_ms: None,
        settle_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    mod builtin_tests {
        use super::*;

        #[test]
        fn test_builtin_is_valid() {
            let suite = Suite::builtin(DEFAULT_BASE_URL);
            assert!(suite.validate().is_ok());
            assert_eq!(suite.cases.len(), 10);
        }

        #[test]
        fn test_builtin_thresholds() {
            let suite = Suite::builtin(DEFAULT_BASE_URL);
            let colors = suite.cases.iter().find(|c| c.name == "landing-colors").unwrap();
            let bg = colors.rules.iter().find(|r| r.name == "button-background").unwrap();
            assert_eq!(bg.max_allowed, 4);
            let console = colors
                .rules
                .iter()
                .find(|r| r.name == "color-console-messages")
                .unwrap();
            assert_eq!(console.max_allowed, 2);
        }

        #[test]
        fn test_landing_buttons_checks_each_cta() {
            let case = landing_buttons();
            assert_eq!(case.rules.len(), CTA_SELECTORS.len());
            assert!(case.rules.iter().all(|r| r.severity == Severity::Warning));
            let spec = case.observation_spec();
            assert!(spec.counts.contains(&Locator::from("button:has-text(\"Click\")")));
            assert!(spec
                .scopes
                .contains(&Scope::all(Locator::from("a[role=\"button\"]"))));
            let names: Vec<_> = case.rules.iter().map(|r| r.name.as_str()).collect();
            assert!(names.contains(&"cta-sign-enabled"));
        }

        #[test]
        fn test_builtin_yaml_round_trip() {
            let suite = Suite::builtin("https://example.com");
            let yaml = suite.to_yaml().unwrap();
            assert_eq!(Suite::from_yaml(&yaml).unwrap(), suite);
        }
    }

    mod case_tests {
        use super::*;

        #[test]
        fn test_url_join() {
            let case = PageCase::new("r", "/register");
            assert_eq!(case.url("http://kalm.lk/"), "http://kalm.lk/register");
            assert_eq!(case.url("http://kalm.lk"), "http://kalm.lk/register");
            assert_eq!(PageCase::new("root", "/").url("http://kalm.lk/"), "http://kalm.lk/");
            let abs = PageCase::new("abs", "https://other.test/x");
            assert_eq!(abs.url("http://kalm.lk/"), "https://other.test/x");
        }

        #[test]
        fn test_observation_spec_covers_rules() {
            let case = landing_colors();
            let spec = case.observation_spec();
            assert!(spec.scopes.contains(&Scope::leaf_text("body *")));
            assert!(spec.scopes.contains(&Scope::all("button, a, div")));
            assert!(spec.properties.contains(&StyleProperty::BorderColor));
            assert!(spec.properties.contains(&StyleProperty::Color));
        }

        #[test]
        fn test_rule_partition() {
            let case = landing_colors();
            assert_eq!(case.console_rules().count(), 1);
            assert_eq!(case.snapshot_rules().count(), 7);
        }

        #[test]
        fn test_duplicate_rule_names_rejected() {
            let case = PageCase::new("dup", "/")
                .rule(Rule::new("t", Check::TitleNonEmpty))
                .rule(Rule::new("t", Check::FontsReady));
            assert!(case.validate().is_err());
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_minimal_yaml() {
            let yaml = r#"
name: smoke
base_url: https://example.com
cases:
  - name: home
    rules:
      - name: errors
        check: console-text-match
        kinds: [error]
      - name: paragraphs
        check: no-transparent-text
        selector: p
    interactions:
      - action: follow-link
        selector: text=About
        url_pattern: about
"#;
            let suite = Suite::from_yaml(yaml).unwrap();
            let case = &suite.cases[0];
            assert_eq!(case.path, "/");
            assert_eq!(case.readiness, Readiness::NetworkIdle);
            assert_eq!(case.rules.len(), 2);
            assert_eq!(case.interactions.len(), 1);
        }

        #[test]
        fn test_duplicate_cases_rejected() {
            let yaml = "name: s\ncases:\n  - name: a\n  - name: a\n";
            assert!(matches!(
                Suite::from_yaml(yaml),
                Err(MiradorError::Config { .. })
            ));
        }

        #[test]
        fn test_filter() {
            let suite = Suite::builtin(DEFAULT_BASE_URL).filter("register");
            assert_eq!(suite.cases.len(), 4);
        }
    }
}
