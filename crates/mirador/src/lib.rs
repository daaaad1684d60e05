//! Mirador: Declarative Page Observation and Assertion Harness
//!
//! Mirador (Spanish: "lookout") opens a page through an injected driver,
//! records what the page logs, reads a structured snapshot of computed
//! styles and DOM state, and evaluates declarative rules over both.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        MIRADOR Architecture                          │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐   │
//! │  │ Recorder   │   │ Collector  │   │ Rule       │   │ Report     │   │
//! │  │ (console,  │──►│ (snapshot) │──►│ Evaluator  │──►│ Aggregator │   │
//! │  │ pageerror) │   │            │   │            │   │            │   │
//! │  └────────────┘   └────────────┘   └────────────┘   └────────────┘   │
//! │         ▲                ▲                                           │
//! │         └──── PageDriver (ChromiumDriver │ MockDriver) ──────────────┤
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mirador::{HarnessConfig, MockDriver, PageSession, Suite};
//!
//! # async fn run() -> mirador::MiradorResult<()> {
//! let suite = Suite::builtin("https://example.com/");
//! let config = HarnessConfig::default();
//! let mut driver = MockDriver::new();
//! for case in &suite.cases {
//!     let report = PageSession::new(&mut driver, &config, &suite.base_url)
//!         .run(case)
//!         .await?;
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod aggregator;
mod browser;
mod collector;
#[allow(clippy::missing_errors_doc)]
mod driver;
mod harness;
mod interaction;
mod locator;
mod recorder;
mod result;
mod rule;
mod snapshot;
mod style;
mod suite;

pub use aggregator::{Failure, ReportAggregator, RunReport, Summary};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumDriver};
pub use collector::collect;
pub use driver::{
    DocumentState, ElementQuery, EventKind, EventStream, FontStatus, MockDriver, PageDriver,
    PageEvent, RawElement, Readiness, StylesheetInfo,
};
pub use harness::{HarnessConfig, PageSession, DEFAULT_NAVIGATION_TIMEOUT};
pub use interaction::{
    click_each, click_once, follow_link, probe_submission, Bounds, Interaction,
    DEFAULT_CLICK_TIMEOUT, DEFAULT_SETTLE, DEFAULT_SUBMIT_TIMEOUT, VALIDATION_ERROR_SELECTOR,
};
pub use locator::Locator;
pub use recorder::{EventLog, EventLogEntry, EventRecorder, RecorderState, Recording};
pub use result::{MiradorError, MiradorResult};
pub use rule::{Check, EventFinding, Offender, Rule, Severity, Subject, Verdict};
pub use snapshot::{ElementObservation, ObservationSpec, PageSnapshot, Scope, LABEL_TEXT_LEN};
pub use style::{
    is_transparent, is_zero_px, StyleProperty, RGB_BLACK, RGB_WHITE, TRANSPARENT_KEYWORD,
    TRANSPARENT_RGBA, ZERO_PX,
};
pub use suite::{
    PageCase, Suite, COLORS_SCREENSHOT, CTA_SELECTORS, DEFAULT_BASE_URL, FONTS_SCREENSHOT,
    MAX_COLOR_CONSOLE_MESSAGES, MAX_FONT_CONSOLE_ERRORS, MAX_TRANSPARENT_BUTTONS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::aggregator::*;
    pub use super::browser::*;
    pub use super::collector::*;
    pub use super::driver::*;
    pub use super::harness::*;
    pub use super::interaction::*;
    pub use super::locator::*;
    pub use super::recorder::*;
    pub use super::result::*;
    pub use super::rule::*;
    pub use super::snapshot::*;
    pub use super::style::*;
    pub use super::suite::*;
}
