//! PageDriver - Abstract Browser Page Trait
//!
//! The harness treats the browser as an injected capability. Everything it
//! needs from a page goes through [`PageDriver`]:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  PageDriver (Abstract Trait)                                      │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────┐        ┌─────────────────────────┐   │
//! │  │  ChromiumDriver         │        │  MockDriver             │   │
//! │  │  (feature = "browser")  │        │  (unit tests)           │   │
//! │  │  CDP via chromiumoxide  │        │  scripted DOM + events  │   │
//! │  └─────────────────────────┘        └─────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A driver is used by one logical operation at a time; every mutating call
//! takes `&mut self`.

use crate::locator::Locator;
use crate::result::{MiradorError, MiradorResult};
use crate::style::StyleProperty;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Condition a page must reach before it may be observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    /// Load event fired and no network activity for 500ms
    #[default]
    NetworkIdle,
    /// Load event fired
    Load,
    /// Load event fired, then a fixed wait in milliseconds
    Delay(u64),
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkIdle => f.write_str("network-idle"),
            Self::Load => f.write_str("load"),
            Self::Delay(ms) => write!(f, "delay({ms}ms)"),
        }
    }
}

/// Kind of a page-level console or error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// console.log / console.debug
    Log,
    /// console.info
    Info,
    /// console.warn
    Warning,
    /// console.error
    Error,
    /// Uncaught exception in page script
    PageError,
}

impl EventKind {
    /// Parse a console message type as reported by the browser
    #[must_use]
    pub fn from_console_type(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" | "assert" => Self::Error,
            "warn" | "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Log,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("log"),
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
            Self::PageError => f.write_str("pageerror"),
        }
    }
}

/// Event delivered by a driver subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEvent {
    /// Event kind
    pub kind: EventKind,
    /// Message text
    pub text: String,
    /// Source URL, when the browser reports one
    pub source: Option<String>,
    /// When the browser emitted the event
    pub timestamp: DateTime<Utc>,
}

impl PageEvent {
    /// Create an event stamped now
    #[must_use]
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            source: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the source URL
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Receiving end of an event subscription; dropping it detaches the listener
pub type EventStream = mpsc::UnboundedReceiver<PageEvent>;

/// What to read from each element a locator matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementQuery {
    /// Elements to read
    pub locator: Locator,
    /// Computed properties to read
    pub properties: BTreeSet<StyleProperty>,
    /// Attributes to read
    pub attributes: BTreeSet<String>,
}

impl ElementQuery {
    /// Query reading nothing but identity, tag, text and state
    #[must_use]
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            properties: BTreeSet::new(),
            attributes: BTreeSet::new(),
        }
    }

    /// Add computed properties
    #[must_use]
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = StyleProperty>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Add attribute names
    #[must_use]
    pub fn with_attributes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }
}

/// One element as read from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawElement {
    /// Identity stable for the lifetime of the document
    pub node_id: u64,
    /// Upper-case tag name
    pub tag: String,
    /// Class list
    pub classes: Vec<String>,
    /// Trimmed text content
    pub text: String,
    /// Number of element children
    pub child_count: usize,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Requested computed properties
    pub styles: BTreeMap<StyleProperty, String>,
    /// Requested attributes that are present
    pub attributes: BTreeMap<String, String>,
}

impl RawElement {
    /// Create a visible, enabled, childless element with no text
    #[must_use]
    pub fn new(node_id: u64, tag: impl Into<String>) -> Self {
        Self {
            node_id,
            tag: tag.into().to_uppercase(),
            classes: Vec::new(),
            text: String::new(),
            child_count: 0,
            visible: true,
            enabled: true,
            styles: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set a computed property
    #[must_use]
    pub fn with_style(mut self, property: StyleProperty, value: impl Into<String>) -> Self {
        self.styles.insert(property, value.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the number of element children
    #[must_use]
    pub const fn with_children(mut self, count: usize) -> Self {
        self.child_count = count;
        self
    }

    /// Mark as not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One stylesheet attached to the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylesheetInfo {
    /// Sheet URL, `None` for inline sheets
    pub href: Option<String>,
    /// Number of rules, when readable
    pub rule_count: Option<usize>,
    /// Why the rules could not be read (typically CORS)
    pub error: Option<String>,
    /// `font-family` of each `@font-face` rule
    pub font_faces: Vec<String>,
}

impl StylesheetInfo {
    /// A readable sheet
    #[must_use]
    pub fn loaded(href: Option<&str>, rule_count: usize) -> Self {
        Self {
            href: href.map(str::to_string),
            rule_count: Some(rule_count),
            error: None,
            font_faces: Vec::new(),
        }
    }

    /// A sheet whose rules threw on access
    #[must_use]
    pub fn unreadable(href: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            href: href.map(str::to_string),
            rule_count: None,
            error: Some(error.into()),
            font_faces: Vec::new(),
        }
    }

    /// Display name: the href or `inline`
    #[must_use]
    pub fn name(&self) -> &str {
        self.href.as_deref().unwrap_or("inline")
    }
}

impl fmt::Display for StylesheetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.rule_count, &self.error) {
            (_, Some(err)) => write!(f, "CSS Error: {} - {err}", self.name()),
            (Some(n), None) => write!(f, "CSS loaded: {} ({n} rules)", self.name()),
            (None, None) => write!(f, "CSS loaded: {}", self.name()),
        }
    }
}

/// `document.fonts` as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FontStatus {
    /// `document.fonts.size`
    pub count: usize,
    /// Truthiness of `document.fonts.ready`
    pub ready: bool,
}

/// Document-level state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentState {
    /// `document.title`
    pub title: String,
    /// Current URL
    pub url: String,
    /// Attached stylesheets
    pub stylesheets: Vec<StylesheetInfo>,
    /// Font loading status
    pub fonts: FontStatus,
    /// Root computed properties whose name contains `color` or `--`
    pub root_color_properties: usize,
}

/// Abstract page driver
///
/// # Implementations
///
/// - `ChromiumDriver` - chromiumoxide over CDP (feature `browser`)
/// - [`MockDriver`] - scripted page for unit tests
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for `readiness`
    async fn navigate(&mut self, url: &str, readiness: Readiness) -> MiradorResult<()>;

    /// Readiness reached by the current document, `None` before navigation
    /// completes or after close
    fn ready_state(&self) -> Option<Readiness>;

    /// Subscribe to console messages and page errors from now on
    async fn subscribe(&mut self) -> MiradorResult<EventStream>;

    /// Wait until every event the browser has already reported is in the
    /// subscription channels
    async fn flush_events(&mut self) -> MiradorResult<()> {
        Ok(())
    }

    /// Read every element a locator matches
    async fn query(&self, query: &ElementQuery) -> MiradorResult<Vec<RawElement>>;

    /// Count elements a locator matches
    async fn count(&self, locator: &Locator) -> MiradorResult<usize>;

    /// Read document-level state
    async fn document(&self) -> MiradorResult<DocumentState>;

    /// Click the `index`-th match, waiting for it to be actionable.
    /// No internal bound: callers wrap this in a timeout.
    async fn click(&mut self, locator: &Locator, index: usize) -> MiradorResult<()>;

    /// Sleep inside the page's time frame
    async fn pause(&self, duration: Duration);

    /// Capture a PNG of the viewport
    async fn screenshot(&self) -> MiradorResult<Vec<u8>>;

    /// Close the page
    async fn close(&mut self) -> MiradorResult<()>;
}

/// Mock driver for unit testing
///
/// Elements are keyed by the locator's string form. Events in `load_events`
/// are delivered to current subscribers while `navigate` runs, so they are
/// only seen by recorders armed beforehand. With an event delay each event
/// reaches its subscribers from a separate task after the delay, and only
/// `flush_events` waits for it.
#[derive(Debug, Default)]
pub struct MockDriver {
    /// Elements per locator
    pub elements: BTreeMap<String, Vec<RawElement>>,
    /// Document state returned after navigation
    pub document: DocumentState,
    /// Events emitted during navigation
    pub load_events: Vec<PageEvent>,
    /// Clicks that block for the given duration, per (locator, index)
    pub click_delays: BTreeMap<(String, usize), Duration>,
    /// Clicks that change the URL, per (locator, index)
    pub click_targets: BTreeMap<(String, usize), String>,
    /// Make `navigate` fail
    pub fail_navigation: bool,
    /// Forward events from a separate task after this delay
    pub event_delay: Option<Duration>,
    /// Call history for verification
    pub call_history: Vec<String>,
    subscribers: Vec<mpsc::UnboundedSender<PageEvent>>,
    in_flight: Vec<JoinHandle<()>>,
    ready: Option<Readiness>,
    closed: bool,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add elements for a locator
    #[must_use]
    pub fn with_elements(mut self, locator: &str, elements: Vec<RawElement>) -> Self {
        self.elements
            .entry(Locator::from(locator).to_string())
            .or_default()
            .extend(elements);
        self
    }

    /// Set the document state
    #[must_use]
    pub fn with_document(mut self, document: DocumentState) -> Self {
        self.document = document;
        self
    }

    /// Queue an event for delivery during navigation
    #[must_use]
    pub fn with_load_event(mut self, event: PageEvent) -> Self {
        self.load_events.push(event);
        self
    }

    /// Deliver events late, from a forwarding task
    #[must_use]
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = Some(delay);
        self
    }

    /// Make a click block
    #[must_use]
    pub fn with_click_delay(mut self, locator: &str, index: usize, delay: Duration) -> Self {
        self.click_delays
            .insert((Locator::from(locator).to_string(), index), delay);
        self
    }

    /// Make a click navigate
    #[must_use]
    pub fn with_click_target(mut self, locator: &str, index: usize, url: &str) -> Self {
        self.click_targets
            .insert((Locator::from(locator).to_string(), index), url.to_string());
        self
    }

    /// Deliver an event to current subscribers
    pub fn emit(&mut self, event: PageEvent) {
        let Some(delay) = self.event_delay else {
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            return;
        };
        self.subscribers.retain(|tx| !tx.is_closed());
        let targets = self.subscribers.clone();
        self.in_flight.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for tx in targets {
                // a stopped recording no longer wants events
                let _ = tx.send(event.clone());
            }
        }));
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn ensure_open(&self) -> MiradorResult<()> {
        if self.closed {
            return Err(MiradorError::collection("page handle is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str, readiness: Readiness) -> MiradorResult<()> {
        self.ensure_open()?;
        self.call_history.push(format!("navigate:{url}"));
        self.ready = None;
        if self.fail_navigation {
            return Err(MiradorError::Navigation {
                url: url.to_string(),
                message: "mock navigation failure".to_string(),
            });
        }
        for event in std::mem::take(&mut self.load_events) {
            self.emit(event);
        }
        if self.document.url.is_empty() {
            self.document.url = url.to_string();
        }
        self.ready = Some(readiness);
        Ok(())
    }

    fn ready_state(&self) -> Option<Readiness> {
        if self.closed {
            None
        } else {
            self.ready
        }
    }

    async fn subscribe(&mut self) -> MiradorResult<EventStream> {
        self.ensure_open()?;
        self.call_history.push("subscribe".to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        Ok(rx)
    }

    async fn flush_events(&mut self) -> MiradorResult<()> {
        self.call_history.push("flush_events".to_string());
        for forwarder in std::mem::take(&mut self.in_flight) {
            forwarder
                .await
                .map_err(|e| MiradorError::collection(format!("event forwarder failed: {e}")))?;
        }
        Ok(())
    }

    async fn query(&self, query: &ElementQuery) -> MiradorResult<Vec<RawElement>> {
        self.ensure_open()?;
        let Some(elements) = self.elements.get(&query.locator.to_string()) else {
            return Ok(Vec::new());
        };
        Ok(elements
            .iter()
            .map(|el| {
                let mut el = el.clone();
                el.styles.retain(|p, _| query.properties.contains(p));
                el.attributes.retain(|a, _| query.attributes.contains(a));
                el
            })
            .collect())
    }

    async fn count(&self, locator: &Locator) -> MiradorResult<usize> {
        self.ensure_open()?;
        Ok(self
            .elements
            .get(&locator.to_string())
            .map_or(0, Vec::len))
    }

    async fn document(&self) -> MiradorResult<DocumentState> {
        self.ensure_open()?;
        Ok(self.document.clone())
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> MiradorResult<()> {
        self.ensure_open()?;
        let key = (locator.to_string(), index);
        self.call_history.push(format!("click:{}#{index}", key.0));
        if let Some(delay) = self.click_delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(url) = self.click_targets.get(&key) {
            self.document.url.clone_from(url);
        }
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn screenshot(&self) -> MiradorResult<Vec<u8>> {
        self.ensure_open()?;
        // PNG magic bytes
        Ok(vec![0x89, 0x50, 0x4E, 0x47])
    }

    async fn close(&mut self) -> MiradorResult<()> {
        self.call_history.push("close".to_string());
        self.closed = true;
        self.subscribers.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod event_kind_tests {
        use super::*;

        #[test]
        fn test_from_console_type() {
            assert_eq!(EventKind::from_console_type("error"), EventKind::Error);
            assert_eq!(EventKind::from_console_type("warning"), EventKind::Warning);
            assert_eq!(EventKind::from_console_type("warn"), EventKind::Warning);
            assert_eq!(EventKind::from_console_type("debug"), EventKind::Log);
        }

        #[test]
        fn test_display() {
            assert_eq!(EventKind::PageError.to_string(), "pageerror");
        }
    }

    mod readiness_tests {
        use super::*;

        #[test]
        fn test_serde_forms() {
            let r: Readiness = serde_yaml_ng::from_str("network-idle").unwrap();
            assert_eq!(r, Readiness::NetworkIdle);
            let r: Readiness = serde_yaml_ng::from_str("delay: 500").unwrap();
            assert_eq!(r, Readiness::Delay(500));
        }
    }

    mod stylesheet_tests {
        use super::*;

        #[test]
        fn test_display_matches_status_lines() {
            let ok = StylesheetInfo::loaded(None, 12);
            assert_eq!(ok.to_string(), "CSS loaded: inline (12 rules)");
            let err = StylesheetInfo::unreadable(Some("https://cdn/x.css"), "SecurityError");
            assert_eq!(err.to_string(), "CSS Error: https://cdn/x.css - SecurityError");
        }
    }

    mod mock_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_navigate_sets_ready_state() {
            let mut driver = MockDriver::new();
            assert!(driver.ready_state().is_none());
            driver
                .navigate("https://example.com", Readiness::NetworkIdle)
                .await
                .unwrap();
            assert_eq!(driver.ready_state(), Some(Readiness::NetworkIdle));
            assert!(driver.was_called("navigate"));
        }

        #[tokio::test]
        async fn test_query_filters_to_requested_fields() {
            let driver = MockDriver::new().with_elements(
                "p",
                vec![RawElement::new(1, "p")
                    .with_style(StyleProperty::Color, "rgb(0, 0, 0)")
                    .with_style(StyleProperty::FontSize, "16px")
                    .with_attribute("id", "intro")],
            );
            let query = ElementQuery::new(Locator::css("p")).with_properties([StyleProperty::Color]);
            let els = driver.query(&query).await.unwrap();
            assert_eq!(els.len(), 1);
            assert_eq!(els[0].styles.len(), 1);
            assert!(els[0].attributes.is_empty());
        }

        #[tokio::test]
        async fn test_load_events_reach_only_prior_subscribers() {
            let mut driver =
                MockDriver::new().with_load_event(PageEvent::new(EventKind::Error, "boom"));
            let mut early = driver.subscribe().await.unwrap();
            driver.navigate("about:blank", Readiness::Load).await.unwrap();
            let mut late = driver.subscribe().await.unwrap();
            assert_eq!(early.try_recv().unwrap().text, "boom");
            assert!(late.try_recv().is_err());
        }

        #[tokio::test(start_paused = true)]
        async fn test_delayed_events_arrive_by_flush() {
            let mut driver = MockDriver::new()
                .with_event_delay(Duration::from_millis(50))
                .with_load_event(PageEvent::new(EventKind::PageError, "late"));
            let mut rx = driver.subscribe().await.unwrap();
            driver.navigate("about:blank", Readiness::Load).await.unwrap();
            assert!(rx.try_recv().is_err());
            driver.flush_events().await.unwrap();
            assert_eq!(rx.try_recv().unwrap().text, "late");
            assert!(driver.was_called("flush_events"));
        }

        #[tokio::test]
        async fn test_closed_driver_rejects_queries() {
            let mut driver = MockDriver::new();
            driver.close().await.unwrap();
            let err = driver.document().await.unwrap_err();
            assert!(matches!(err, MiradorError::Collection { .. }));
            assert!(driver.ready_state().is_none());
        }

        #[tokio::test]
        async fn test_click_target_changes_url() {
            let mut driver = MockDriver::new().with_click_target("text=About", 0, "https://x/about");
            driver.click(&Locator::text("About"), 0).await.unwrap();
            assert_eq!(driver.document().await.unwrap().url, "https://x/about");
        }
    }
}
