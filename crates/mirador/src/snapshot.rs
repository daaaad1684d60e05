//! Page snapshots and the observation spec that shapes them.

use crate::driver::{FontStatus, Readiness, StylesheetInfo};
use crate::locator::Locator;
use crate::style::StyleProperty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Maximum characters of text kept in an element label
pub const LABEL_TEXT_LEN: usize = 20;

/// A locator plus the leaf-text filter
///
/// With `leaf_text_only`, only elements that have no element children and
/// non-empty trimmed text are observed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "ScopeRepr")]
pub struct Scope {
    /// Elements to observe
    #[serde(rename = "selector")]
    pub locator: Locator,
    /// Keep only leaf text elements
    #[serde(default)]
    pub leaf_text_only: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Plain(Locator),
    Full {
        selector: Locator,
        #[serde(default)]
        leaf_text_only: bool,
    },
}

impl From<ScopeRepr> for Scope {
    fn from(repr: ScopeRepr) -> Self {
        match repr {
            ScopeRepr::Plain(locator) => Self::all(locator),
            ScopeRepr::Full {
                selector,
                leaf_text_only,
            } => Self {
                locator: selector,
                leaf_text_only,
            },
        }
    }
}

impl Scope {
    /// Every matched element
    #[must_use]
    pub fn all(locator: impl Into<Locator>) -> Self {
        Self {
            locator: locator.into(),
            leaf_text_only: false,
        }
    }

    /// Only leaf text elements
    #[must_use]
    pub fn leaf_text(locator: impl Into<Locator>) -> Self {
        Self {
            locator: locator.into(),
            leaf_text_only: true,
        }
    }

    /// Key under which observations are stored
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.leaf_text_only {
            write!(f, "{} [leaf text]", self.locator)
        } else {
            write!(f, "{}", self.locator)
        }
    }
}

/// What a collect call gathers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservationSpec {
    /// Element sets to observe
    #[serde(default)]
    pub scopes: Vec<Scope>,
    /// Computed properties read from every observed element
    #[serde(default)]
    pub properties: BTreeSet<StyleProperty>,
    /// Attributes read from every observed element
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    /// Selectors that are only counted
    #[serde(default)]
    pub counts: Vec<Locator>,
}

impl ObservationSpec {
    /// Create an empty spec
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scope (duplicates are ignored)
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.add_scope(scope);
        self
    }

    /// Add computed properties
    #[must_use]
    pub fn properties(mut self, properties: impl IntoIterator<Item = StyleProperty>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Add attribute names
    #[must_use]
    pub fn attributes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add a count-only selector (duplicates are ignored)
    #[must_use]
    pub fn count(mut self, locator: impl Into<Locator>) -> Self {
        let locator = locator.into();
        if !self.counts.contains(&locator) {
            self.counts.push(locator);
        }
        self
    }

    /// Add a scope in place
    pub fn add_scope(&mut self, scope: Scope) {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
    }

    /// Union with another spec
    pub fn merge(&mut self, other: &Self) {
        for scope in &other.scopes {
            self.add_scope(scope.clone());
        }
        self.properties.extend(other.properties.iter().copied());
        self.attributes.extend(other.attributes.iter().cloned());
        for locator in &other.counts {
            if !self.counts.contains(locator) {
                self.counts.push(locator.clone());
            }
        }
    }
}

/// One observed element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementObservation {
    /// Document-stable identity
    pub node_id: u64,
    /// Upper-case tag name
    pub tag: String,
    /// Class list
    pub classes: Vec<String>,
    /// Trimmed text content
    pub text: String,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Requested computed properties
    pub styles: BTreeMap<StyleProperty, String>,
    /// Requested attributes that are present; absent ones are simply missing
    pub attributes: BTreeMap<String, String>,
}

impl ElementObservation {
    /// Computed value of a property
    #[must_use]
    pub fn style(&self, property: StyleProperty) -> Option<&str> {
        self.styles.get(&property).map(String::as_str)
    }

    /// Attribute value, `None` when the attribute is absent
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the attribute is present (boolean attributes like `required`)
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Buttons and `.btn` elements
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.tag == "BUTTON" || self.classes.iter().any(|c| c == "btn")
    }

    /// Tag plus the first characters of text, e.g. `BUTTON "Sign up"`
    #[must_use]
    pub fn label(&self) -> String {
        let text: String = self.text.chars().take(LABEL_TEXT_LEN).collect();
        if text.is_empty() {
            self.tag.clone()
        } else {
            format!("{} {text:?}", self.tag)
        }
    }
}

/// Immutable point-in-time read of page-visible style and DOM state
///
/// Only the collector creates snapshots, and only once the page has reached
/// its readiness condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    url: String,
    title: String,
    readiness: Readiness,
    taken_at: DateTime<Utc>,
    observations: BTreeMap<String, Vec<ElementObservation>>,
    counts: BTreeMap<String, usize>,
    stylesheets: Vec<StylesheetInfo>,
    fonts: FontStatus,
    root_color_properties: usize,
}

/// Mutable staging area the collector fills before freezing a snapshot
#[derive(Debug)]
pub(crate) struct SnapshotParts {
    pub url: String,
    pub title: String,
    pub readiness: Readiness,
    pub observations: BTreeMap<String, Vec<ElementObservation>>,
    pub counts: BTreeMap<String, usize>,
    pub stylesheets: Vec<StylesheetInfo>,
    pub fonts: FontStatus,
    pub root_color_properties: usize,
}

impl SnapshotParts {
    pub(crate) fn new(readiness: Readiness) -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            readiness,
            observations: BTreeMap::new(),
            counts: BTreeMap::new(),
            stylesheets: Vec::new(),
            fonts: FontStatus::default(),
            root_color_properties: 0,
        }
    }

    pub(crate) fn freeze(self) -> PageSnapshot {
        PageSnapshot {
            url: self.url,
            title: self.title,
            readiness: self.readiness,
            taken_at: Utc::now(),
            observations: self.observations,
            counts: self.counts,
            stylesheets: self.stylesheets,
            fonts: self.fonts,
            root_color_properties: self.root_color_properties,
        }
    }
}

impl PageSnapshot {
    /// URL at snapshot time
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Document title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Readiness condition the page had reached
    #[must_use]
    pub const fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// When the snapshot was frozen
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Observed elements for a scope; empty when nothing matched
    #[must_use]
    pub fn elements(&self, scope: &Scope) -> &[ElementObservation] {
        self.observations
            .get(&scope.key())
            .map_or(&[], Vec::as_slice)
    }

    /// Whether the scope was part of the observation spec
    #[must_use]
    pub fn observed(&self, scope: &Scope) -> bool {
        self.observations.contains_key(&scope.key())
    }

    /// All observations by scope key
    #[must_use]
    pub const fn observations(&self) -> &BTreeMap<String, Vec<ElementObservation>> {
        &self.observations
    }

    /// Count for a count-only selector
    #[must_use]
    pub fn count(&self, locator: &Locator) -> Option<usize> {
        self.counts.get(&locator.to_string()).copied()
    }

    /// All counts by selector
    #[must_use]
    pub const fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// Stylesheet status list
    #[must_use]
    pub fn stylesheets(&self) -> &[StylesheetInfo] {
        &self.stylesheets
    }

    /// `@font-face` families across readable stylesheets
    #[must_use]
    pub fn font_faces(&self) -> Vec<&str> {
        self.stylesheets
            .iter()
            .flat_map(|s| s.font_faces.iter().map(String::as_str))
            .collect()
    }

    /// Font loading status
    #[must_use]
    pub const fn fonts(&self) -> FontStatus {
        self.fonts
    }

    /// Root computed properties naming a color or custom property
    #[must_use]
    pub const fn root_color_properties(&self) -> usize {
        self.root_color_properties
    }

    /// Distinct values of a property across a scope
    #[must_use]
    pub fn distinct_values(&self, scope: &Scope, property: StyleProperty) -> BTreeSet<&str> {
        self.elements(scope)
            .iter()
            .filter_map(|el| el.style(property))
            .collect()
    }

    /// Occurrences of each value of a property across a scope
    #[must_use]
    pub fn value_histogram(&self, scope: &Scope, property: StyleProperty) -> BTreeMap<&str, usize> {
        let mut histogram = BTreeMap::new();
        for value in self.elements(scope).iter().filter_map(|el| el.style(property)) {
            *histogram.entry(value).or_insert(0) += 1;
        }
        histogram
    }
}
