//! Observation collector.
//!
//! Reads computed styles, attributes, counts and document state from a ready
//! page into an immutable [`PageSnapshot`]. The collector never clicks or
//! otherwise mutates the page.

use crate::driver::{ElementQuery, PageDriver, RawElement};
use crate::result::{MiradorError, MiradorResult};
use crate::snapshot::{ElementObservation, ObservationSpec, PageSnapshot, Scope, SnapshotParts};
use std::collections::BTreeSet;
use tracing::debug;

/// Collect a snapshot from a page that has reached its readiness condition
///
/// # Errors
///
/// Returns [`MiradorError::Collection`] if the page has not become ready or
/// the page handle is unusable. An unmatched selector is not an error; it
/// yields an empty observation set.
pub async fn collect<D>(driver: &D, spec: &ObservationSpec) -> MiradorResult<PageSnapshot>
where
    D: PageDriver + ?Sized,
{
    let Some(readiness) = driver.ready_state() else {
        return Err(MiradorError::collection(
            "page has not reached its readiness condition",
        ));
    };

    let mut parts = SnapshotParts::new(readiness);

    for scope in &spec.scopes {
        let query = ElementQuery::new(scope.locator.clone())
            .with_properties(spec.properties.iter().copied())
            .with_attributes(spec.attributes.iter().cloned());
        let raw = driver.query(&query).await.map_err(into_collection)?;
        let observed = observe(scope, raw);
        debug!(scope = %scope, elements = observed.len(), "observed scope");
        parts.observations.insert(scope.key(), observed);
    }

    for locator in &spec.counts {
        let n = driver.count(locator).await.map_err(into_collection)?;
        parts.counts.insert(locator.to_string(), n);
    }

    let document = driver.document().await.map_err(into_collection)?;
    parts.url = document.url;
    parts.title = document.title;
    parts.stylesheets = document.stylesheets;
    parts.fonts = document.fonts;
    parts.root_color_properties = document.root_color_properties;

    Ok(parts.freeze())
}

/// Apply the scope's filter and drop repeated identities
fn observe(scope: &Scope, raw: Vec<RawElement>) -> Vec<ElementObservation> {
    let mut seen = BTreeSet::new();
    raw.into_iter()
        .filter(|el| !scope.leaf_text_only || (el.child_count == 0 && !el.text.trim().is_empty()))
        .filter(|el| seen.insert(el.node_id))
        .map(|el| ElementObservation {
            node_id: el.node_id,
            tag: el.tag,
            classes: el.classes,
            text: el.text.trim().to_string(),
            visible: el.visible,
            enabled: el.enabled,
            styles: el.styles,
            attributes: el.attributes,
        })
        .collect()
}

fn into_collection(err: MiradorError) -> MiradorError {
    match err {
        MiradorError::Collection { .. } => err,
        other => MiradorError::collection(other.to_string()),
    }
}
