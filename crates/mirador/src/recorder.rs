//! Console and page-error recorder.
//!
//! A [`Recording`] is armed before navigation and owns everything the page
//! reports until [`Recording::stop`] detaches it and hands back an immutable
//! [`EventLog`]. Each recording starts with an empty log.
//!
//! ```text
//!   EventRecorder::start ──► Recording (Armed) ──first event──► Recording (Recording)
//!                                                       │
//!                                          stop() ──────┴──► EventLog (Stopped)
//! ```

use crate::driver::{EventKind, EventStream, PageDriver, PageEvent};
use crate::result::MiradorResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

/// A recorded console message or page error
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Position in emission order, starting at 0
    pub sequence: u64,
    /// Event kind
    pub kind: EventKind,
    /// Message text
    pub text: String,
    /// Source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Browser timestamp
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    /// Whether the entry is of one of `kinds` and contains one of `substrings`
    ///
    /// An empty substring list matches every entry of the given kinds.
    /// Matching is case-sensitive.
    #[must_use]
    pub fn matches(&self, kinds: &BTreeSet<EventKind>, substrings: &[String]) -> bool {
        kinds.contains(&self.kind)
            && (substrings.is_empty() || substrings.iter().any(|s| self.text.contains(s.as_str())))
    }
}

/// Lifecycle of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Subscribed, nothing received yet
    Armed,
    /// At least one event received
    Recording,
}

/// Entry point for recordings
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRecorder;

impl EventRecorder {
    /// Subscribe to the page's console and error events
    ///
    /// Must be called before navigation for load-time events to be captured.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot subscribe.
    pub async fn start<D>(driver: &mut D) -> MiradorResult<Recording>
    where
        D: PageDriver + ?Sized,
    {
        let stream = driver.subscribe().await?;
        debug!("event recorder armed");
        Ok(Recording {
            stream,
            entries: Vec::new(),
            started_at: Utc::now(),
        })
    }
}

/// A live recording
#[derive(Debug)]
pub struct Recording {
    stream: EventStream,
    entries: Vec<EventLogEntry>,
    started_at: DateTime<Utc>,
}

impl Recording {
    /// Current lifecycle state, after pulling delivered events
    pub fn state(&mut self) -> RecorderState {
        self.drain();
        if self.entries.is_empty() {
            RecorderState::Armed
        } else {
            RecorderState::Recording
        }
    }

    /// When the recording was armed
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Live view of the entries received so far
    pub fn entries(&mut self) -> &[EventLogEntry] {
        self.drain();
        &self.entries
    }

    /// Pull every delivered event into the live log; returns how many
    pub fn drain(&mut self) -> usize {
        let mut pulled = 0;
        loop {
            match self.stream.try_recv() {
                Ok(event) => {
                    self.push(event);
                    pulled += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        pulled
    }

    /// Detach from the page and return the log
    ///
    /// Only events already in the channel are kept; drivers that forward
    /// from a background task need [`PageDriver::flush_events`] first.
    #[must_use]
    pub fn stop(mut self) -> EventLog {
        self.stream.close();
        self.drain();
        debug!(entries = self.entries.len(), "event recorder stopped");
        EventLog {
            entries: self.entries,
        }
    }

    fn push(&mut self, event: PageEvent) {
        if let Some(last) = self.entries.last() {
            if event.timestamp < last.timestamp {
                warn!(
                    sequence = self.entries.len(),
                    text = %event.text,
                    "event arrived with a timestamp earlier than its predecessor"
                );
            }
        }
        let sequence = self.entries.len() as u64;
        self.entries.push(EventLogEntry {
            sequence,
            kind: event.kind,
            text: event.text,
            source: event.source,
            timestamp: event.timestamp,
        });
    }
}

/// Immutable log returned by [`Recording::stop`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    /// Entries in emission order
    #[must_use]
    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// `console.error` entries and uncaught page errors
    pub fn errors(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Error | EventKind::PageError))
    }

    /// `console.warn` entries
    pub fn warnings(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.of_kind(EventKind::Warning)
    }

    /// Entries matching kinds and substrings, see [`EventLogEntry::matches`]
    #[must_use]
    pub fn matching(&self, kinds: &BTreeSet<EventKind>, substrings: &[String]) -> Vec<EventLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.matches(kinds, substrings))
            .cloned()
            .collect()
    }

    /// Consume into entries
    #[must_use]
    pub fn into_entries(self) -> Vec<EventLogEntry> {
        self.entries
    }
}

impl FromIterator<PageEvent> for EventLog {
    fn from_iter<I: IntoIterator<Item = PageEvent>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .enumerate()
            .map(|(i, event)| EventLogEntry {
                sequence: i as u64,
                kind: event.kind,
                text: event.text,
                source: event.source,
                timestamp: event.timestamp,
            })
            .collect();
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, Readiness};

    fn kinds(list: &[EventKind]) -> BTreeSet<EventKind> {
        list.iter().copied().collect()
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_armed_before_navigation_sees_load_events() {
            let mut driver = MockDriver::new()
                .with_load_event(PageEvent::new(EventKind::Log, "boot"))
                .with_load_event(PageEvent::new(EventKind::Error, "font load failed"));
            let mut recording = EventRecorder::start(&mut driver).await.unwrap();
            assert_eq!(recording.state(), RecorderState::Armed);
            driver.navigate("https://example.com", Readiness::Load).await.unwrap();
            assert_eq!(recording.state(), RecorderState::Recording);
            let log = recording.stop();
            assert_eq!(log.len(), 2);
            assert_eq!(log.entries()[1].text, "font load failed");
        }

        #[tokio::test]
        async fn test_stop_detaches() {
            let mut driver = MockDriver::new();
            let recording = EventRecorder::start(&mut driver).await.unwrap();
            let log = recording.stop();
            driver.emit(PageEvent::new(EventKind::Error, "after stop"));
            assert!(log.is_empty());
        }

        #[tokio::test]
        async fn test_each_recording_starts_empty() {
            let mut driver = MockDriver::new();
            let first = EventRecorder::start(&mut driver).await.unwrap();
            driver.emit(PageEvent::new(EventKind::Warning, "one"));
            assert_eq!(first.stop().len(), 1);

            let second = EventRecorder::start(&mut driver).await.unwrap();
            assert!(second.stop().is_empty());
        }

        #[tokio::test]
        async fn test_sequence_follows_emission_order() {
            let mut driver = MockDriver::new();
            let mut recording = EventRecorder::start(&mut driver).await.unwrap();
            for i in 0..5 {
                driver.emit(PageEvent::new(EventKind::Log, format!("m{i}")));
            }
            assert_eq!(recording.entries().len(), 5);
            let log = recording.stop();
            for (i, entry) in log.entries().iter().enumerate() {
                assert_eq!(entry.sequence, i as u64);
                assert_eq!(entry.text, format!("m{i}"));
            }
        }
    }

    mod log_tests {
        use super::*;

        fn sample() -> EventLog {
            [
                PageEvent::new(EventKind::Error, "Invalid color value"),
                PageEvent::new(EventKind::Warning, "deprecated Color API"),
                PageEvent::new(EventKind::PageError, "ReferenceError: x is not defined"),
                PageEvent::new(EventKind::Log, "color scheme ready"),
            ]
            .into_iter()
            .collect()
        }

        #[test]
        fn test_errors_include_page_errors() {
            assert_eq!(sample().errors().count(), 2);
            assert_eq!(sample().warnings().count(), 1);
        }

        #[test]
        fn test_matching_is_case_sensitive() {
            let log = sample();
            let k = kinds(&[EventKind::Error, EventKind::Warning]);
            assert_eq!(log.matching(&k, &["color".to_string()]).len(), 1);
            assert_eq!(
                log.matching(&k, &["color".to_string(), "Color".to_string()])
                    .len(),
                2
            );
        }

        #[test]
        fn test_empty_substrings_match_kind() {
            let log = sample();
            assert_eq!(log.matching(&kinds(&[EventKind::PageError]), &[]).len(), 1);
        }
    }
}
