//! Scanner lifecycle events
//!
//! The scanner reports progress through a `ScanHandler`. Every method has a
//! no-op default, so a handler only implements what it cares about.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::artifact::ArtifactKind;

// =============================================================================
// Payloads
// =============================================================================

/// A validated artifact open tag was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStart {
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub message_id: String,
}

/// Code is still streaming. `content` is everything so far, unescaped:
/// consumers replace, never append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUpdate {
    pub message_id: String,
    pub artifact_id: String,
    pub language: String,
    pub content: String,
}

/// The code close tag was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeComplete {
    pub message_id: String,
    pub artifact_id: String,
    pub language: String,
    pub content: String,
}

/// Full description of an artifact whose close tag was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedArtifact {
    pub message_id: String,
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    /// Language declared on the code tag (default when no code tag was seen)
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// A malformed open tag. Scanning continues after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub message: String,
    /// Byte offset of the offending tag in the message text
    pub position: usize,
    /// Text around the tag
    pub context: String,
}

// =============================================================================
// ScanHandler
// =============================================================================

/// Receiver of scanner events
pub trait ScanHandler {
    fn on_artifact_start(&mut self, _start: &ArtifactStart) {}
    fn on_code_update(&mut self, _update: &CodeUpdate) {}
    fn on_code_complete(&mut self, _complete: &CodeComplete) {}
    fn on_artifact_complete(&mut self, _artifact: &ParsedArtifact) {}
    fn on_error(&mut self, _error: &ScanError) {}
}

/// Handler that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ScanHandler for NoopHandler {}

// =============================================================================
// ScanCallbacks
// =============================================================================

type Callback<T> = Option<Box<dyn FnMut(&T)>>;

/// Closure-based handler. Unset callbacks silently drop their event.
#[derive(Default)]
pub struct ScanCallbacks {
    pub on_artifact_start: Callback<ArtifactStart>,
    pub on_code_update: Callback<CodeUpdate>,
    pub on_code_complete: Callback<CodeComplete>,
    pub on_artifact_complete: Callback<ParsedArtifact>,
    pub on_error: Callback<ScanError>,
}

impl ScanCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact_start(mut self, f: impl FnMut(&ArtifactStart) + 'static) -> Self {
        self.on_artifact_start = Some(Box::new(f));
        self
    }

    pub fn with_code_update(mut self, f: impl FnMut(&CodeUpdate) + 'static) -> Self {
        self.on_code_update = Some(Box::new(f));
        self
    }

    pub fn with_code_complete(mut self, f: impl FnMut(&CodeComplete) + 'static) -> Self {
        self.on_code_complete = Some(Box::new(f));
        self
    }

    pub fn with_artifact_complete(mut self, f: impl FnMut(&ParsedArtifact) + 'static) -> Self {
        self.on_artifact_complete = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&ScanError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl ScanHandler for ScanCallbacks {
    fn on_artifact_start(&mut self, start: &ArtifactStart) {
        if let Some(f) = self.on_artifact_start.as_mut() {
            f(start);
        }
    }

    fn on_code_update(&mut self, update: &CodeUpdate) {
        if let Some(f) = self.on_code_update.as_mut() {
            f(update);
        }
    }

    fn on_code_complete(&mut self, complete: &CodeComplete) {
        if let Some(f) = self.on_code_complete.as_mut() {
            f(complete);
        }
    }

    fn on_artifact_complete(&mut self, artifact: &ParsedArtifact) {
        if let Some(f) = self.on_artifact_complete.as_mut() {
            f(artifact);
        }
    }

    fn on_error(&mut self, error: &ScanError) {
        if let Some(f) = self.on_error.as_mut() {
            f(error);
        }
    }
}

// =============================================================================
// EventLog
// =============================================================================

/// One recorded scanner event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanEvent {
    ArtifactStart(ArtifactStart),
    CodeUpdate(CodeUpdate),
    CodeComplete(CodeComplete),
    ArtifactComplete(ParsedArtifact),
    Error(ScanError),
}

/// Handler that records every event in order
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<ScanEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ScanEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<ScanEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn starts(&self) -> Vec<&ArtifactStart> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ArtifactStart(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn code_updates(&self) -> Vec<&CodeUpdate> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::CodeUpdate(u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn code_completions(&self) -> Vec<&CodeComplete> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::CodeComplete(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<&ParsedArtifact> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ArtifactComplete(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&ScanError> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }
}

impl ScanHandler for EventLog {
    fn on_artifact_start(&mut self, start: &ArtifactStart) {
        self.events.push(ScanEvent::ArtifactStart(start.clone()));
    }

    fn on_code_update(&mut self, update: &CodeUpdate) {
        self.events.push(ScanEvent::CodeUpdate(update.clone()));
    }

    fn on_code_complete(&mut self, complete: &CodeComplete) {
        self.events.push(ScanEvent::CodeComplete(complete.clone()));
    }

    fn on_artifact_complete(&mut self, artifact: &ParsedArtifact) {
        self.events.push(ScanEvent::ArtifactComplete(artifact.clone()));
    }

    fn on_error(&mut self, error: &ScanError) {
        self.events.push(ScanEvent::Error(error.clone()));
    }
}

/// Shared log: the scanner records through one handle, the owner reads
/// through another
impl ScanHandler for Rc<RefCell<EventLog>> {
    fn on_artifact_start(&mut self, start: &ArtifactStart) {
        self.borrow_mut().on_artifact_start(start);
    }

    fn on_code_update(&mut self, update: &CodeUpdate) {
        self.borrow_mut().on_code_update(update);
    }

    fn on_code_complete(&mut self, complete: &CodeComplete) {
        self.borrow_mut().on_code_complete(complete);
    }

    fn on_artifact_complete(&mut self, artifact: &ParsedArtifact) {
        self.borrow_mut().on_artifact_complete(artifact);
    }

    fn on_error(&mut self, error: &ScanError) {
        self.borrow_mut().on_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_error() -> ScanError {
        ScanError {
            message: "bad".into(),
            position: 3,
            context: "ctx".into(),
        }
    }

    #[test]
    fn test_unset_callbacks_drop_events() {
        let mut callbacks = ScanCallbacks::new();
        callbacks.on_error(&sample_error());
    }

    #[test]
    fn test_callbacks_fire() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut callbacks = ScanCallbacks::new().with_error(move |e| sink.borrow_mut().push(e.position));

        callbacks.on_error(&sample_error());
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn test_event_log_keeps_order() {
        let mut log = EventLog::new();
        log.on_error(&sample_error());
        log.on_code_update(&CodeUpdate {
            message_id: "m".into(),
            artifact_id: "a".into(),
            language: "tsx".into(),
            content: "x".into(),
        });
        assert_eq!(log.len(), 2);
        assert!(matches!(log.events()[0], ScanEvent::Error(_)));
        assert_eq!(log.code_updates().len(), 1);
        assert_eq!(log.take().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_value(ScanEvent::Error(sample_error())).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["position"], 3);
    }
}
