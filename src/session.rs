//! ArtifactSession: scanner and store wired together
//!
//! The chat transport feeds fragments into `ingest`; scanner events flow into
//! the store as they happen:
//!
//! | scanner event          | store call           |
//! |------------------------|----------------------|
//! | `on_artifact_start`    | `begin_artifact`     |
//! | `on_code_update`       | `update_code`        |
//! | `on_artifact_complete` | `complete_artifact`  |
//! | `on_error`             | warn log             |
//!
//! An optional extra handler sees every event after the store has applied it.

use crate::artifact::{ArtifactStatus, StoredMessage};
use crate::config::ScannerConfig;
use crate::logging;
use crate::scanner::events::{
    ArtifactStart, CodeComplete, CodeUpdate, ParsedArtifact, ScanError, ScanHandler,
};
use crate::scanner::streaming::{PendingArtifact, StreamingScanner};
use crate::store::persistence::ArtifactPersistence;
use crate::store::registry::ArtifactStore;

const COMPONENT: &str = "ArtifactSession";

/// Routes scanner events into the store for the duration of one `ingest`
struct StoreBridge<'a> {
    store: &'a mut ArtifactStore,
    session_id: &'a str,
    extra: Option<&'a mut Box<dyn ScanHandler>>,
}

impl ScanHandler for StoreBridge<'_> {
    fn on_artifact_start(&mut self, start: &ArtifactStart) {
        self.store.begin_artifact(start, self.session_id);
        if let Some(h) = self.extra.as_mut() {
            h.on_artifact_start(start);
        }
    }

    fn on_code_update(&mut self, update: &CodeUpdate) {
        self.store.update_code(update);
        if let Some(h) = self.extra.as_mut() {
            h.on_code_update(update);
        }
    }

    fn on_code_complete(&mut self, complete: &CodeComplete) {
        if let Some(h) = self.extra.as_mut() {
            h.on_code_complete(complete);
        }
    }

    fn on_artifact_complete(&mut self, artifact: &ParsedArtifact) {
        self.store.complete_artifact(artifact, self.session_id);
        if let Some(h) = self.extra.as_mut() {
            h.on_artifact_complete(artifact);
        }
    }

    fn on_error(&mut self, error: &ScanError) {
        logging::warn(
            COMPONENT,
            &format!("malformed artifact tag at {}: {} ({})", error.position, error.message, error.context),
        );
        if let Some(h) = self.extra.as_mut() {
            h.on_error(error);
        }
    }
}

pub struct ArtifactSession {
    scanner: StreamingScanner,
    store: ArtifactStore,
    session_id: String,
    extra: Option<Box<dyn ScanHandler>>,
}

impl Default for ArtifactSession {
    fn default() -> Self {
        Self::new("")
    }
}

impl ArtifactSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_config(ScannerConfig::default(), session_id)
    }

    pub fn with_config(config: ScannerConfig, session_id: impl Into<String>) -> Self {
        Self {
            store: ArtifactStore::with_config(&config),
            scanner: StreamingScanner::with_config(config),
            session_id: session_id.into(),
            extra: None,
        }
    }

    pub fn with_persistence(mut self, persistence: impl ArtifactPersistence + 'static) -> Self {
        self.store.set_persistence(Some(Box::new(persistence)));
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Applies to records written from now on
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    pub fn scanner(&self) -> &StreamingScanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut StreamingScanner {
        &mut self.scanner
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ArtifactStore {
        &mut self.store
    }

    /// Extra receiver of scanner events, called after the store
    pub fn set_handler(&mut self, handler: impl ScanHandler + 'static) {
        self.extra = Some(Box::new(handler));
    }

    pub fn clear_handler(&mut self) -> Option<Box<dyn ScanHandler>> {
        self.extra.take()
    }

    // -------------------------------------------------------------------------
    // Streaming
    // -------------------------------------------------------------------------

    /// Feed one fragment of a message. Returns the full text so far.
    pub fn ingest(&mut self, message_id: &str, fragment: &str) -> &str {
        let Self {
            scanner,
            store,
            session_id,
            extra,
        } = self;

        let mut bridge = StoreBridge {
            store,
            session_id,
            extra: extra.as_mut(),
        };
        scanner.parse_with(message_id, fragment, &mut bridge)
    }

    pub fn pending_artifact(&self, message_id: &str) -> Option<PendingArtifact> {
        self.scanner.pending_artifact(message_id)
    }

    /// The transport finished a message. Drops its parse state; an artifact
    /// still open at this point never gets its close tag, so its record is
    /// marked as failed. Returns that artifact, if any.
    pub fn finish_message(&mut self, message_id: &str) -> Option<PendingArtifact> {
        let pending = self.scanner.pending_artifact(message_id);
        self.scanner.reset_state(message_id);

        if let Some(open) = pending.as_ref() {
            logging::warn(
                COMPONENT,
                &format!("message {} ended inside artifact `{}`", message_id, open.id),
            );
            self.store.set_status(
                message_id,
                &open.id,
                ArtifactStatus::Error,
                Some("response ended before the artifact was closed".to_string()),
            );
        }
        pending
    }

    /// Forget a message entirely (e.g. before it is regenerated). Returns
    /// the number of store records removed.
    pub fn reset_message(&mut self, message_id: &str) -> usize {
        self.scanner.reset_state(message_id);
        self.store.remove_message(message_id)
    }

    /// Drop every parse state and every record
    pub fn leave_conversation(&mut self) {
        self.scanner.clear();
        self.store.clear();
    }

    /// Seed the store from persisted messages of this session
    pub fn restore_history(&mut self, messages: &[StoredMessage]) -> usize {
        self.store.restore_from_messages(messages, &self.session_id)
    }
}
