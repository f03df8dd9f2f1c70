//! ArtifactStore: versioned registry of artifact records
//!
//! Records are keyed by (message id, artifact id). The store is an explicit
//! instance owned by the session, not a global.
//!
//! # Versioning
//! - First completion of an id in a message: version 1, `created_at = now`
//! - Later completion of the same id in the same message: previous
//!   version + 1, `created_at` carried over
//! - `begin_artifact` writes a `creating` placeholder that already carries
//!   the version being streamed, so UI never shows a duplicate entry

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::VecDeque;

use crate::artifact::{
    Artifact, ArtifactCode, ArtifactRef, ArtifactStatus, PanelTab, StoredMessage,
};
use crate::config::ScannerConfig;
use crate::logging;
use crate::scanner::events::{ArtifactStart, CodeUpdate, ParsedArtifact};
use crate::scanner::restore::HistoryRestorer;
use crate::store::observer::{ArtifactObserver, PanelState, StoreChange, SubscriptionId};
use crate::store::persistence::ArtifactPersistence;

const COMPONENT: &str = "ArtifactStore";

// =============================================================================
// Internal types
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    artifact: Artifact,
    /// Store-wide mutation counter at the last write, for "latest" lookups
    touched: u64,
}

/// Version and creation time for a record about to be written
fn next_version(existing: Option<&Artifact>, now: DateTime<Utc>) -> (u32, DateTime<Utc>) {
    match existing {
        // A placeholder already carries the version being streamed
        Some(e) if e.is_streaming => (e.current_version, e.created_at),
        Some(e) => (e.current_version.saturating_add(1), e.created_at),
        None => (1, now),
    }
}

// =============================================================================
// ArtifactStore
// =============================================================================

pub struct ArtifactStore {
    messages: IndexMap<String, IndexMap<String, Entry>>,
    active: Option<ArtifactRef>,
    panel: PanelState,

    observers: Vec<(SubscriptionId, Box<dyn ArtifactObserver>)>,
    next_subscription: u64,
    pending: VecDeque<StoreChange>,
    notifying: bool,

    persistence: Option<Box<dyn ArtifactPersistence>>,
    restorer: HistoryRestorer,
    clock: fn() -> DateTime<Utc>,
    sequence: u64,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new() -> Self {
        Self::with_config(&ScannerConfig::default())
    }

    /// The config decides the tag vocabulary used by `restore_from_messages`
    pub fn with_config(config: &ScannerConfig) -> Self {
        Self {
            messages: IndexMap::new(),
            active: None,
            panel: PanelState::default(),
            observers: Vec::new(),
            next_subscription: 1,
            pending: VecDeque::new(),
            notifying: false,
            persistence: None,
            restorer: HistoryRestorer::with_config(config),
            clock: Utc::now,
            sequence: 0,
        }
    }

    pub fn with_persistence(mut self, persistence: impl ArtifactPersistence + 'static) -> Self {
        self.persistence = Some(Box::new(persistence));
        self
    }

    pub fn set_persistence(&mut self, persistence: Option<Box<dyn ArtifactPersistence>>) {
        self.persistence = persistence;
    }

    /// Replace the time source (tests pin it)
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn get_artifact(&self, message_id: &str, artifact_id: &str) -> Option<&Artifact> {
        self.messages
            .get(message_id)?
            .get(artifact_id)
            .map(|entry| &entry.artifact)
    }

    /// Records of one message in first-seen order. Unknown ids give an empty list.
    pub fn get_artifacts_for_message(&self, message_id: &str) -> Vec<&Artifact> {
        self.messages
            .get(message_id)
            .map(|records| records.values().map(|e| &e.artifact).collect())
            .unwrap_or_default()
    }

    /// Most recently written record with this id, across all messages
    pub fn get_latest_artifact_by_id(&self, artifact_id: &str) -> Option<&Artifact> {
        self.messages
            .values()
            .filter_map(|records| records.get(artifact_id))
            .max_by_key(|entry| entry.touched)
            .map(|entry| &entry.artifact)
    }

    pub fn active_artifact(&self) -> Option<&ArtifactRef> {
        self.active.as_ref()
    }

    /// The record the active reference points at, if it still exists
    pub fn active_record(&self) -> Option<&Artifact> {
        let active = self.active.as_ref()?;
        self.get_artifact(&active.message_id, &active.artifact_id)
    }

    pub fn panel(&self) -> PanelState {
        self.panel
    }

    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.keys().map(String::as_str).collect()
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.messages.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Direct mutation
    // -------------------------------------------------------------------------

    /// Insert or replace a record as-is
    pub fn set_artifact(&mut self, artifact: Artifact) {
        let change = StoreChange::ArtifactUpserted {
            message_id: artifact.message_id.clone(),
            artifact_id: artifact.id.clone(),
            version: artifact.current_version,
            status: artifact.status,
        };
        self.write(artifact);
        self.emit(change);
    }

    pub fn set_active_artifact(&mut self, active: Option<ArtifactRef>) {
        if self.active == active {
            return;
        }
        self.active = active.clone();
        self.emit(StoreChange::ActiveArtifactChanged { active });
    }

    /// Show or hide the panel. `tab` is a hint for which tab to show; `None`
    /// keeps the current one.
    pub fn set_panel_visible(&mut self, visible: bool, tab: Option<PanelTab>) {
        let panel = PanelState {
            visible,
            tab: tab.unwrap_or(self.panel.tab),
        };
        if panel == self.panel {
            return;
        }
        self.panel = panel;
        self.emit(StoreChange::PanelChanged { panel });
    }

    /// Status set by the sandbox (`executing`, `error`, back to `ready`).
    /// Returns false for an unknown record.
    pub fn set_status(
        &mut self,
        message_id: &str,
        artifact_id: &str,
        status: ArtifactStatus,
        error: Option<String>,
    ) -> bool {
        let now = (self.clock)();
        let Some(entry) = self.entry_mut(message_id, artifact_id) else {
            return false;
        };
        entry.artifact.status = status;
        entry.artifact.error = if status == ArtifactStatus::Error { error } else { None };
        entry.artifact.updated_at = now;

        self.emit(StoreChange::StatusChanged {
            message_id: message_id.to_string(),
            artifact_id: artifact_id.to_string(),
            status,
        });
        true
    }

    /// Drop every record of one message. Returns how many were removed.
    pub fn remove_message(&mut self, message_id: &str) -> usize {
        let Some(records) = self.messages.shift_remove(message_id) else {
            return 0;
        };
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.message_id == message_id)
        {
            self.active = None;
        }
        let removed = records.len();
        self.emit(StoreChange::MessageRemoved {
            message_id: message_id.to_string(),
            removed,
        });
        removed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.active = None;
        self.panel = PanelState::default();
        self.emit(StoreChange::Cleared);
    }

    // -------------------------------------------------------------------------
    // Scanner lifecycle
    // -------------------------------------------------------------------------

    /// Open tag seen: materialize a `creating` placeholder with empty code
    pub fn begin_artifact(&mut self, start: &ArtifactStart, session_id: &str) {
        let now = (self.clock)();
        let (version, created_at) =
            next_version(self.get_artifact(&start.message_id, &start.id), now);

        self.set_artifact(Artifact {
            id: start.id.clone(),
            kind: start.kind,
            title: start.title.clone(),
            code: ArtifactCode::default(),
            config: None,
            status: ArtifactStatus::Creating,
            is_streaming: true,
            message_id: start.message_id.clone(),
            session_id: session_id.to_string(),
            current_version: version,
            created_at,
            updated_at: now,
            error: None,
        });
    }

    /// Replace the code of a streaming record in place. Records that are not
    /// streaming are left alone.
    pub fn update_code(&mut self, update: &CodeUpdate) -> bool {
        let now = (self.clock)();
        let Some(entry) = self.entry_mut(&update.message_id, &update.artifact_id) else {
            return false;
        };
        if !entry.artifact.is_streaming {
            logging::debug(
                COMPONENT,
                &format!("ignoring code update for finished artifact `{}`", update.artifact_id),
            );
            return false;
        }

        entry.artifact.code.content.clone_from(&update.content);
        entry.artifact.status = ArtifactStatus::Streaming;
        entry.artifact.updated_at = now;

        self.emit(StoreChange::CodeUpdated {
            message_id: update.message_id.clone(),
            artifact_id: update.artifact_id.clone(),
        });
        true
    }

    /// Close tag seen: finalize the record at its new version and persist it.
    /// Returns the version written.
    pub fn complete_artifact(&mut self, parsed: &ParsedArtifact, session_id: &str) -> u32 {
        let now = (self.clock)();
        let (version, created_at) =
            next_version(self.get_artifact(&parsed.message_id, &parsed.id), now);

        let artifact = Artifact {
            id: parsed.id.clone(),
            kind: parsed.kind,
            title: parsed.title.clone(),
            code: ArtifactCode::tsx(parsed.code.clone()),
            config: parsed.config.clone(),
            status: ArtifactStatus::Ready,
            is_streaming: false,
            message_id: parsed.message_id.clone(),
            session_id: session_id.to_string(),
            current_version: version,
            created_at,
            updated_at: now,
            error: None,
        };

        if let Some(persistence) = self.persistence.as_mut() {
            if let Err(e) = persistence.persist(&artifact) {
                logging::error(COMPONENT, &format!("persist failed: {}", e));
            }
        }

        self.set_artifact(artifact);
        version
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// Rebuild records from complete messages. Every record lands at version
    /// 1; a record identical to the stored one is left untouched, so running
    /// this twice changes nothing. Returns the number of artifacts found.
    pub fn restore_from_messages(&mut self, messages: &[StoredMessage], session_id: &str) -> usize {
        // Last definition of an id within a message wins
        let mut latest: IndexMap<(String, String), Artifact> = IndexMap::new();
        for artifact in self.restorer.extract_all(messages, session_id) {
            latest.insert((artifact.message_id.clone(), artifact.id.clone()), artifact);
        }
        let found = latest.len();

        for ((message_id, artifact_id), artifact) in latest {
            let unchanged = self
                .get_artifact(&message_id, &artifact_id)
                .is_some_and(|existing| {
                    existing.current_version == 1
                        && existing.status == ArtifactStatus::Ready
                        && !existing.is_streaming
                        && existing.session_id == artifact.session_id
                        && existing.same_definition(&artifact)
                });
            if !unchanged {
                self.write(artifact);
            }
        }

        logging::debug(
            COMPONENT,
            &format!("restored {} artifacts from {} messages", found, messages.len()),
        );
        self.emit(StoreChange::Restored {
            messages: messages.len(),
            artifacts: found,
        });
        found
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    pub fn subscribe(&mut self, observer: impl ArtifactObserver + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// Queue a change and deliver the queue unless a delivery is already
    /// running, in which case that loop picks it up.
    fn emit(&mut self, change: StoreChange) {
        self.pending.push_back(change);
        if self.notifying {
            return;
        }

        self.notifying = true;
        while let Some(change) = self.pending.pop_front() {
            for (_, observer) in self.observers.iter_mut() {
                observer.on_change(&change);
            }
        }
        self.notifying = false;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn write(&mut self, artifact: Artifact) {
        self.sequence += 1;
        let entry = Entry {
            touched: self.sequence,
            artifact,
        };
        self.messages
            .entry(entry.artifact.message_id.clone())
            .or_default()
            .insert(entry.artifact.id.clone(), entry);
    }

    fn entry_mut(&mut self, message_id: &str, artifact_id: &str) -> Option<&mut Entry> {
        self.sequence += 1;
        let touched = self.sequence;
        let entry = self.messages.get_mut(message_id)?.get_mut(artifact_id)?;
        entry.touched = touched;
        Some(entry)
    }
}

// =============================================================================
// Tests
// =============================================================================
