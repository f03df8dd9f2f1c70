//! Store change notifications

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactRef, ArtifactStatus, PanelTab};

/// Visibility of the artifact side panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub visible: bool,
    pub tab: PanelTab,
}

/// What changed in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreChange {
    /// A record was created or replaced
    #[serde(rename_all = "camelCase")]
    ArtifactUpserted {
        message_id: String,
        artifact_id: String,
        version: u32,
        status: ArtifactStatus,
    },
    /// Streaming code of a record was replaced
    #[serde(rename_all = "camelCase")]
    CodeUpdated {
        message_id: String,
        artifact_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        message_id: String,
        artifact_id: String,
        status: ArtifactStatus,
    },
    ActiveArtifactChanged {
        active: Option<ArtifactRef>,
    },
    PanelChanged {
        panel: PanelState,
    },
    #[serde(rename_all = "camelCase")]
    MessageRemoved {
        message_id: String,
        removed: usize,
    },
    Restored {
        messages: usize,
        artifacts: usize,
    },
    Cleared,
}

/// Handle returned by `ArtifactStore::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Receiver of store changes.
///
/// Observers are called synchronously after each mutation. They only get the
/// change description; reading the store back happens after the mutating call
/// has returned.
pub trait ArtifactObserver {
    fn on_change(&mut self, change: &StoreChange);
}

impl<F> ArtifactObserver for F
where
    F: FnMut(&StoreChange),
{
    fn on_change(&mut self, change: &StoreChange) {
        self(change)
    }
}
