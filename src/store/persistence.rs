//! Persistence hook
//!
//! The store hands every completed artifact to an `ArtifactPersistence`.
//! The real backend lives outside this crate (the app's database layer);
//! failures are logged by the store and never reach the scanner.

use std::cell::RefCell;
use std::rc::Rc;

use crate::artifact::Artifact;
use crate::error::PersistError;

pub trait ArtifactPersistence {
    fn persist(&mut self, artifact: &Artifact) -> Result<(), PersistError>;
}

/// In-memory backend. Clones share the same storage, so a caller can keep
/// one handle and give another to the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    saved: Rc<RefCell<Vec<Artifact>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything persisted so far, oldest first
    pub fn saved(&self) -> Vec<Artifact> {
        self.saved.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.saved.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.borrow().is_empty()
    }
}

impl ArtifactPersistence for MemoryPersistence {
    fn persist(&mut self, artifact: &Artifact) -> Result<(), PersistError> {
        self.saved.borrow_mut().push(artifact.clone());
        Ok(())
    }
}
