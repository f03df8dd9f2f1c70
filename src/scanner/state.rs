//! Per-message parse state
//!
//! One `ParseState` per message being streamed. Owned by the scanner, never
//! shared, created on the first fragment and dropped only by an explicit
//! reset or clear.

use crate::artifact::ArtifactKind;

/// Where the scan cursor currently sits in the tag grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Outside any artifact, looking for an open tag
    #[default]
    Searching,
    /// Inside an artifact, between its child tags
    Artifact,
    /// Inside a code body
    Code,
    /// Inside a config body
    Config,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Searching => "searching",
            ScanMode::Artifact => "artifact",
            ScanMode::Code => "code",
            ScanMode::Config => "config",
        }
    }
}

/// Artifact whose open tag has been accepted
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDraft {
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    /// Final code, set when the code close tag is seen
    pub code: Option<String>,
    /// Language declared by the last code tag
    pub language: Option<String>,
    /// Raw config body, set when the config close tag is seen
    pub config_raw: Option<String>,
}

/// Code body being streamed
#[derive(Debug, Clone, PartialEq)]
pub struct CodeDraft {
    pub language: String,
    /// Byte offset just past the code open tag
    pub start: usize,
    /// Last content reported through `on_code_update`
    pub last_reported: String,
}

/// Config body being buffered
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDraft {
    /// Byte offset just past the config open tag
    pub start: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParseState {
    /// Scan cursor. Never decreases, never exceeds `text.len()`.
    pub position: usize,
    pub mode: ScanMode,
    pub artifact: Option<ArtifactDraft>,
    pub code: Option<CodeDraft>,
    pub config: Option<ConfigDraft>,
    /// Everything received for this message so far
    pub text: String,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inside_artifact(&self) -> bool {
        self.mode != ScanMode::Searching
    }

    pub fn inside_code(&self) -> bool {
        self.mode == ScanMode::Code
    }

    pub fn inside_config(&self) -> bool {
        self.mode == ScanMode::Config
    }

    /// Move the cursor forward. Backward moves are ignored.
    pub fn advance_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.text.len());
        if pos > self.position {
            self.position = pos.min(self.text.len());
        }
    }

    /// Drop all per-artifact sub-state and go back to searching
    pub fn finish_artifact(&mut self) -> Option<ArtifactDraft> {
        self.mode = ScanMode::Searching;
        self.code = None;
        self.config = None;
        self.artifact.take()
    }
}
