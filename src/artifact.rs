//! Artifact data model
//!
//! Canonical records shared by the scanner, the store and the offline
//! restorer. Field names serialize in camelCase so the TypeScript side sees
//! `isStreaming`, `currentVersion`, etc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TagError;

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of embedded component
///
/// Only two wire values are accepted: the primary `react-component` and its
/// short alias `component`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "react-component")]
    ReactComponent,
    #[serde(rename = "component")]
    Component,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ReactComponent => "react-component",
            ArtifactKind::Component => "component",
        }
    }

    /// Parse a `type` attribute value (case-insensitive, surrounding
    /// whitespace ignored)
    pub fn parse(value: &str) -> Result<Self, TagError> {
        let normalized = value.trim();
        if normalized.eq_ignore_ascii_case("react-component") {
            Ok(ArtifactKind::ReactComponent)
        } else if normalized.eq_ignore_ascii_case("component") {
            Ok(ArtifactKind::Component)
        } else {
            Err(TagError::UnsupportedKind(value.to_string()))
        }
    }
}

/// Source language of artifact code. There is exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Tsx,
}

impl CodeLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::Tsx => "tsx",
        }
    }
}

/// Lifecycle status of an artifact record
///
/// `Creating`, `Streaming` and `Ready` are driven by the scanner;
/// `Executing` and `Error` belong to the sandbox that previews the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Creating,
    Streaming,
    Ready,
    Executing,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Creating => "creating",
            ArtifactStatus::Streaming => "streaming",
            ArtifactStatus::Ready => "ready",
            ArtifactStatus::Executing => "executing",
            ArtifactStatus::Error => "error",
        }
    }
}

/// Which tab the artifact panel should open on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelTab {
    Editor,
    #[default]
    Preview,
}

// =============================================================================
// Records
// =============================================================================

/// Code body of an artifact
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtifactCode {
    pub language: CodeLanguage,
    pub content: String,
}

impl ArtifactCode {
    pub fn tsx(content: impl Into<String>) -> Self {
        Self {
            language: CodeLanguage::Tsx,
            content: content.into(),
        }
    }
}

/// Canonical record of one embedded component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub code: ArtifactCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub status: ArtifactStatus,
    pub is_streaming: bool,
    pub message_id: String,
    pub session_id: String,
    pub current_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Sandbox failure detail, only set alongside `ArtifactStatus::Error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Artifact {
    /// Same component definition, ignoring lifecycle bookkeeping
    /// (status, version, timestamps)
    pub fn same_definition(&self, other: &Artifact) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.title == other.title
            && self.code == other.code
            && self.config == other.config
    }
}

/// Addresses one record in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub message_id: String,
    pub artifact_id: String,
}

impl ArtifactRef {
    pub fn new(message_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            artifact_id: artifact_id.into(),
        }
    }
}

/// A complete message loaded from storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at: None,
        }
    }
}
