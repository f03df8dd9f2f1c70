//! Scanner configuration
//!
//! The tag vocabulary is fixed per deployment but not hard-coded: the chat
//! model's system prompt decides the tag names, so they are loaded from the
//! same JSON config the front end ships with.

use serde::{Deserialize, Serialize};

use crate::artifact::CodeLanguage;
use crate::error::ConfigError;

// =============================================================================
// Tag Vocabulary
// =============================================================================

/// Names of the three tags the scanner understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagVocabulary {
    /// Outer tag, `<artifact id=".." type=".." title="..">`
    pub artifact: String,
    /// Code body tag, `<code language="..">`
    pub code: String,
    /// Optional JSON config tag, `<config>`
    pub config: String,
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self {
            artifact: "artifact".to_string(),
            code: "code".to_string(),
            config: "config".to_string(),
        }
    }
}

impl TagVocabulary {
    pub fn artifact_open(&self) -> String {
        format!("<{}", self.artifact)
    }

    pub fn artifact_close(&self) -> String {
        format!("</{}>", self.artifact)
    }

    pub fn code_open(&self) -> String {
        format!("<{}", self.code)
    }

    pub fn code_close(&self) -> String {
        format!("</{}>", self.code)
    }

    pub fn config_open(&self) -> String {
        format!("<{}", self.config)
    }

    pub fn config_close(&self) -> String {
        format!("</{}>", self.config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for name in [&self.artifact, &self.code, &self.config] {
            let valid = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if !valid {
                return Err(ConfigError::InvalidTagName(name.clone()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Streaming scanner + restorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub tags: TagVocabulary,
    /// Language reported when a code tag declares none. Default: tsx
    pub default_language: CodeLanguage,
    /// Characters of context captured on each side of a malformed tag. Default: 40
    pub context_radius: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tags: TagVocabulary::default(),
            default_language: CodeLanguage::Tsx,
            context_radius: 40,
        }
    }
}

impl ScannerConfig {
    /// Load from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ScannerConfig = serde_json::from_str(json)?;
        config.tags.validate()?;
        Ok(config)
    }
}
