//! Validated tag attributes
//!
//! The raw attribute bag from `TagGrammar::parse_attributes` is checked here,
//! right after parsing, so the rest of the scanner only ever handles typed,
//! complete open tags.

use std::collections::HashMap;

use crate::artifact::{ArtifactKind, CodeLanguage};
use crate::error::TagError;

/// Required attributes of an artifact open tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactAttributes {
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
}

impl ArtifactAttributes {
    /// Check `id`, `type`, `title` (in that order) and the kind enum
    pub fn from_map(attrs: &HashMap<String, String>) -> Result<Self, TagError> {
        let id = required(attrs, "id")?;
        let kind_raw = required(attrs, "type")?;
        let title = required(attrs, "title")?;
        let kind = ArtifactKind::parse(kind_raw)?;

        Ok(Self {
            id: id.to_string(),
            kind,
            title: title.to_string(),
        })
    }
}

fn required<'a>(attrs: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, TagError> {
    attrs
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(TagError::MissingAttribute(key))
}

/// Attributes of a code open tag. Nothing is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttributes {
    /// Language as declared on the tag, lower-cased
    pub language: String,
}

impl CodeAttributes {
    pub fn from_map(attrs: &HashMap<String, String>, default_language: CodeLanguage) -> Self {
        let language = attrs
            .get("language")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default_language.as_str().to_string());
        Self { language }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_complete_artifact_attributes() {
        let parsed = ArtifactAttributes::from_map(&attrs(&[
            ("id", "a1"),
            ("type", "component"),
            ("title", "Counter"),
        ]))
        .unwrap();
        assert_eq!(parsed.id, "a1");
        assert_eq!(parsed.kind, ArtifactKind::Component);
        assert_eq!(parsed.title, "Counter");
    }

    #[test]
    fn test_missing_title() {
        let err = ArtifactAttributes::from_map(&attrs(&[("id", "a1"), ("type", "component")])).unwrap_err();
        assert_eq!(err, TagError::MissingAttribute("title"));
    }

    #[test]
    fn test_blank_id_counts_as_missing() {
        let err = ArtifactAttributes::from_map(&attrs(&[
            ("id", "  "),
            ("type", "component"),
            ("title", "x"),
        ]))
        .unwrap_err();
        assert_eq!(err, TagError::MissingAttribute("id"));
    }

    #[test]
    fn test_unsupported_kind() {
        let err = ArtifactAttributes::from_map(&attrs(&[
            ("id", "a1"),
            ("type", "svg"),
            ("title", "x"),
        ]))
        .unwrap_err();
        assert_eq!(err, TagError::UnsupportedKind("svg".to_string()));
    }

    #[test]
    fn test_code_language_default_and_declared() {
        assert_eq!(CodeAttributes::from_map(&attrs(&[]), CodeLanguage::Tsx).language, "tsx");
        assert_eq!(
            CodeAttributes::from_map(&attrs(&[("language", "JSX")]), CodeLanguage::Tsx).language,
            "jsx"
        );
    }
}
