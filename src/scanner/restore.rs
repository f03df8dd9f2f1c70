//! HistoryRestorer: offline artifact extraction from complete messages
//!
//! Messages loaded from storage are already whole, so there is no partial-tag
//! handling here. Tags are matched with the same boundaries as the streaming
//! scanner (open tag followed by whitespace, `/` or `>`, exact close tag) and
//! child tags are walked in the same order, so a reloaded conversation shows
//! the artifacts the live stream showed. Output records are shaped exactly
//! like the ones the streaming path produces, at version 1.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::artifact::{Artifact, ArtifactCode, ArtifactStatus, StoredMessage};
use crate::config::ScannerConfig;
use crate::logging;
use crate::scanner::attributes::ArtifactAttributes;
use crate::scanner::grammar::{unescape_reserved, TagGrammar};
use crate::scanner::streaming::parse_config;

const COMPONENT: &str = "HistoryRestorer";

/// `<tag ...>` with the scanner's boundary rule. Group 1: attribute text.
fn open_tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?i)<{}([\s/][^>]*)?>", regex::escape(tag)))
        .expect("open tag regex should compile")
}

/// Exact `</tag>`, case-insensitive
fn close_tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?i)</{}>", regex::escape(tag)))
        .expect("close tag regex should compile")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Code,
    Config,
    Close,
}

/// Everything between an accepted open tag and its close tag
struct ArtifactBody<'t> {
    inner: &'t str,
    code: Option<&'t str>,
    config: Option<&'t str>,
    /// Byte offset just past the close tag
    end: usize,
}

/// Offline extractor for persisted messages
pub struct HistoryRestorer {
    grammar: TagGrammar,
    artifact_open: Regex,
    artifact_close: Regex,
    code_open: Regex,
    code_close: Regex,
    config_open: Regex,
    config_close: Regex,
}

impl Default for HistoryRestorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryRestorer {
    pub fn new() -> Self {
        Self::with_config(&ScannerConfig::default())
    }

    pub fn with_config(config: &ScannerConfig) -> Self {
        let tags = &config.tags;
        Self {
            grammar: TagGrammar::new(tags.clone()),
            artifact_open: open_tag_regex(&tags.artifact),
            artifact_close: close_tag_regex(&tags.artifact),
            code_open: open_tag_regex(&tags.code),
            code_close: close_tag_regex(&tags.code),
            config_open: open_tag_regex(&tags.config),
            config_close: close_tag_regex(&tags.config),
        }
    }

    /// Extract every well-formed artifact of one message.
    ///
    /// Open tags with invalid attributes are skipped and the search resumes
    /// right after them. An artifact that is never closed ends the message.
    /// When no code tag is present the trimmed inner span stands in for the
    /// code.
    pub fn extract(&self, message: &StoredMessage, session_id: &str) -> Vec<Artifact> {
        let text = message.content.as_str();
        let timestamp: DateTime<Utc> = message.created_at.unwrap_or_else(Utc::now);

        let mut artifacts = Vec::new();
        let mut cursor = 0;
        while let Some(open) = self.artifact_open.captures_at(text, cursor) {
            let Some(tag) = open.get(0) else { break };
            cursor = tag.end();

            let attr_text = open.get(1).map_or("", |m| m.as_str());
            let attrs = match ArtifactAttributes::from_map(&self.grammar.parse_attributes(attr_text)) {
                Ok(attrs) => attrs,
                Err(e) => {
                    logging::warn(COMPONENT, &format!("skipping artifact in message {}: {}", message.id, e));
                    continue;
                }
            };

            let Some(body) = self.walk_artifact(text, cursor) else {
                logging::warn(
                    COMPONENT,
                    &format!("artifact `{}` in message {} is never closed", attrs.id, message.id),
                );
                break;
            };
            cursor = body.end;

            let code = body.code.unwrap_or_else(|| body.inner.trim());
            let config = body
                .config
                .and_then(|raw| parse_config(raw, &attrs.id, &message.id));

            artifacts.push(Artifact {
                id: attrs.id,
                kind: attrs.kind,
                title: attrs.title,
                code: ArtifactCode::tsx(unescape_reserved(code)),
                config,
                status: ArtifactStatus::Ready,
                is_streaming: false,
                message_id: message.id.clone(),
                session_id: session_id.to_string(),
                current_version: 1,
                created_at: timestamp,
                updated_at: timestamp,
                error: None,
            });
        }
        artifacts
    }

    /// Walk child tags from `from` until the artifact close tag. The earliest
    /// child wins; code and config bodies end at their own close tag, so an
    /// artifact close inside a body does not end the artifact.
    fn walk_artifact<'t>(&self, text: &'t str, from: usize) -> Option<ArtifactBody<'t>> {
        let mut cursor = from;
        let mut code = None;
        let mut config = None;

        loop {
            let (child, tag) = [
                (Child::Code, self.code_open.find_at(text, cursor)),
                (Child::Config, self.config_open.find_at(text, cursor)),
                (Child::Close, self.artifact_close.find_at(text, cursor)),
            ]
            .into_iter()
            .filter_map(|(child, m)| m.map(|m| (child, m)))
            .min_by_key(|(_, m)| m.start())?;

            match child {
                Child::Close => {
                    return Some(ArtifactBody {
                        inner: &text[from..tag.start()],
                        code,
                        config,
                        end: tag.end(),
                    });
                }
                Child::Code => {
                    let close = self.code_close.find_at(text, tag.end())?;
                    code = Some(&text[tag.end()..close.start()]);
                    cursor = close.end();
                }
                Child::Config => {
                    let close = self.config_close.find_at(text, tag.end())?;
                    config = Some(&text[tag.end()..close.start()]);
                    cursor = close.end();
                }
            }
        }
    }

    /// Extract from a batch of messages, in order
    pub fn extract_all(&self, messages: &[StoredMessage], session_id: &str) -> Vec<Artifact> {
        messages
            .iter()
            .flat_map(|message| self.extract(message, session_id))
            .collect()
    }
}
