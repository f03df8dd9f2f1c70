//! StreamingScanner: incremental artifact extraction
//!
//! Consumes a chat response fragment by fragment and reports artifact
//! lifecycle events as soon as the buffered text allows.
//!
//! # Architecture
//! - **One `ParseState` per message**: cursor, mode, drafts, full text buffer
//! - **Resumable loop**: each `parse()` call resumes from the saved cursor,
//!   never from the start of the buffer
//! - **Partial-tag waits**: when a search fails, a buffer tail that could be
//!   the start of the next tag stops the cursor, so a tag split across two
//!   fragments is found once the rest arrives
//!
//! # Modes
//! ```text
//! Searching --<artifact ok>--> Artifact --<code>--> Code --</code>--> Artifact
//!     ^                          |   \--<config>--> Config --</config>--^
//!     \-------</artifact>--------/
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::artifact::ArtifactKind;
use crate::config::ScannerConfig;
use crate::logging;
use crate::scanner::attributes::{ArtifactAttributes, CodeAttributes};
use crate::scanner::events::{
    ArtifactStart, CodeComplete, CodeUpdate, NoopHandler, ParsedArtifact, ScanError, ScanHandler,
};
use crate::scanner::grammar::{
    context_snippet, find_partial_prefix_match, locate_tag, locate_tag_end,
    stable_entity_boundary, unescape_reserved, TagGrammar,
};
use crate::scanner::state::{ArtifactDraft, CodeDraft, ConfigDraft, ParseState, ScanMode};

const COMPONENT: &str = "StreamingScanner";

// =============================================================================
// Types
// =============================================================================

/// Snapshot of the artifact currently being streamed for a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingArtifact {
    pub message_id: String,
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    /// `artifact`, `code` or `config`
    pub mode: String,
    pub language: Option<String>,
    /// Code seen so far (unescaped)
    pub code: String,
    pub has_config: bool,
}

/// Tag literals, precomputed from the vocabulary
#[derive(Debug, Clone)]
struct TagLiterals {
    artifact_open: String,
    artifact_close: String,
    code_open: String,
    code_close: String,
    config_open: String,
    config_close: String,
}

impl TagLiterals {
    fn from_config(config: &ScannerConfig) -> Self {
        let tags = &config.tags;
        Self {
            artifact_open: tags.artifact_open(),
            artifact_close: tags.artifact_close(),
            code_open: tags.code_open(),
            code_close: tags.code_close(),
            config_open: tags.config_open(),
            config_close: tags.config_close(),
        }
    }
}

/// Outcome of one state-machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// State changed, run the next step
    Continue,
    /// Nothing more can be decided until more text arrives
    Wait,
}

/// Child tag found while inside an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildTag {
    Code,
    Config,
    Close,
}

// =============================================================================
// StreamingScanner
// =============================================================================

/// Incremental scanner for artifact tags embedded in streamed text
pub struct StreamingScanner {
    config: ScannerConfig,
    grammar: TagGrammar,
    literals: TagLiterals,
    states: HashMap<String, ParseState>,
    handler: Option<Box<dyn ScanHandler>>,
}

impl Default for StreamingScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingScanner {
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    pub fn with_config(config: ScannerConfig) -> Self {
        Self {
            grammar: TagGrammar::new(config.tags.clone()),
            literals: TagLiterals::from_config(&config),
            config,
            states: HashMap::new(),
            handler: None,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    /// Register the handler used by [`parse`](Self::parse). Replaces any
    /// previous one.
    pub fn set_callbacks(&mut self, handler: impl ScanHandler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn clear_callbacks(&mut self) -> Option<Box<dyn ScanHandler>> {
        self.handler.take()
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Append `fragment` to the message buffer, advance as far as possible and
    /// report events to the registered handler. Returns the full text
    /// received so far, unmodified.
    pub fn parse(&mut self, message_id: &str, fragment: &str) -> &str {
        let mut handler = self.handler.take();
        match handler.as_deref_mut() {
            Some(h) => self.advance(message_id, fragment, h),
            None => self.advance(message_id, fragment, &mut NoopHandler),
        }
        self.handler = handler;
        self.buffered_text(message_id).unwrap_or_default()
    }

    /// Same as [`parse`](Self::parse) with an explicit handler. The
    /// registered handler is not called.
    pub fn parse_with(
        &mut self,
        message_id: &str,
        fragment: &str,
        handler: &mut dyn ScanHandler,
    ) -> &str {
        self.advance(message_id, fragment, handler);
        self.buffered_text(message_id).unwrap_or_default()
    }

    fn advance(&mut self, message_id: &str, fragment: &str, handler: &mut dyn ScanHandler) {
        let Self {
            config,
            grammar,
            literals,
            states,
            ..
        } = self;

        let state = states.entry(message_id.to_string()).or_default();
        state.text.push_str(fragment);

        let mut pass = ScanPass {
            message_id,
            config,
            grammar,
            literals,
            handler,
        };

        loop {
            let step = match state.mode {
                ScanMode::Searching => pass.search(state),
                ScanMode::Artifact => pass.inside_artifact(state),
                ScanMode::Code => pass.inside_code(state),
                ScanMode::Config => pass.inside_config(state),
            };
            if step == Step::Wait {
                break;
            }
        }
    }

    // -------------------------------------------------------------------------
    // State management
    // -------------------------------------------------------------------------

    /// Drop the parse state of one message. Returns whether there was one.
    pub fn reset_state(&mut self, message_id: &str) -> bool {
        self.states.remove(message_id).is_some()
    }

    /// Drop every parse state
    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn has_state(&self, message_id: &str) -> bool {
        self.states.contains_key(message_id)
    }

    /// Message ids with a live parse state, sorted
    pub fn active_messages(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.states.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn buffered_text(&self, message_id: &str) -> Option<&str> {
        self.states.get(message_id).map(|s| s.text.as_str())
    }

    /// Scan cursor of a message (for diagnostics)
    pub fn position(&self, message_id: &str) -> Option<usize> {
        self.states.get(message_id).map(|s| s.position)
    }

    /// The artifact currently open in a message, if any
    pub fn pending_artifact(&self, message_id: &str) -> Option<PendingArtifact> {
        let state = self.states.get(message_id)?;
        let draft = state.artifact.as_ref()?;

        let (code, language) = match (&state.code, state.mode) {
            (Some(code), ScanMode::Code) => (code.last_reported.clone(), Some(code.language.clone())),
            _ => (draft.code.clone().unwrap_or_default(), draft.language.clone()),
        };

        Some(PendingArtifact {
            message_id: message_id.to_string(),
            id: draft.id.clone(),
            kind: draft.kind,
            title: draft.title.clone(),
            mode: state.mode.as_str().to_string(),
            language,
            code,
            has_config: draft.config_raw.is_some() || state.mode == ScanMode::Config,
        })
    }
}

// =============================================================================
// ScanPass: one parse() call over one message
// =============================================================================

struct ScanPass<'a> {
    message_id: &'a str,
    config: &'a ScannerConfig,
    grammar: &'a TagGrammar,
    literals: &'a TagLiterals,
    handler: &'a mut dyn ScanHandler,
}

impl ScanPass<'_> {
    /// Searching: look for an artifact open tag
    fn search(&mut self, state: &mut ParseState) -> Step {
        let open_literal = &self.literals.artifact_open;

        let Some(open) = locate_tag(&state.text, state.position, open_literal) else {
            let stop = find_partial_prefix_match(&state.text, state.position, open_literal)
                .unwrap_or(state.text.len());
            state.advance_to(stop);
            return Step::Wait;
        };

        let Some(end) = locate_tag_end(&state.text, open) else {
            // Open tag not fully buffered yet
            state.advance_to(open);
            return Step::Wait;
        };

        let attrs = self
            .grammar
            .parse_attributes(&state.text[open + open_literal.len()..end]);
        let after = end + 1;

        match ArtifactAttributes::from_map(&attrs) {
            Ok(attrs) => {
                let start = ArtifactStart {
                    id: attrs.id.clone(),
                    kind: attrs.kind,
                    title: attrs.title.clone(),
                    message_id: self.message_id.to_string(),
                };
                state.artifact = Some(ArtifactDraft {
                    id: attrs.id,
                    kind: attrs.kind,
                    title: attrs.title,
                    code: None,
                    language: None,
                    config_raw: None,
                });
                state.mode = ScanMode::Artifact;
                state.advance_to(after);

                logging::debug(
                    COMPONENT,
                    &format!("artifact `{}` opened in message {}", start.id, self.message_id),
                );
                self.handler.on_artifact_start(&start);
            }
            Err(err) => {
                let error = ScanError {
                    message: err.to_string(),
                    position: open,
                    context: context_snippet(&state.text, open, after, self.config.context_radius),
                };
                state.advance_to(after);

                logging::warn(
                    COMPONENT,
                    &format!("skipping malformed tag at {} in message {}: {}", open, self.message_id, error.message),
                );
                self.handler.on_error(&error);
            }
        }
        Step::Continue
    }

    /// Artifact: the earliest of code open, config open or artifact close wins
    fn inside_artifact(&mut self, state: &mut ParseState) -> Step {
        let lit = self.literals;
        let from = state.position;

        let next = [
            (ChildTag::Code, locate_tag(&state.text, from, &lit.code_open)),
            (ChildTag::Config, locate_tag(&state.text, from, &lit.config_open)),
            (ChildTag::Close, locate_tag(&state.text, from, &lit.artifact_close)),
        ]
        .into_iter()
        .filter_map(|(tag, pos)| pos.map(|p| (tag, p)))
        .min_by_key(|(_, pos)| *pos);

        let Some((tag, pos)) = next else {
            let stop = [&lit.code_open, &lit.config_open, &lit.artifact_close]
                .into_iter()
                .filter_map(|literal| find_partial_prefix_match(&state.text, from, literal))
                .min()
                .unwrap_or(state.text.len());
            state.advance_to(stop);
            return Step::Wait;
        };

        match tag {
            ChildTag::Close => {
                state.advance_to(pos + lit.artifact_close.len());
                self.complete_artifact(state);
                Step::Continue
            }
            ChildTag::Code => {
                let Some(end) = locate_tag_end(&state.text, pos) else {
                    state.advance_to(pos);
                    return Step::Wait;
                };
                let attrs = self
                    .grammar
                    .parse_attributes(&state.text[pos + lit.code_open.len()..end]);
                let code = CodeAttributes::from_map(&attrs, self.config.default_language);

                state.code = Some(CodeDraft {
                    language: code.language,
                    start: end + 1,
                    last_reported: String::new(),
                });
                state.mode = ScanMode::Code;
                state.advance_to(end + 1);
                Step::Continue
            }
            ChildTag::Config => {
                let Some(end) = locate_tag_end(&state.text, pos) else {
                    state.advance_to(pos);
                    return Step::Wait;
                };
                state.config = Some(ConfigDraft { start: end + 1 });
                state.mode = ScanMode::Config;
                state.advance_to(end + 1);
                Step::Continue
            }
        }
    }

    /// Code: stream the body until the code close tag
    fn inside_code(&mut self, state: &mut ParseState) -> Step {
        let close_literal = &self.literals.code_close;
        let Some(draft) = state.code.as_mut() else {
            state.mode = ScanMode::Artifact;
            return Step::Continue;
        };
        let Some(artifact) = state.artifact.as_mut() else {
            state.code = None;
            state.mode = ScanMode::Searching;
            return Step::Continue;
        };

        match locate_tag(&state.text, state.position, close_literal) {
            Some(close) => {
                let content = unescape_reserved(&state.text[draft.start..close]);
                let complete = CodeComplete {
                    message_id: self.message_id.to_string(),
                    artifact_id: artifact.id.clone(),
                    language: draft.language.clone(),
                    content: content.clone(),
                };

                artifact.code = Some(content);
                artifact.language = Some(draft.language.clone());
                state.code = None;
                state.mode = ScanMode::Artifact;
                state.advance_to(close + close_literal.len());

                self.handler.on_code_complete(&complete);
                Step::Continue
            }
            None => {
                let stop = find_partial_prefix_match(&state.text, state.position, close_literal)
                    .unwrap_or(state.text.len());
                let raw = &state.text[draft.start..stop];
                let content = unescape_reserved(&raw[..stable_entity_boundary(raw)]);

                if content != draft.last_reported {
                    draft.last_reported = content.clone();
                    let update = CodeUpdate {
                        message_id: self.message_id.to_string(),
                        artifact_id: artifact.id.clone(),
                        language: draft.language.clone(),
                        content,
                    };
                    self.handler.on_code_update(&update);
                }
                state.advance_to(stop);
                Step::Wait
            }
        }
    }

    /// Config: buffer the raw body until the config close tag
    fn inside_config(&mut self, state: &mut ParseState) -> Step {
        let close_literal = &self.literals.config_close;
        let Some(draft) = state.config.as_ref() else {
            state.mode = ScanMode::Artifact;
            return Step::Continue;
        };

        match locate_tag(&state.text, state.position, close_literal) {
            Some(close) => {
                let raw = state.text[draft.start..close].to_string();
                if let Some(artifact) = state.artifact.as_mut() {
                    artifact.config_raw = Some(raw);
                }
                state.config = None;
                state.mode = ScanMode::Artifact;
                state.advance_to(close + close_literal.len());
                Step::Continue
            }
            None => {
                let stop = find_partial_prefix_match(&state.text, state.position, close_literal)
                    .unwrap_or(state.text.len());
                state.advance_to(stop);
                Step::Wait
            }
        }
    }

    /// Close tag seen: parse the config, report, go back to searching
    fn complete_artifact(&mut self, state: &mut ParseState) {
        let Some(draft) = state.finish_artifact() else {
            return;
        };

        let config = draft
            .config_raw
            .as_deref()
            .and_then(|raw| parse_config(raw, &draft.id, self.message_id));

        let parsed = ParsedArtifact {
            message_id: self.message_id.to_string(),
            id: draft.id,
            kind: draft.kind,
            title: draft.title,
            language: draft
                .language
                .unwrap_or_else(|| self.config.default_language.as_str().to_string()),
            code: draft.code.unwrap_or_default(),
            config,
        };

        logging::debug(
            COMPONENT,
            &format!(
                "artifact `{}` completed in message {} ({} bytes of code)",
                parsed.id,
                self.message_id,
                parsed.code.len()
            ),
        );
        self.handler.on_artifact_complete(&parsed);
    }
}

/// Parse a config body as JSON. Failures are logged, never fatal.
pub(crate) fn parse_config(raw: &str, artifact_id: &str, message_id: &str) -> Option<serde_json::Value> {
    let body = unescape_reserved(raw);
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            logging::warn(
                COMPONENT,
                &format!("ignoring unparseable config of artifact `{}` in message {}: {}", artifact_id, message_id, e),
            );
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::events::EventLog;

    fn scan_all(text: &str) -> EventLog {
        let mut scanner = StreamingScanner::new();
        let mut log = EventLog::new();
        scanner.parse_with("m1", text, &mut log);
        log
    }

    #[test]
    fn test_plain_text_produces_no_events() {
        let log = scan_all("just a normal answer with <b>markup</b> and a < sign");
        assert!(log.is_empty());
    }

    #[test]
    fn test_parse_returns_full_text_unmodified() {
        let mut scanner = StreamingScanner::new();
        scanner.parse("m1", "hi <artifact id=\"a\" ");
        let text = scanner.parse("m1", "type=\"component\" title=\"T\">");
        assert_eq!(text, "hi <artifact id=\"a\" type=\"component\" title=\"T\">");
    }

    #[test]
    fn test_artifact_without_code_completes_empty() {
        let log = scan_all(r#"<artifact id="a" type="component" title="T"></artifact>"#);
        let done = log.completions();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].code, "");
        assert_eq!(done[0].language, "tsx");
        assert!(log.code_completions().is_empty());
    }

    #[test]
    fn test_config_parsed_on_completion() {
        let log = scan_all(
            r#"<artifact id="a" type="react-component" title="T"><config>{"theme":"dark"}</config><code>x</code></artifact>"#,
        );
        let done = log.completions();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].config.as_ref().unwrap()["theme"], "dark");
        assert_eq!(done[0].code, "x");
    }

    #[test]
    fn test_bad_config_is_not_fatal() {
        let log = scan_all(
            r#"<artifact id="a" type="component" title="T"><config>{not json</config><code>x</code></artifact>"#,
        );
        let done = log.completions();
        assert_eq!(done.len(), 1);
        assert!(done[0].config.is_none());
        assert!(log.errors().is_empty());
    }

    #[test]
    fn test_code_is_unescaped() {
        let log = scan_all(
            r#"<artifact id="a" type="component" title="T"><code>a &lt; b &amp;&amp; c</code></artifact>"#,
        );
        assert_eq!(log.completions()[0].code, "a < b && c");
    }

    #[test]
    fn test_invalid_kind_reports_error_and_continues() {
        let log = scan_all(
            r#"<artifact id="x" type="svg" title="T"><code>no</code></artifact> <artifact id="ok" type="component" title="T"><code>yes</code></artifact>"#,
        );
        assert_eq!(log.errors().len(), 1);
        assert!(log.errors()[0].message.contains("svg"));
        assert_eq!(log.errors()[0].position, 0);
        let done = log.completions();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, "ok");
        assert_eq!(done[0].code, "yes");
    }

    #[test]
    fn test_waits_on_truncated_open_tag() {
        let mut scanner = StreamingScanner::new();
        let mut log = EventLog::new();
        scanner.parse_with("m1", "hello <artifact id=\"a\" type=\"comp", &mut log);
        assert!(log.is_empty());
        assert_eq!(scanner.position("m1"), Some(6));

        scanner.parse_with("m1", "onent\" title=\"T\">", &mut log);
        assert_eq!(log.starts().len(), 1);
    }

    #[test]
    fn test_cursor_stops_at_partial_open_literal() {
        let mut scanner = StreamingScanner::new();
        scanner.parse("m1", "some text <arti");
        assert_eq!(scanner.position("m1"), Some(10));
    }

    #[test]
    fn test_code_updates_are_cumulative() {
        let mut scanner = StreamingScanner::new();
        let mut log = EventLog::new();
        scanner.parse_with("m1", r#"<artifact id="a" type="component" title="T"><code language="tsx">const"#, &mut log);
        scanner.parse_with("m1", " x = 1;", &mut log);
        scanner.parse_with("m1", "</co", &mut log);
        scanner.parse_with("m1", "de></artifact>", &mut log);

        let updates: Vec<&str> = log.code_updates().iter().map(|u| u.content.as_str()).collect();
        assert_eq!(updates, vec!["const", "const x = 1;"]);
        assert_eq!(log.code_completions()[0].content, "const x = 1;");
        assert_eq!(log.completions().len(), 1);
    }

    #[test]
    fn test_code_update_holds_back_split_entity() {
        let mut scanner = StreamingScanner::new();
        let mut log = EventLog::new();
        scanner.parse_with("m1", r#"<artifact id="a" type="component" title="T"><code>a &l"#, &mut log);
        scanner.parse_with("m1", "t; b", &mut log);

        let updates: Vec<&str> = log.code_updates().iter().map(|u| u.content.as_str()).collect();
        assert_eq!(updates, vec!["a ", "a < b"]);
    }

    #[test]
    fn test_nested_open_tag_inside_artifact_is_ignored() {
        let log = scan_all(
            r#"<artifact id="a" type="component" title="T"><artifact id="b" type="component" title="U"><code>x</code></artifact>"#,
        );
        assert_eq!(log.starts().len(), 1);
        assert_eq!(log.completions()[0].id, "a");
    }

    #[test]
    fn test_pending_artifact_snapshot() {
        let mut scanner = StreamingScanner::new();
        assert!(scanner.pending_artifact("m1").is_none());

        scanner.parse("m1", r#"<artifact id="a" type="component" title="T"><code>abc"#);
        let pending = scanner.pending_artifact("m1").unwrap();
        assert_eq!(pending.id, "a");
        assert_eq!(pending.mode, "code");
        assert_eq!(pending.code, "abc");
        assert_eq!(pending.language.as_deref(), Some("tsx"));

        scanner.parse("m1", "</code></artifact>");
        assert!(scanner.pending_artifact("m1").is_none());
        assert!(scanner.has_state("m1"));
    }

    #[test]
    fn test_messages_are_independent() {
        let mut scanner = StreamingScanner::new();
        let mut log = EventLog::new();
        scanner.parse_with("m1", r#"<artifact id="a" type="component" title="T"><code>one"#, &mut log);
        scanner.parse_with("m2", r#"<artifact id="a" type="component" title="T"><code>two</code></artifact>"#, &mut log);
        scanner.parse_with("m1", "</code></artifact>", &mut log);

        let done = log.completions();
        assert_eq!(done.len(), 2);
        assert_eq!((done[0].message_id.as_str(), done[0].code.as_str()), ("m2", "two"));
        assert_eq!((done[1].message_id.as_str(), done[1].code.as_str()), ("m1", "one"));
        assert_eq!(scanner.active_messages(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_reset_and_clear() {
        let mut scanner = StreamingScanner::new();
        scanner.parse("m1", "a");
        scanner.parse("m2", "b");
        assert!(scanner.reset_state("m1"));
        assert!(!scanner.reset_state("m1"));
        assert!(!scanner.has_state("m1"));

        scanner.clear();
        assert!(scanner.active_messages().is_empty());
    }

    #[test]
    fn test_registered_callbacks_receive_events() {
        use std::cell::RefCell;
        use std::rc::Rc;
        use crate::scanner::events::ScanCallbacks;

        let ids = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&ids);
        let mut scanner = StreamingScanner::new();
        scanner.set_callbacks(ScanCallbacks::new().with_artifact_complete(move |a| sink.borrow_mut().push(a.id.clone())));

        scanner.parse("m1", r#"<artifact id="a1" type="component" title="T"></artifact>"#);
        assert_eq!(*ids.borrow(), vec!["a1".to_string()]);

        scanner.clear_callbacks();
        scanner.parse("m1", r#"<artifact id="a2" type="component" title="T"></artifact>"#);
        assert_eq!(ids.borrow().len(), 1);
    }

    #[test]
    fn test_custom_vocabulary() {
        let config = ScannerConfig::from_json(r#"{"tags":{"artifact":"widget","code":"src"}}"#).unwrap();
        let mut scanner = StreamingScanner::with_config(config);
        let mut log = EventLog::new();
        scanner.parse_with("m1", r#"<widget id="w" type="component" title="W"><src>ok</src></widget>"#, &mut log);
        assert_eq!(log.completions()[0].code, "ok");
    }
}
