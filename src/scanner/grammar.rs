//! Tag Grammar: primitives shared by the streaming scanner and the restorer
//!
//! The vocabulary is three fixed tags, not general markup:
//! - `<artifact id=".." type=".." title="..">` ... `</artifact>`
//! - `<code language="..">` ... `</code>`
//! - `<config>` ... `</config>` (optional, JSON body)
//!
//! All positions are byte offsets. Every literal starts with `<`, so any
//! offset returned here lands on a char boundary.

use regex::Regex;
use std::collections::HashMap;

use crate::artifact::Artifact;
use crate::config::TagVocabulary;

/// The five reserved characters and their entity forms.
/// `&apos;` is accepted on input, `&#39;` is produced on output.
const ENTITIES: [(&str, char); 6] = [
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
    ("&quot;", '"'),
    ("&#39;", '\''),
    ("&apos;", '\''),
];

/// Longest entity form, `&apos;`
const MAX_ENTITY_LEN: usize = 6;

// =============================================================================
// Tag Location
// =============================================================================

/// Case-insensitive search for `literal` at or after `from`.
///
/// Open literals (those not ending in `>`) must be followed by whitespace,
/// `>`, `/` or the end of the buffer, so `<codex` is not a `<code` tag. A
/// match that ends exactly at the end of the buffer is returned: the caller
/// will find no `>` yet and wait.
pub fn locate_tag(text: &str, from: usize, literal: &str) -> Option<usize> {
    let hay = text.as_bytes();
    let needle = literal.as_bytes();
    if needle.is_empty() || from > hay.len() {
        return None;
    }
    let needs_boundary = !literal.ends_with('>');

    let mut start = from;
    loop {
        let found = hay[start..]
            .windows(needle.len())
            .position(|window| window.eq_ignore_ascii_case(needle))?;
        let idx = start + found;
        let after = idx + needle.len();

        if !needs_boundary || hay.get(after).map_or(true, |b| is_tag_boundary(*b)) {
            return Some(idx);
        }
        start = idx + 1;
    }
}

fn is_tag_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

/// First `>` at or after `from`. `None` means the tag is not fully buffered.
pub fn locate_tag_end(text: &str, from: usize) -> Option<usize> {
    if from > text.len() {
        return None;
    }
    text.as_bytes()[from..]
        .iter()
        .position(|&b| b == b'>')
        .map(|i| from + i)
}

/// Start of the longest buffer suffix (at or after `from`) that is a strict,
/// case-insensitive prefix of `literal`.
///
/// `"hello </co"` against `"</code>"` gives `Some(6)`: the cursor must stop
/// there and wait for the rest of the tag.
pub fn find_partial_prefix_match(text: &str, from: usize, literal: &str) -> Option<usize> {
    let hay = text.as_bytes();
    let needle = literal.as_bytes();
    if from >= hay.len() || needle.len() < 2 {
        return None;
    }

    let available = hay.len() - from;
    let longest = (needle.len() - 1).min(available);
    (1..=longest).rev().find_map(|k| {
        let tail = &hay[hay.len() - k..];
        tail.eq_ignore_ascii_case(&needle[..k])
            .then_some(hay.len() - k)
    })
}

// =============================================================================
// Reserved Characters
// =============================================================================

/// Replace the reserved entity forms with their literal characters.
/// Unmatched ampersands are kept as-is. Single pass: `&amp;lt;` becomes `&lt;`.
pub fn unescape_reserved(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Inverse of [`unescape_reserved`] for the same five characters
pub fn escape_reserved(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Length of the prefix of a still-streaming body that can be unescaped
/// without cutting an entity in half.
///
/// `"a &l"` gives 2: the `&l` may become `&lt;` once more text arrives, and
/// reporting it now as `&l` would later shrink to `<`.
pub fn stable_entity_boundary(text: &str) -> usize {
    let Some(amp) = text.rfind('&') else {
        return text.len();
    };
    let tail = &text[amp..];
    let incomplete = tail.len() < MAX_ENTITY_LEN
        && !tail.contains(';')
        && ENTITIES.iter().any(|(entity, _)| entity.starts_with(tail));
    if incomplete {
        amp
    } else {
        text.len()
    }
}

// =============================================================================
// Misc helpers
// =============================================================================

/// The span `start..end` plus at most `radius` bytes of leading context.
/// A context start inside a multi-byte char moves forward to the next char
/// boundary. Only already-buffered text before `end` is used, so the
/// snippet does not depend on how fragments were split.
pub fn context_snippet(text: &str, start: usize, end: usize, radius: usize) -> String {
    let end = end.min(text.len());
    let start = start.min(end);
    let mut from = start.saturating_sub(radius);
    while from < start && !text.is_char_boundary(from) {
        from += 1;
    }
    let mut to = end;
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].to_string()
}

// =============================================================================
// TagGrammar
// =============================================================================

/// Attribute parser + markup renderer for one tag vocabulary
pub struct TagGrammar {
    tags: TagVocabulary,
    attribute_re: Regex,
}

impl TagGrammar {
    pub fn new(tags: TagVocabulary) -> Self {
        // key="value" or key='value'
        // Group 1: key, Group 2: double-quoted value, Group 3: single-quoted value
        let attribute_re = Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("attribute regex should compile");

        Self { tags, attribute_re }
    }

    pub fn tags(&self) -> &TagVocabulary {
        &self.tags
    }

    /// Extract every `key="value"` / `key='value'` pair. Keys are
    /// lower-cased, values unescaped, anything else is skipped. A repeated
    /// key keeps its first value.
    pub fn parse_attributes(&self, attr_text: &str) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        for cap in self.attribute_re.captures_iter(attr_text) {
            let Some(key) = cap.get(1) else { continue };
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            attrs
                .entry(key.as_str().to_ascii_lowercase())
                .or_insert_with(|| unescape_reserved(value));
        }
        attrs
    }

    /// Build the markup for an artifact, escaping attribute values and the
    /// code body. Feeding the result back through the scanner yields the
    /// same id, kind, title, code and config.
    pub fn render_artifact(&self, artifact: &Artifact) -> String {
        let mut out = format!(
            "<{} id=\"{}\" type=\"{}\" title=\"{}\">",
            self.tags.artifact,
            escape_reserved(&artifact.id),
            artifact.kind.as_str(),
            escape_reserved(&artifact.title),
        );

        if let Some(config) = &artifact.config {
            out.push_str(&format!(
                "<{tag}>{}</{tag}>",
                escape_reserved(&config.to_string()),
                tag = self.tags.config,
            ));
        }

        out.push_str(&format!(
            "<{tag} language=\"{}\">{}</{tag}>",
            artifact.code.language.as_str(),
            escape_reserved(&artifact.code.content),
            tag = self.tags.code,
        ));
        out.push_str(&self.tags.artifact_close());
        out
    }
}

impl Default for TagGrammar {
    fn default() -> Self {
        Self::new(TagVocabulary::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // locate_tag
    // -------------------------------------------------------------------------

    #[test]
    fn test_locate_tag_case_insensitive() {
        assert_eq!(locate_tag("hi <ARTIFACT id='x'>", 0, "<artifact"), Some(3));
        assert_eq!(locate_tag("hi </Code>", 0, "</code>"), Some(3));
    }

    #[test]
    fn test_locate_tag_respects_from() {
        let text = "<code> <code>";
        assert_eq!(locate_tag(text, 0, "<code"), Some(0));
        assert_eq!(locate_tag(text, 1, "<code"), Some(7));
        assert_eq!(locate_tag(text, 8, "<code"), None);
    }

    #[test]
    fn test_locate_tag_requires_boundary_for_open_literal() {
        assert_eq!(locate_tag("<codex> <code>", 0, "<code"), Some(8));
        assert_eq!(locate_tag("<artifacts>", 0, "<artifact"), None);
    }

    #[test]
    fn test_locate_tag_at_buffer_end_is_a_match() {
        // the caller finds no `>` and waits
        assert_eq!(locate_tag("text <code", 0, "<code"), Some(5));
    }

    #[test]
    fn test_locate_tag_out_of_range() {
        assert_eq!(locate_tag("abc", 10, "<code"), None);
        assert_eq!(locate_tag("", 0, "<code"), None);
    }

    #[test]
    fn test_locate_tag_end() {
        assert_eq!(locate_tag_end("<code lang='x'>", 0), Some(14));
        assert_eq!(locate_tag_end("<code lang='x'", 0), None);
        assert_eq!(locate_tag_end("ab>", 3), None);
    }

    // -------------------------------------------------------------------------
    // find_partial_prefix_match
    // -------------------------------------------------------------------------

    #[test]
    fn test_partial_prefix_longest_suffix() {
        assert_eq!(find_partial_prefix_match("hello </co", 0, "</code>"), Some(6));
        assert_eq!(find_partial_prefix_match("hello <", 0, "</code>"), Some(6));
        assert_eq!(find_partial_prefix_match("hello </CODE", 0, "</code>"), Some(6));
    }

    #[test]
    fn test_partial_prefix_full_literal_is_not_partial() {
        assert_eq!(find_partial_prefix_match("x</code>", 0, "</code>"), None);
    }

    #[test]
    fn test_partial_prefix_respects_from() {
        assert_eq!(find_partial_prefix_match("ab</c", 4, "</code>"), None);
        assert_eq!(find_partial_prefix_match("ab</c", 2, "</code>"), Some(2));
    }

    #[test]
    fn test_partial_prefix_no_match() {
        assert_eq!(find_partial_prefix_match("hello", 0, "</code>"), None);
        assert_eq!(find_partial_prefix_match("", 0, "</code>"), None);
    }

    // -------------------------------------------------------------------------
    // Escaping
    // -------------------------------------------------------------------------

    #[test]
    fn test_unescape_all_entities() {
        assert_eq!(
            unescape_reserved("&lt;div className=&quot;a&quot;&gt; &amp; &#39;x&apos;"),
            "<div className=\"a\"> & 'x'"
        );
    }

    #[test]
    fn test_unescape_leaves_unmatched_ampersand() {
        assert_eq!(unescape_reserved("a && b &nbsp; &"), "a && b &nbsp; &");
    }

    #[test]
    fn test_unescape_single_pass() {
        assert_eq!(unescape_reserved("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_escape_then_unescape() {
        let code = "if (a < b && c > d) { say(\"it's\") }";
        assert_eq!(unescape_reserved(&escape_reserved(code)), code);
        assert!(!escape_reserved(code).contains('<'));
    }

    #[test]
    fn test_stable_entity_boundary() {
        assert_eq!(stable_entity_boundary("a &l"), 2);
        assert_eq!(stable_entity_boundary("a &"), 2);
        assert_eq!(stable_entity_boundary("a &lt;"), 6);
        assert_eq!(stable_entity_boundary("a && b"), 6);
        assert_eq!(stable_entity_boundary("plain"), 5);
    }

    #[test]
    fn test_context_snippet_char_boundaries() {
        let text = "ééééé<artifact>ééééé";
        // 3 bytes back from 10 lands inside an é: only one whole é fits
        let snippet = context_snippet(text, 10, 20, 3);
        assert_eq!(snippet, "é<artifact>");
        assert_eq!(context_snippet(text, 10, 20, 4), "éé<artifact>");
        assert_eq!(context_snippet(text, 10, 20, 0), "<artifact>");
        assert_eq!(context_snippet(text, 10, 20, 100), "ééééé<artifact>");
    }

    // -------------------------------------------------------------------------
    // Attributes + rendering
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_attributes_mixed_quotes() {
        let grammar = TagGrammar::default();
        let attrs = grammar.parse_attributes(r#" id="a1" TYPE='component' title="Tom &amp; Jerry" junk data-x = "1""#);
        assert_eq!(attrs.get("id").map(String::as_str), Some("a1"));
        assert_eq!(attrs.get("type").map(String::as_str), Some("component"));
        assert_eq!(attrs.get("title").map(String::as_str), Some("Tom & Jerry"));
        assert_eq!(attrs.get("data-x").map(String::as_str), Some("1"));
        assert!(!attrs.contains_key("junk"));
    }

    fn tricky_artifact() -> Artifact {
        use crate::artifact::{ArtifactCode, ArtifactKind, ArtifactStatus};
        let now = chrono::Utc::now();
        Artifact {
            id: "chart-1".into(),
            kind: ArtifactKind::ReactComponent,
            title: r#"Tom & "Jerry" <b>'s</b>"#.into(),
            code: ArtifactCode::tsx(r#"const s = '</code></artifact>'; if (a < b && c > d) { q = "x"; }"#),
            config: Some(serde_json::json!({ "label": "<a & 'b'>", "quote": "\"", "n": 2 })),
            status: ArtifactStatus::Ready,
            is_streaming: false,
            message_id: "m1".into(),
            session_id: String::new(),
            current_version: 1,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    #[test]
    fn test_render_artifact_scans_back_unchanged() {
        use crate::scanner::events::EventLog;
        use crate::scanner::streaming::StreamingScanner;

        let artifact = tricky_artifact();
        let markup = TagGrammar::default().render_artifact(&artifact);
        assert!(!markup.contains("'</code>"));

        let mut whole = EventLog::new();
        StreamingScanner::new().parse_with("m1", &markup, &mut whole);
        let done = whole.completions();
        assert_eq!(done.len(), 1);
        assert!(whole.errors().is_empty());
        assert_eq!(done[0].id, artifact.id);
        assert_eq!(done[0].kind, artifact.kind);
        assert_eq!(done[0].title, artifact.title);
        assert_eq!(done[0].code, artifact.code.content);
        assert_eq!(done[0].config, artifact.config);
        assert_eq!(done[0].language, "tsx");

        // Same result when the markup arrives one char at a time
        let mut scanner = StreamingScanner::new();
        let mut trickle = EventLog::new();
        let mut buf = [0u8; 4];
        for ch in markup.chars() {
            scanner.parse_with("m1", ch.encode_utf8(&mut buf), &mut trickle);
        }
        assert_eq!(trickle.completions(), whole.completions());
    }

    #[test]
    fn test_render_artifact_custom_vocabulary() {
        let tags = TagVocabulary {
            artifact: "widget".into(),
            code: "src".into(),
            config: "opts".into(),
        };
        let mut artifact = tricky_artifact();
        artifact.config = None;
        let markup = TagGrammar::new(tags).render_artifact(&artifact);
        assert!(markup.starts_with(r#"<widget id="chart-1" type="react-component""#));
        assert!(markup.contains(r#"<src language="tsx">"#));
        assert!(!markup.contains("<opts>"));
        assert!(markup.ends_with("</src></widget>"));
    }

    #[test]
    fn test_parse_attributes_malformed_skipped() {
        let grammar = TagGrammar::default();
        let attrs = grammar.parse_attributes(r#"id=a1 title="ok" type="unterminated"#);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("title").map(String::as_str), Some("ok"));
    }
}
