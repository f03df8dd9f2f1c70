use crate::scanner::events::{EventLog, ScanEvent};
use crate::scanner::streaming::StreamingScanner;

const EXAMPLE: &str = r#"hello <artifact id="a1" type="component" title="Counter"><code language="x">foo</code></artifact> bye"#;

fn feed(fragments: &[&str]) -> EventLog {
    let mut scanner = StreamingScanner::new();
    let mut log = EventLog::new();
    for fragment in fragments {
        scanner.parse_with("m1", fragment, &mut log);
    }
    log
}

#[test]
fn test_single_shot_example() {
    let log = feed(&[EXAMPLE]);

    let starts = log.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].id, "a1");
    assert_eq!(starts[0].title, "Counter");
    assert_eq!(starts[0].message_id, "m1");

    let code = log.code_completions();
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].content, "foo");
    assert_eq!(code[0].language, "x");

    let done = log.completions();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, "a1");
    assert_eq!(done[0].code, "foo");
    assert!(log.errors().is_empty());
}

#[test]
fn test_every_character_boundary_matches_single_shot() {
    let whole = feed(&[EXAMPLE]);

    let chars: Vec<String> = EXAMPLE.chars().map(String::from).collect();
    let pieces: Vec<&str> = chars.iter().map(String::as_str).collect();
    let split = feed(&pieces);

    assert_eq!(split.completions(), whole.completions());
    assert_eq!(split.starts(), whole.starts());
    assert_eq!(split.code_completions(), whole.code_completions());
}

#[test]
fn test_missing_title_reports_once_and_resumes() {
    let text = r#"<artifact id="a1" type="component"><code>x</code></artifact> then <artifact id="a2" type="component" title="Ok"></artifact>"#;
    let log = feed(&[text]);

    let errors = log.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("title"));
    assert_eq!(errors[0].position, 0);
    assert!(errors[0].context.starts_with("<artifact id=\"a1\""));

    let starts = log.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].id, "a2");
}

#[test]
fn test_same_id_twice_in_one_message() {
    let text = concat!(
        r#"Draft: <artifact id="a1" type="component" title="Counter"><code>v1</code></artifact>"#,
        r#" Fixed: <artifact id="a1" type="component" title="Counter"><code>v2</code></artifact>"#,
    );
    let log = feed(&[text]);

    let done = log.completions();
    assert_eq!(done.len(), 2);
    assert_eq!(done[0].code, "v1");
    assert_eq!(done[1].code, "v2");
}

#[test]
fn test_code_close_and_artifact_close_in_one_call() {
    let mut scanner = StreamingScanner::new();
    let mut log = EventLog::new();
    scanner.parse_with("m1", r#"<artifact id="a1" type="component" title="T"><code>body"#, &mut log);
    log.take();

    scanner.parse_with("m1", "</code></artifact>", &mut log);

    let kinds: Vec<&str> = log
        .events()
        .iter()
        .map(|e| match e {
            ScanEvent::CodeComplete(_) => "code_complete",
            ScanEvent::ArtifactComplete(_) => "artifact_complete",
            ScanEvent::CodeUpdate(_) => "code_update",
            ScanEvent::ArtifactStart(_) => "artifact_start",
            ScanEvent::Error(_) => "error",
        })
        .collect();
    assert_eq!(kinds, vec!["code_complete", "artifact_complete"]);
}

#[test]
fn test_tag_split_right_before_close_bracket() {
    let log = feed(&[
        r#"<artifact id="a1" type="component" title="T"><code>x</code"#,
        "></artifact",
        ">",
    ]);
    assert_eq!(log.completions().len(), 1);
    assert_eq!(log.completions()[0].code, "x");
}
