mod common;

use common::{THREAD_TS, message, page};
use threadtldr::core::models::{Reaction, ThreadSnapshot};
use threadtldr::summary::render::{EMPTY_THREAD_SENTINEL, PARENT_MARKER, render_thread};

fn snapshot_of(messages: Vec<threadtldr::core::models::ThreadMessage>) -> ThreadSnapshot {
    ThreadSnapshot::new("C1".to_string(), THREAD_TS.to_string(), messages)
}

#[test]
fn test_render_is_idempotent() {
    let snapshot = snapshot_of(page(0, 25, None).messages);
    let first = render_thread(&snapshot);
    let second = render_thread(&snapshot);
    assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
}

#[test]
fn test_only_root_line_has_parent_marker() {
    let snapshot = snapshot_of(page(0, 5, None).messages);
    let rendered = render_thread(&snapshot);
    let lines: Vec<&str> = rendered.as_str().lines().collect();

    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with(PARENT_MARKER));
    assert!(lines[1..].iter().all(|l| !l.starts_with(PARENT_MARKER)));
}

#[test]
fn test_root_detected_anywhere_in_list() {
    let snapshot = snapshot_of(vec![
        message("1700000000.000005", "U2", "reply"),
        message(THREAD_TS, "U1", "root"),
    ]);
    let rendered = render_thread(&snapshot);
    assert_eq!(rendered.as_str(), "U2reply\n[parent message] U1root");
}

#[test]
fn test_reactions_fragment() {
    let mut root = message(THREAD_TS, "U1", "we shipped");
    root.reactions = vec![
        Reaction { name: "tada".to_string(), count: 12 },
        Reaction { name: "star".to_string(), count: 3 },
    ];
    let rendered = render_thread(&snapshot_of(vec![root]));
    assert_eq!(
        rendered.as_str(),
        "[parent message] U1(:tada: 12) (:star: 3)we shipped"
    );
}

#[test]
fn test_empty_snapshot_renders_sentinel() {
    let rendered = render_thread(&snapshot_of(Vec::new()));
    assert_eq!(rendered.as_str(), EMPTY_THREAD_SENTINEL);
    assert!(!rendered.as_str().is_empty());
}
