use kes_ir::Span;
use pretty_assertions::assert_eq;

use super::*;

fn err(line: u32, msg: &str) -> Diagnostic {
    Diagnostic::unresolved(msg, Span::at_line(line))
}

#[test]
fn error_limit_drops_but_counts() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 2,
        deduplicate: false,
    });
    assert!(queue.push(err(1, "a")));
    assert!(queue.push(err(2, "b")));
    assert!(queue.limit_reached());
    assert!(!queue.push(err(3, "c")));
    assert_eq!(queue.error_count(), 3);
    assert_eq!(queue.peek().count(), 2);
}

#[test]
fn dedup_same_line_same_message() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.push(err(5, "unknown variable 'x'")));
    assert!(!queue.push(err(5, "unknown variable 'x'")));
    assert!(queue.push(err(6, "unknown variable 'x'")));
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn unlimited_keeps_duplicates() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    for _ in 0..50 {
        queue.push(err(1, "same"));
    }
    assert_eq!(queue.error_count(), 50);
}

#[test]
fn flush_sorts_stably_by_line() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    queue.push(err(9, "late"));
    queue.push(err(2, "first"));
    queue.push(err(2, "second"));
    let messages: Vec<_> = queue.flush().into_iter().map(|d| d.message).collect();
    assert_eq!(messages, vec!["first", "second", "late"]);
    assert!(queue.has_errors().is_none());
}

#[test]
fn emit_error_guarantees() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.has_errors().is_none());
    let _proof = queue.emit_error(err(1, "boom"));
    assert!(queue.has_errors().is_some());
}
