use super::*;

#[test]
fn display_is_single_line() {
    let diag = Diagnostic::unresolved("unknown variable 'y'", Span::at_line(4));
    let text = diag.to_string();
    assert_eq!(text, "line 4: error: unknown variable 'y'");
    assert!(!text.contains('\n'));
}

#[test]
fn display_without_line() {
    let diag = Diagnostic::structural("duplicate template 'List'", Span::DUMMY);
    assert_eq!(diag.to_string(), "error: duplicate template 'List'");
}

#[test]
fn constructors_set_kind() {
    let span = Span::at_line(1);
    assert_eq!(Diagnostic::overload("x", span).kind, DiagnosticKind::OverloadMismatch);
    assert_eq!(Diagnostic::type_mismatch("x", span).kind, DiagnosticKind::TypeMismatch);
    assert_eq!(DiagnosticKind::Structural.to_string(), "structural error");
}
