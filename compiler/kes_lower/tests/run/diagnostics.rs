//! User errors: reported with their line, and lowering carries on.

use kes_diagnostic::DiagnosticConfig;
use kes_ir::{BinaryOp, PrimType, TypeExpr};
use kes_lower::LowerOptions;
use pretty_assertions::assert_eq;

use crate::util::{compile, compile_with};

#[test]
fn errors_are_collected_in_line_order() {
    let compiled = compile(|b| {
        let y = b.at_line(2).ident("y");
        let print = b.print(&[y]);
        let one = b.at_line(3).int(1);
        let call = b.call("f", &[one]);
        vec![b.at_line(1).function("main", vec![], TypeExpr::void(), &[print, call])]
    });
    assert_eq!(compiled.lowered.error_count, 2);
    assert_eq!(
        compiled.lowered.render(),
        "line 2: error: unknown variable 'y'\nline 3: error: unknown function 'f'\n"
    );
}

#[test]
fn error_limit_keeps_counting() {
    let options = LowerOptions {
        diagnostics: DiagnosticConfig {
            error_limit: 2,
            deduplicate: false,
        },
        ..LowerOptions::default()
    };
    let compiled = compile_with(options, |b| {
        let mut stmts = Vec::new();
        for (line, name) in [(2, "a"), (3, "b"), (4, "c")] {
            let unknown = b.at_line(line).ident(name);
            stmts.push(b.print(&[unknown]));
        }
        vec![b.function("main", vec![], TypeExpr::void(), &stmts)]
    });
    assert_eq!(compiled.lowered.error_count, 3);
    assert_eq!(compiled.lowered.diagnostics.len(), 2);
    assert!(!compiled.lowered.is_success());
}

#[test]
fn duplicate_signature_is_rejected() {
    let compiled = compile(|b| {
        let first = b.function("f", vec![b.param("a", TypeExpr::int())], TypeExpr::void(), &[]);
        b.at_line(5);
        let second = b.function("f", vec![b.param("b", TypeExpr::int())], TypeExpr::void(), &[]);
        vec![first, second]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 5: error: function 'f(int)' is already declared\n"
    );
}

#[test]
fn functions_must_be_declared_before_use() {
    let compiled = compile(|b| {
        let call = b.at_line(2).call("later", &[]);
        let main = b.at_line(1).function("main", vec![], TypeExpr::void(), &[call]);
        let later = b.at_line(4).function("later", vec![], TypeExpr::void(), &[]);
        vec![main, later]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 2: error: unknown function 'later'\n"
    );
}

#[test]
fn object_without_delete_operator_cannot_be_thrown() {
    let compiled = compile(|b| {
        let members = vec![b.member_decl("code", TypeExpr::int())];
        let failure = b.object("Failure", members, &[]);
        b.at_line(3);
        let made = b.construct(b.ty_named("Failure"), &[]);
        let throw = b.throw(made);
        let main = b.function("main", vec![], TypeExpr::void(), &[throw]);
        vec![failure, main]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 3: error: 'Failure' cannot be thrown: it has no delete operator\n"
    );
}

#[test]
fn template_name_needs_arguments() {
    let compiled = compile(|b| {
        let members = vec![b.member_decl("item", b.ty_named("T"))];
        let boxed = b.template("Box", &["T"], members, &[]);
        b.at_line(7);
        let decl = b.var(b.ty_named("Box"), "x", None);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl]);
        vec![boxed, main]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 7: error: template 'Box' needs type arguments\n"
    );
}

#[test]
fn failed_statement_does_not_stop_the_function() {
    let compiled = compile(|b| {
        let missing = b.at_line(2).ident("missing");
        let one = b.int(1);
        let bad = b.binary(BinaryOp::Add, missing, one);
        let print_bad = b.print(&[bad]);
        let five = b.at_line(3).int(5);
        let decl = b.var(TypeExpr::int(), "x", Some(five));
        let x = b.ident("x");
        let print_ok = b.print(&[x]);
        vec![b.at_line(1).function("main", vec![], TypeExpr::void(), &[print_bad, decl, print_ok])]
    });
    assert_eq!(compiled.lowered.error_count, 1);
    assert!(compiled.module.function_by_name("main").is_some());
}

#[test]
fn reference_parameter_does_not_make_a_new_overload() {
    let compiled = compile(|b| {
        // void f(int v) {}  void f(int& r) {}
        b.at_line(1);
        let by_value = b.function("f", vec![b.param("v", TypeExpr::int())], TypeExpr::void(), &[]);
        b.at_line(2);
        let by_reference = b.function(
            "f",
            vec![b.param("r", TypeExpr::int().reference_to())],
            TypeExpr::void(),
            &[],
        );
        let zero = b.at_line(4).int(0);
        let decl = b.var(TypeExpr::int(), "x", Some(zero));
        let x = b.ident("x");
        let call = b.call("f", &[x]);
        let main = b.at_line(3).function("main", vec![], TypeExpr::void(), &[decl, call]);
        vec![by_value, by_reference, main]
    });
    assert_eq!(compiled.lowered.error_count, 1);
    assert_eq!(
        compiled.lowered.render(),
        "line 2: error: function 'f(int&)' is already declared\n"
    );
}

#[test]
fn numeric_widening_does_not_select_an_overload() {
    let compiled = compile(|b| {
        // void f(long v) {}  f(5);
        b.at_line(1);
        let f = b.function(
            "f",
            vec![b.param("v", TypeExpr::Prim(PrimType::Long))],
            TypeExpr::void(),
            &[],
        );
        let five = b.at_line(3).int(5);
        let call = b.call("f", &[five]);
        let main = b.at_line(2).function("main", vec![], TypeExpr::void(), &[call]);
        vec![f, main]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 3: error: no overload of function 'f' matches (int)\n"
    );
}

#[test]
fn module_scope_cannot_read_variables() {
    let compiled = compile(|b| {
        // int y = 1;  int g = y;  g = y;
        let one = b.at_line(1).int(1);
        let y = b.var(TypeExpr::int(), "y", Some(one));
        let read = b.at_line(2).ident("y");
        let g = b.var(TypeExpr::int(), "g", Some(read));
        let target = b.at_line(3).ident("g");
        let value = b.ident("y");
        let assign = b.assign(target, value);
        vec![y, g, assign]
    });
    assert_eq!(
        compiled.lowered.render(),
        "line 2: error: global initializers must be constants\n\
         line 3: error: global initializers must be constants\n"
    );
}

#[test]
fn bad_catch_clause_still_checks_the_try_body() {
    let compiled = compile(|b| {
        // try { print missing; } catch (Nowhere e) {}
        let missing = b.at_line(3).ident("missing");
        let print = b.print(&[missing]);
        let body = b.block(&[print]);
        let handler = b.block(&[]);
        let clause = b.catch(b.ty_named("Nowhere"), "e", handler);
        let attempt = b.at_line(2).try_catch(body, vec![clause]);
        let main = b.at_line(1).function("main", vec![], TypeExpr::void(), &[attempt]);
        vec![main]
    });
    assert_eq!(compiled.lowered.error_count, 2);
    assert!(compiled.lowered.render().contains("line 3: error: unknown variable 'missing'"));
}
