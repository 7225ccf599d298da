//! `throw`, `try` and `catch` run through the unwinding runtime.

use kes_eval::ExecError;
use kes_ir::{AstBuilder, BinaryOp, CatchClause, NodeId, OpSymbol, PrimType, TypeExpr};
use pretty_assertions::assert_eq;

use crate::util::{run, stdout};

/// `catch (T name) { print name; }`
fn print_catch(b: &mut AstBuilder<'_>, ty: TypeExpr, name: &str) -> CatchClause {
    let bound = b.ident(name);
    let print = b.print(&[bound]);
    let body = b.block(&[print]);
    b.catch(ty, name, body)
}

fn main_with(b: &mut AstBuilder<'_>, body: &[NodeId]) -> NodeId {
    b.function("main", vec![], TypeExpr::void(), body)
}

#[test]
fn thrown_int_is_caught_and_printed() {
    let out = stdout(|b| {
        let five = b.int(5);
        let throw = b.throw(five);
        let body = b.block(&[throw]);
        let clause = print_catch(b, TypeExpr::int(), "e");
        let attempt = b.try_catch(body, vec![clause]);
        vec![main_with(b, &[attempt])]
    });
    assert_eq!(out, "5\n");
}

#[test]
fn exception_crosses_a_call() {
    let out = stdout(|b| {
        // void fail(int n) { throw n * 2; }
        let n = b.ident("n");
        let two = b.int(2);
        let doubled = b.binary(BinaryOp::Mul, n, two);
        let throw = b.throw(doubled);
        let fail = b.function(
            "fail",
            vec![b.param("n", TypeExpr::int())],
            TypeExpr::void(),
            &[throw],
        );

        let arg = b.int(21);
        let call = b.call("fail", &[arg]);
        let zero = b.int(0);
        let skipped = b.print(&[zero]);
        let body = b.block(&[call, skipped]);
        let clause = print_catch(b, TypeExpr::int(), "e");
        let attempt = b.try_catch(body, vec![clause]);
        let text = b.string("after");
        let after = b.print(&[text]);
        vec![fail, main_with(b, &[attempt, after])]
    });
    assert_eq!(out, "42\nafter\n");
}

#[test]
fn clauses_are_tried_in_order() {
    let out = stdout(|b| {
        let value = b.float(2.5);
        let throw = b.throw(value);
        let body = b.block(&[throw]);
        let ints = print_catch(b, TypeExpr::int(), "i");
        let doubles = print_catch(b, TypeExpr::Prim(PrimType::Double), "d");
        let attempt = b.try_catch(body, vec![ints, doubles]);
        vec![main_with(b, &[attempt])]
    });
    assert_eq!(out, "2.5\n");
}

#[test]
fn inner_try_forwards_what_it_does_not_catch() {
    let out = stdout(|b| {
        let value = b.float(1.5);
        let throw = b.throw(value);
        let inner_body = b.block(&[throw]);
        let ints = print_catch(b, TypeExpr::int(), "i");
        let inner = b.try_catch(inner_body, vec![ints]);
        let text = b.string("unreached");
        let unreached = b.print(&[text]);
        let outer_body = b.block(&[inner, unreached]);

        let label = b.string("outer");
        let d = b.ident("d");
        let print = b.print(&[label, d]);
        let handler = b.block(&[print]);
        let doubles = b.catch(TypeExpr::Prim(PrimType::Double), "d", handler);
        let outer = b.try_catch(outer_body, vec![doubles]);
        vec![main_with(b, &[outer])]
    });
    assert_eq!(out, "outer 1.5\n");
}

#[test]
fn try_without_clauses_swallows_its_exceptions() {
    let out = stdout(|b| {
        let one = b.int(1);
        let throw = b.throw(one);
        let body = b.block(&[throw]);
        let attempt = b.try_catch(body, vec![]);
        let text = b.string("after");
        let after = b.print(&[text]);
        vec![main_with(b, &[attempt, after])]
    });
    assert_eq!(out, "after\n");
}

#[test]
fn uncaught_exception_reaches_the_caller() {
    let result = run(|b| {
        let seven = b.int(7);
        let throw = b.throw(seven);
        vec![main_with(b, &[throw])]
    });
    assert_eq!(
        result,
        Err(ExecError::UncaughtException {
            type_name: "int".to_owned()
        })
    );
}

#[test]
fn thrown_object_is_destroyed_after_its_handler() {
    let out = stdout(|b| {
        // object Failure { int code; }
        let members = vec![b.member_decl("code", TypeExpr::int())];
        let failure = b.object("Failure", members, &[]);
        // operator delete(Failure& f) { print "released"; }
        let text = b.string("released");
        let print = b.print(&[text]);
        let delete = b.operator(
            Some(b.param("f", b.ty_named("Failure").reference_to())),
            OpSymbol::Delete,
            None,
            TypeExpr::void(),
            &[print],
        );

        let code = b.int(9);
        let made = b.construct(b.ty_named("Failure"), &[code]);
        let throw = b.throw(made);
        let body = b.block(&[throw]);
        let f = b.ident("f");
        let code = b.member(f, "code");
        let print = b.print(&[code]);
        let handler = b.block(&[print]);
        let clause = b.catch(b.ty_named("Failure").reference_to(), "f", handler);
        let attempt = b.try_catch(body, vec![clause]);
        vec![failure, delete, main_with(b, &[attempt])]
    });
    assert_eq!(out, "9\nreleased\n");
}
