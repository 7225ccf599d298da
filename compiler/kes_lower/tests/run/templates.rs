//! Template instantiation, from blueprint to running code.

use kes_ir::{AstBuilder, BinaryOp, NodeId, PrimType, TypeExpr};
use pretty_assertions::assert_eq;

use crate::util::stdout;

/// ```text
/// template List<T> {
///     T head; int size;
///     void push(T v) { head = v; size += 1; }
///     T first() { return head; }
/// }
/// ```
fn list(b: &mut AstBuilder<'_>) -> NodeId {
    let head = b.ident("head");
    let v = b.ident("v");
    let store = b.assign(head, v);
    let size = b.ident("size");
    let one = b.int(1);
    let grow = b.compound_assign(BinaryOp::Add, size, one);
    let push = b.function(
        "push",
        vec![b.param("v", b.ty_named("T"))],
        TypeExpr::void(),
        &[store, grow],
    );
    let head = b.ident("head");
    let ret = b.ret(Some(head));
    let first = b.function("first", vec![], b.ty_named("T"), &[ret]);
    let members = vec![
        b.member_decl("head", b.ty_named("T")),
        b.member_decl("size", TypeExpr::int()),
    ];
    b.template("List", &["T"], members, &[push, first])
}

#[test]
fn instances_share_code_but_not_state() {
    let out = stdout(|b| {
        let list = list(b);
        let ints = b.ty_generic("List", vec![TypeExpr::int()]);
        let a = b.var(ints.clone(), "a", None);
        let c = b.var(ints, "c", None);
        let recv = b.ident("a");
        let five = b.int(5);
        let push_a = b.method_call(recv, "push", &[five]);
        let recv = b.ident("c");
        let six = b.int(6);
        let push_c = b.method_call(recv, "push", &[six]);
        let recv = b.ident("a");
        let first_a = b.method_call(recv, "first", &[]);
        let recv = b.ident("c");
        let first_c = b.method_call(recv, "first", &[]);
        let recv = b.ident("a");
        let size = b.member(recv, "size");
        let print = b.print(&[first_a, first_c, size]);
        let main = b.function(
            "main",
            vec![],
            TypeExpr::void(),
            &[a, c, push_a, push_c, print],
        );
        vec![list, main]
    });
    assert_eq!(out, "5 6 1\n");
}

#[test]
fn different_arguments_make_different_instances() {
    let out = stdout(|b| {
        let list = list(b);
        let ints = b.ty_generic("List", vec![TypeExpr::int()]);
        let doubles = b.ty_generic("List", vec![TypeExpr::Prim(PrimType::Double)]);
        let a = b.var(ints, "a", None);
        let d = b.var(doubles, "d", None);
        let recv = b.ident("a");
        let three = b.int(3);
        let push_a = b.method_call(recv, "push", &[three]);
        let recv = b.ident("d");
        let half = b.float(0.25);
        let push_d = b.method_call(recv, "push", &[half]);
        let recv = b.ident("a");
        let first_a = b.method_call(recv, "first", &[]);
        let recv = b.ident("d");
        let first_d = b.method_call(recv, "first", &[]);
        let print = b.print(&[first_a, first_d]);
        let main = b.function("main", vec![], TypeExpr::void(), &[a, d, push_a, push_d, print]);
        vec![list, main]
    });
    assert_eq!(out, "3 0.25\n");
}

#[test]
fn instance_can_point_to_itself() {
    let out = stdout(|b| {
        // template Node<T> { T value; Node<T>* next; }
        let next_ty = b.ty_generic("Node", vec![b.ty_named("T")]).pointer_to();
        let members = vec![
            b.member_decl("value", b.ty_named("T")),
            b.member_decl("next", next_ty),
        ];
        let node = b.template("Node", &["T"], members, &[]);

        let ty = b.ty_generic("Node", vec![TypeExpr::int()]);
        let first = b.var(ty.clone(), "first", None);
        let second = b.var(ty, "second", None);
        let recv = b.ident("second");
        let value = b.member(recv, "value");
        let two = b.int(2);
        let set_value = b.assign(value, two);
        let recv = b.ident("first");
        let next = b.member(recv, "next");
        let target = b.ident("second");
        let address = b.address_of(target);
        let link = b.assign(next, address);
        let recv = b.ident("first");
        let next = b.member(recv, "next");
        let value = b.member(next, "value");
        let print = b.print(&[value]);
        let main = b.function(
            "main",
            vec![],
            TypeExpr::void(),
            &[first, second, set_value, link, print],
        );
        vec![node, main]
    });
    assert_eq!(out, "2\n");
}
