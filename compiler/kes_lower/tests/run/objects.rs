//! Objects, user operators and the built-in dynamic array.

use kes_eval::ExecError;
use kes_ir::{AstBuilder, BinaryOp, NodeId, OpSymbol, PrimType, TypeExpr};
use pretty_assertions::assert_eq;

use crate::util::{run, stdout};

/// ```text
/// object Point {
///     int x; int y;
///     constructor(int a, int b) { x = a; y = b; }
///     int sum() { return x + y; }
///     void shift(int by) { x += by; this.y += by; }
/// }
/// ```
fn point(b: &mut AstBuilder<'_>) -> NodeId {
    let x = b.ident("x");
    let a = b.ident("a");
    let set_x = b.assign(x, a);
    let y = b.ident("y");
    let b_arg = b.ident("b");
    let set_y = b.assign(y, b_arg);
    let ctor = b.constructor(
        vec![b.param("a", TypeExpr::int()), b.param("b", TypeExpr::int())],
        &[set_x, set_y],
    );

    let x = b.ident("x");
    let y = b.ident("y");
    let total = b.binary(BinaryOp::Add, x, y);
    let ret = b.ret(Some(total));
    let sum = b.function("sum", vec![], TypeExpr::int(), &[ret]);

    let x = b.ident("x");
    let by = b.ident("by");
    let shift_x = b.compound_assign(BinaryOp::Add, x, by);
    let this = b.this();
    let y = b.member(this, "y");
    let by = b.ident("by");
    let shift_y = b.compound_assign(BinaryOp::Add, y, by);
    let shift = b.function(
        "shift",
        vec![b.param("by", TypeExpr::int())],
        TypeExpr::void(),
        &[shift_x, shift_y],
    );

    let members = vec![
        b.member_decl("x", TypeExpr::int()),
        b.member_decl("y", TypeExpr::int()),
    ];
    b.object("Point", members, &[ctor, sum, shift])
}

#[test]
fn constructor_and_methods_on_a_stack_object() {
    let out = stdout(|b| {
        let point = point(b);
        let three = b.int(3);
        let four = b.int(4);
        let made = b.construct(b.ty_named("Point"), &[three, four]);
        let decl = b.var(b.ty_named("Point"), "p", Some(made));
        let p = b.ident("p");
        let before = b.method_call(p, "sum", &[]);
        let print_before = b.print(&[before]);
        let p = b.ident("p");
        let ten = b.int(10);
        let shift = b.method_call(p, "shift", &[ten]);
        let p = b.ident("p");
        let x = b.member(p, "x");
        let p = b.ident("p");
        let y = b.member(p, "y");
        let print_after = b.print(&[x, y]);
        let main = b.function(
            "main",
            vec![],
            TypeExpr::void(),
            &[decl, print_before, shift, print_after],
        );
        vec![point, main]
    });
    assert_eq!(out, "7\n13 14\n");
}

#[test]
fn heap_objects_are_reached_through_pointers() {
    let out = stdout(|b| {
        let point = point(b);
        let one = b.int(1);
        let two = b.int(2);
        let made = b.new_object(b.ty_named("Point"), &[one, two]);
        let decl = b.var(b.ty_named("Point").pointer_to(), "q", Some(made));
        let q = b.ident("q");
        let sum = b.method_call(q, "sum", &[]);
        let print = b.print(&[sum]);
        let q = b.ident("q");
        let delete = b.delete(q);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl, print, delete]);
        vec![point, main]
    });
    assert_eq!(out, "3\n");
}

#[test]
fn objects_without_constructors_initialize_members_in_order() {
    let out = stdout(|b| {
        let members = vec![
            b.member_decl("w", TypeExpr::int()),
            b.member_decl("h", TypeExpr::Prim(PrimType::Double)),
        ];
        let size = b.object("Size", members, &[]);
        let two = b.int(2);
        let half = b.float(0.5);
        let made = b.construct(b.ty_named("Size"), &[two, half]);
        let decl = b.var(b.ty_named("Size"), "s", Some(made));
        let s = b.ident("s");
        let w = b.member(s, "w");
        let s = b.ident("s");
        let h = b.member(s, "h");
        let print = b.print(&[w, h]);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl, print]);
        vec![size, main]
    });
    assert_eq!(out, "2 0.5\n");
}

#[test]
fn user_operator_replaces_builtin() {
    let out = stdout(|b| {
        let point = point(b);
        // Point + Point -> Point
        let l = b.ident("l");
        let lx = b.member(l, "x");
        let r = b.ident("r");
        let rx = b.member(r, "x");
        let x = b.binary(BinaryOp::Add, lx, rx);
        let l = b.ident("l");
        let ly = b.member(l, "y");
        let r = b.ident("r");
        let ry = b.member(r, "y");
        let y = b.binary(BinaryOp::Add, ly, ry);
        let made = b.construct(b.ty_named("Point"), &[x, y]);
        let ret = b.ret(Some(made));
        let plus = b.operator(
            Some(b.param("l", b.ty_named("Point"))),
            OpSymbol::Binary(BinaryOp::Add),
            Some(b.param("r", b.ty_named("Point"))),
            b.ty_named("Point"),
            &[ret],
        );

        let one = b.int(1);
        let two = b.int(2);
        let first = b.construct(b.ty_named("Point"), &[one, two]);
        let a = b.var(b.ty_named("Point"), "a", Some(first));
        let ten = b.int(10);
        let twenty = b.int(20);
        let second = b.construct(b.ty_named("Point"), &[ten, twenty]);
        let c = b.var(b.ty_named("Point"), "c", Some(second));
        let lhs = b.ident("a");
        let rhs = b.ident("c");
        let added = b.binary(BinaryOp::Add, lhs, rhs);
        let total = b.var(b.ty_named("Point"), "t", Some(added));
        let t = b.ident("t");
        let sum = b.method_call(t, "sum", &[]);
        let print = b.print(&[sum]);
        let main = b.function("main", vec![], TypeExpr::void(), &[a, c, total, print]);
        vec![point, plus, main]
    });
    assert_eq!(out, "33\n");
}

#[test]
fn dynamic_array_grows_and_indexes() {
    let out = stdout(|b| {
        let array = TypeExpr::Array(Box::new(TypeExpr::int()));
        let decl = b.var(array, "xs", None);

        // for (int i = 0; i < 10; i += 1) { xs << i * i; }
        let zero = b.int(0);
        let init = b.var(TypeExpr::int(), "i", Some(zero));
        let i = b.ident("i");
        let ten = b.int(10);
        let cond = b.binary(BinaryOp::Lt, i, ten);
        let i = b.ident("i");
        let one = b.int(1);
        let step = b.compound_assign(BinaryOp::Add, i, one);
        let xs = b.ident("xs");
        let i = b.ident("i");
        let i2 = b.ident("i");
        let square = b.binary(BinaryOp::Mul, i, i2);
        let push = b.binary(BinaryOp::Shl, xs, square);
        let body = b.block(&[push]);
        let fill = b.for_(Some(init), Some(cond), Some(step), body);

        let xs = b.ident("xs");
        let len = b.member(xs, "len");
        let xs = b.ident("xs");
        let nine = b.int(9);
        let last = b.index(xs, nine);
        let print = b.print(&[len, last]);
        let xs = b.ident("xs");
        let delete = b.delete(xs);
        let xs = b.ident("xs");
        let len = b.member(xs, "len");
        let print_len = b.print(&[len]);
        let main = b.function(
            "main",
            vec![],
            TypeExpr::void(),
            &[decl, fill, print, delete, print_len],
        );
        vec![main]
    });
    assert_eq!(out, "10 81\n0\n");
}

#[test]
fn dynamic_array_elements_are_assignable() {
    let out = stdout(|b| {
        let array = TypeExpr::Array(Box::new(TypeExpr::int()));
        let decl = b.var(array, "xs", None);
        let xs = b.ident("xs");
        let five = b.int(5);
        let push = b.binary(BinaryOp::Shl, xs, five);
        let xs = b.ident("xs");
        let zero = b.int(0);
        let slot = b.index(xs, zero);
        let forty = b.int(40);
        let store = b.assign(slot, forty);
        let xs = b.ident("xs");
        let zero = b.int(0);
        let read = b.index(xs, zero);
        let print = b.print(&[read]);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl, push, store, print]);
        vec![main]
    });
    assert_eq!(out, "40\n");
}

#[test]
fn dynamic_array_index_out_of_range_aborts() {
    let result = run(|b| {
        let array = TypeExpr::Array(Box::new(TypeExpr::int()));
        let decl = b.var(array, "xs", None);
        let xs = b.ident("xs");
        let three = b.int(3);
        let read = b.index(xs, three);
        let print = b.print(&[read]);
        vec![b.function("main", vec![], TypeExpr::void(), &[decl, print])]
    });
    assert_eq!(result, Err(ExecError::Aborted));
}
