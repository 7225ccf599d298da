//! Statements, expressions, calls and control flow.

#![allow(clippy::unwrap_used)]

use kes_ir::{BinaryOp, PrimType, TypeExpr};
use kes_lower::LowerOptions;
use pretty_assertions::assert_eq;

use crate::util::{compile_with, run, stdout};

#[test]
fn local_variable_reads_back_its_value() {
    let outcome = run(|b| {
        let five = b.int(5);
        let decl = b.var(TypeExpr::int(), "x", Some(five));
        let x = b.ident("x");
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, x, one);
        let print = b.print(&[sum]);
        let x = b.ident("x");
        let ret = b.ret(Some(x));
        vec![b.function("main", vec![], TypeExpr::int(), &[decl, print, ret])]
    });
    let outcome = outcome.unwrap();
    assert_eq!(outcome.stdout, "6\n");
    assert_eq!(outcome.exit_code, 5);
}

#[test]
fn print_separates_values_with_spaces() {
    let out = stdout(|b| {
        let int = b.int(1);
        let double = b.float(2.5);
        let ch = b.char_lit(b'c');
        let text = b.string("hi");
        let yes = b.boolean(true);
        let print = b.print(&[int, double, ch, text, yes]);
        vec![b.function("main", vec![], TypeExpr::void(), &[print])]
    });
    assert_eq!(out, "1 2.5 c hi 1\n");
}

#[test]
fn overloads_pick_value_or_pointer() {
    let out = stdout(|b| {
        // void f(int v) { print 1; }  void f(int* p) { print 2; }
        let one = b.int(1);
        let print_one = b.print(&[one]);
        let by_value = b.function(
            "f",
            vec![b.param("v", TypeExpr::int())],
            TypeExpr::void(),
            &[print_one],
        );
        let two = b.int(2);
        let print_two = b.print(&[two]);
        let by_pointer = b.function(
            "f",
            vec![b.param("p", TypeExpr::int().pointer_to())],
            TypeExpr::void(),
            &[print_two],
        );

        let five = b.int(5);
        let decl = b.var(TypeExpr::int(), "x", Some(five));
        let x = b.ident("x");
        let direct = b.call("f", &[x]);
        let x = b.ident("x");
        let address = b.address_of(x);
        let through = b.call("f", &[address]);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl, direct, through]);
        vec![by_value, by_pointer, main]
    });
    assert_eq!(out, "1\n2\n");
}

#[test]
fn reference_parameter_writes_through() {
    let out = stdout(|b| {
        // void bump(int& n) { n += 1; }
        let n = b.ident("n");
        let one = b.int(1);
        let inc = b.compound_assign(BinaryOp::Add, n, one);
        let bump = b.function(
            "bump",
            vec![b.param("n", TypeExpr::int().reference_to())],
            TypeExpr::void(),
            &[inc],
        );

        let zero = b.int(0);
        let decl = b.var(TypeExpr::int(), "x", Some(zero));
        let x = b.ident("x");
        let first = b.call("bump", &[x]);
        let x = b.ident("x");
        let second = b.call("bump", &[x]);
        let x = b.ident("x");
        let print = b.print(&[x]);
        let main = b.function("main", vec![], TypeExpr::void(), &[decl, first, second, print]);
        vec![bump, main]
    });
    assert_eq!(out, "2\n");
}

#[test]
fn recursion_sees_its_own_declaration() {
    let out = stdout(|b| {
        // int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); }
        let n = b.ident("n");
        let one = b.int(1);
        let small = b.binary(BinaryOp::Le, n, one);
        let one = b.int(1);
        let base = b.ret(Some(one));
        let then = b.block(&[base]);
        let guard = b.if_(small, then, None);
        let n = b.ident("n");
        let one = b.int(1);
        let less = b.binary(BinaryOp::Sub, n, one);
        let inner = b.call("fact", &[less]);
        let n = b.ident("n");
        let product = b.binary(BinaryOp::Mul, n, inner);
        let ret = b.ret(Some(product));
        let fact = b.function(
            "fact",
            vec![b.param("n", TypeExpr::int())],
            TypeExpr::int(),
            &[guard, ret],
        );

        let five = b.int(5);
        let call = b.call("fact", &[five]);
        let print = b.print(&[call]);
        let main = b.function("main", vec![], TypeExpr::void(), &[print]);
        vec![fact, main]
    });
    assert_eq!(out, "120\n");
}

#[test]
fn logical_operators_short_circuit() {
    let out = stdout(|b| {
        // int calls = 0;  bool bump() { calls += 1; return true; }
        let zero = b.int(0);
        let calls = b.var(TypeExpr::int(), "calls", Some(zero));
        let counter = b.ident("calls");
        let one = b.int(1);
        let inc = b.compound_assign(BinaryOp::Add, counter, one);
        let yes = b.boolean(true);
        let ret = b.ret(Some(yes));
        let bump = b.function("bump", vec![], TypeExpr::Prim(PrimType::Bool), &[inc, ret]);

        let mut stmts = Vec::new();
        // false && bump(), true || bump(), true && bump()
        for (first, and) in [(false, true), (true, false), (true, true)] {
            let lhs = b.boolean(first);
            let rhs = b.call("bump", &[]);
            let cond = if and {
                b.and(&[lhs, rhs])
            } else {
                b.or(&[lhs, rhs])
            };
            let then = b.block(&[]);
            stmts.push(b.if_(cond, then, None));
        }
        let counter = b.ident("calls");
        stmts.push(b.print(&[counter]));
        let main = b.function("main", vec![], TypeExpr::void(), &stmts);
        vec![calls, bump, main]
    });
    assert_eq!(out, "1\n");
}

#[test]
fn while_loop_with_break_and_continue() {
    let out = stdout(|b| {
        // sum the odd numbers below 10
        let zero = b.int(0);
        let i_decl = b.var(TypeExpr::int(), "i", Some(zero));
        let zero = b.int(0);
        let sum_decl = b.var(TypeExpr::int(), "sum", Some(zero));

        let i = b.ident("i");
        let one = b.int(1);
        let step = b.compound_assign(BinaryOp::Add, i, one);
        let i = b.ident("i");
        let nine = b.int(9);
        let done = b.binary(BinaryOp::Gt, i, nine);
        let brk = b.break_();
        let brk = b.block(&[brk]);
        let stop = b.if_(done, brk, None);
        let i = b.ident("i");
        let two = b.int(2);
        let rem = b.binary(BinaryOp::Rem, i, two);
        let zero = b.int(0);
        let even = b.binary(BinaryOp::Eq, rem, zero);
        let cont = b.continue_();
        let cont = b.block(&[cont]);
        let skip = b.if_(even, cont, None);
        let sum = b.ident("sum");
        let i = b.ident("i");
        let add = b.compound_assign(BinaryOp::Add, sum, i);
        let body = b.block(&[step, stop, skip, add]);
        let yes = b.boolean(true);
        let looped = b.while_(yes, body);

        let sum = b.ident("sum");
        let print = b.print(&[sum]);
        let main = b.function("main", vec![], TypeExpr::void(), &[i_decl, sum_decl, looped, print]);
        vec![main]
    });
    assert_eq!(out, "25\n");
}

#[test]
fn for_loop_counts() {
    let out = stdout(|b| {
        let zero = b.int(0);
        let init = b.var(TypeExpr::int(), "i", Some(zero));
        let i = b.ident("i");
        let three = b.int(3);
        let cond = b.binary(BinaryOp::Lt, i, three);
        let i = b.ident("i");
        let one = b.int(1);
        let step = b.compound_assign(BinaryOp::Add, i, one);
        let i = b.ident("i");
        let print = b.print(&[i]);
        let body = b.block(&[print]);
        let looped = b.for_(Some(init), Some(cond), Some(step), body);
        vec![b.function("main", vec![], TypeExpr::void(), &[looped])]
    });
    assert_eq!(out, "0\n1\n2\n");
}

/// `switch (2) { case 1: print 10; case 2: print 20; case 3: print 30; }`
fn switch_program(auto_break: bool) -> String {
    stdout(|b| {
        let scrutinee = b.int(2);
        let mut cases = Vec::new();
        for (value, printed) in [(1, 10), (2, 20), (3, 30)] {
            let value = b.int(value);
            let printed = b.int(printed);
            let print = b.print(&[printed]);
            cases.push((value, b.block(&[print])));
        }
        let switch = b.switch(scrutinee, &cases, None, auto_break);
        vec![b.function("main", vec![], TypeExpr::void(), &[switch])]
    })
}

#[test]
fn switch_with_auto_break_leaves_after_each_case() {
    assert_eq!(switch_program(true), "20\n");
}

#[test]
fn switch_without_auto_break_falls_through() {
    assert_eq!(switch_program(false), "20\n30\n");
}

#[test]
fn switch_default_runs_when_nothing_matches() {
    let out = stdout(|b| {
        let scrutinee = b.int(7);
        let one = b.int(1);
        let ten = b.int(10);
        let print = b.print(&[ten]);
        let case = b.block(&[print]);
        let ninety = b.int(99);
        let print = b.print(&[ninety]);
        let default = b.block(&[print]);
        let switch = b.switch(scrutinee, &[(one, case)], Some(default), true);
        vec![b.function("main", vec![], TypeExpr::void(), &[switch])]
    });
    assert_eq!(out, "99\n");
}

#[test]
fn break_targets_nearest_construct() {
    let out = stdout(|b| {
        // switch (1) { case 1: while (true) { print 7; break; } print 9; break; case 2: print 8; }
        let seven = b.int(7);
        let print_seven = b.print(&[seven]);
        let brk = b.break_();
        let body = b.block(&[print_seven, brk]);
        let yes = b.boolean(true);
        let inner = b.while_(yes, body);
        let nine = b.int(9);
        let print_nine = b.print(&[nine]);
        let brk = b.break_();
        let first_case = b.block(&[inner, print_nine, brk]);
        let eight = b.int(8);
        let print_eight = b.print(&[eight]);
        let second_case = b.block(&[print_eight]);
        let one = b.int(1);
        let two = b.int(2);
        let scrutinee = b.int(1);
        let outer_switch = b.switch(scrutinee, &[(one, first_case), (two, second_case)], None, false);

        // for (int i = 0; i < 2; i += 1) { switch (i) { case 0: print 0; break; case 1: print 1; break; } }
        let zero = b.int(0);
        let init = b.var(TypeExpr::int(), "i", Some(zero));
        let i = b.ident("i");
        let limit = b.int(2);
        let cond = b.binary(BinaryOp::Lt, i, limit);
        let i = b.ident("i");
        let one = b.int(1);
        let step = b.compound_assign(BinaryOp::Add, i, one);
        let mut cases = Vec::new();
        for value in [0, 1] {
            let label = b.int(value);
            let printed = b.int(value);
            let print = b.print(&[printed]);
            let brk = b.break_();
            cases.push((label, b.block(&[print, brk])));
        }
        let i = b.ident("i");
        let inner_switch = b.switch(i, &cases, None, false);
        let body = b.block(&[inner_switch]);
        let looped = b.for_(Some(init), Some(cond), Some(step), body);

        vec![b.function("main", vec![], TypeExpr::void(), &[outer_switch, looped])]
    });
    assert_eq!(out, "7\n9\n0\n1\n");
}

fn debug_print_program(options: LowerOptions) -> String {
    let compiled = compile_with(options, |b| {
        let seven = b.int(7);
        let decl = b.var(TypeExpr::int(), "y", Some(seven));
        let y = b.ident("y");
        let dump = b.at_line(3).debug_print(y);
        vec![b.function("main", vec![], TypeExpr::void(), &[decl, dump])]
    });
    assert!(compiled.lowered.is_success(), "{}", compiled.lowered.render());
    kes_eval::run(&compiled.module, "main")
        .map(|o| o.stdout)
        .unwrap_or_else(|e| panic!("program failed: {e}"))
}

#[test]
fn debug_print_reports_line_and_value() {
    assert_eq!(debug_print_program(LowerOptions::unlimited()), "line 3: 7\n");
}

#[test]
fn debug_print_can_be_disabled() {
    let options = LowerOptions {
        debug_prints: false,
        ..LowerOptions::unlimited()
    };
    assert_eq!(debug_print_program(options), "");
}

#[test]
fn globals_keep_their_initializers() {
    let out = stdout(|b| {
        let forty = b.int(40);
        let global = b.var(TypeExpr::Prim(PrimType::Long), "base", Some(forty));
        let base = b.ident("base");
        let two = b.int(2);
        let sum = b.binary(BinaryOp::Add, base, two);
        let print = b.print(&[sum]);
        let main = b.function("main", vec![], TypeExpr::void(), &[print]);
        vec![global, main]
    });
    assert_eq!(out, "42\n");
}

#[test]
fn casts_convert_between_numeric_types() {
    let out = stdout(|b| {
        let value = b.float(3.75);
        let truncated = b.cast(value, TypeExpr::int());
        let seven = b.int(7);
        let widened = b.cast(seven, TypeExpr::Prim(PrimType::Double));
        let two = b.int(2);
        let half = b.binary(BinaryOp::Div, widened, two);
        let print = b.print(&[truncated, half]);
        vec![b.function("main", vec![], TypeExpr::void(), &[print])]
    });
    assert_eq!(out, "3 3.5\n");
}
