use kes_emit::{BlockId, CodeEmitter, IrModule, Terminator};
use kes_ir::{AstBuilder, BinaryOp, PrimType, StringInterner, TypeExpr};
use pretty_assertions::assert_eq;

use super::*;
use crate::{CompilationContext, LowerOptions};

fn context(interner: &StringInterner) -> CompilationContext {
    CompilationContext::new(LowerOptions::unlimited(), interner)
}

/// Enter a `void scratch()` with an entry block, as if lowering its body,
/// so expressions can be lowered outside any source function.
fn enter_scratch(lowerer: &mut Lowerer<'_>) -> BlockId {
    let void = lowerer.emitter.void_type();
    let fn_ty = lowerer.emitter.function_type(&[], void, false);
    let scratch = lowerer.emitter.declare_function("scratch", fn_ty);
    let entry = lowerer.emitter.append_block(scratch, "entry");
    lowerer.func = Some(FunctionState {
        id: scratch,
        symbol: "scratch".to_owned(),
        ret: void,
        ret_ref: false,
        this_ty: None,
        alloca_bb: entry,
    });
    lowerer.emitter.position_at_end(entry);
    entry
}

fn terminator(module: &IrModule, bb: BlockId) -> Terminator {
    module
        .block(bb)
        .terminator
        .clone()
        .unwrap_or(Terminator::Unreachable)
}

#[test]
fn nested_loops_leave_no_targets_behind() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    // for (int i = 0; i < 3; i += 1) { while (true) { break; } continue; }
    let init = {
        let zero = b.int(0);
        b.var(TypeExpr::int(), "i", Some(zero))
    };
    let cond = {
        let i = b.ident("i");
        let three = b.int(3);
        b.binary(BinaryOp::Lt, i, three)
    };
    let step = {
        let i = b.ident("i");
        let one = b.int(1);
        b.compound_assign(BinaryOp::Add, i, one)
    };
    let inner = {
        let yes = b.boolean(true);
        let brk = b.break_();
        let body = b.block(&[brk]);
        b.while_(yes, body)
    };
    let cont = b.continue_();
    let body = b.block(&[inner, cont]);
    let looped = b.for_(Some(init), Some(cond), Some(step), body);
    let main = b.function("main", vec![], TypeExpr::void(), &[looped]);
    let root = b.module(&[main]);
    let ast = b.finish();

    let mut module = IrModule::new("loops");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    assert_eq!(lowerer.loop_depth(), 0);
    assert!(lowerer.finish().is_ok());
    assert_eq!(ctx.error_count(), 0);
}

#[test]
fn break_outside_a_loop_is_an_error() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let brk = b.at_line(4).break_();
    let main = b.function("main", vec![], TypeExpr::void(), &[brk]);
    let root = b.module(&[main]);
    let ast = b.finish();

    let mut module = IrModule::new("break");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    assert!(lowerer.finish().is_ok());
    let diags = ctx.diagnostics.flush();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line(), 4);
}

#[test]
fn throw_sets_follow_the_tree() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    // try { throw 5; } catch (double d) {}
    let five = b.int(5);
    let thrown = b.throw(five);
    let body = b.block(&[thrown]);
    let handler = b.block(&[]);
    let clause = b.catch(TypeExpr::Prim(PrimType::Double), "d", handler);
    let guarded = b.try_catch(body, vec![clause]);
    // try { throw 6; } catch (int e) {}
    let six = b.int(6);
    let caught = b.throw(six);
    let body = b.block(&[caught]);
    let handler = b.block(&[]);
    let clause = b.catch(TypeExpr::int(), "e", handler);
    let handled = b.try_catch(body, vec![clause]);
    let main = b.function("main", vec![], TypeExpr::void(), &[guarded, handled]);
    let root = b.module(&[main]);
    let ast = b.finish();

    let mut module = IrModule::new("throws");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    let thrown_types = lowerer.throwable_types(thrown).to_vec();
    let guarded_types = lowerer.throwable_types(guarded).to_vec();
    let handled_types = lowerer.throwable_types(handled).to_vec();
    let main_types = lowerer.throwable_types(main).to_vec();
    assert!(lowerer.finish().is_ok());
    assert_eq!(ctx.error_count(), 0);

    let int = module.int_type(32);
    assert_eq!(thrown_types, vec![int]);
    assert_eq!(guarded_types, vec![int]);
    assert!(handled_types.is_empty());
    // Declarations do not propagate what their bodies throw.
    assert!(main_types.is_empty());
}

#[test]
fn lower_returns_place_or_loaded_value() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let five = b.int(5);
    let decl = b.var(TypeExpr::int(), "x", Some(five));
    let x = b.ident("x");
    let root = b.module(&[decl]);
    let ast = b.finish();

    let mut module = IrModule::new("deref");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    enter_scratch(&mut lowerer);
    let address = lowerer.lower(x, false);
    let value = lowerer.lower(x, true);
    let address_ty = address.map(|v| lowerer.emitter.type_of(v));
    let value_ty = value.map(|v| lowerer.emitter.type_of(v));
    assert!(lowerer.finish().is_ok());
    assert_eq!(ctx.error_count(), 0);

    let int = module.int_type(32);
    let int_ptr = module.pointer_type(int);
    assert_eq!(address_ty, Some(int_ptr));
    assert_eq!(value_ty, Some(int));
    assert!(address != value);
}

#[test]
fn and_condition_tests_each_term_in_its_own_block() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let bool_ty = TypeExpr::Prim(PrimType::Bool);
    let decls = b.vars(bool_ty, &[("a", None), ("c", None)]);
    let a = b.ident("a");
    let c = b.ident("c");
    let cond = b.and(&[a, c]);
    let root = b.module(&[decls]);
    let ast = b.finish();

    let mut module = IrModule::new("cond");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    let entry = enter_scratch(&mut lowerer);
    let then_bb = lowerer.append_block("then");
    let else_bb = lowerer.append_block("else");
    lowerer.lower_condition(cond, then_bb, else_bb);
    assert!(lowerer.finish().is_ok());
    assert_eq!(ctx.error_count(), 0);

    let Terminator::CondBr {
        then_bb: next,
        else_bb: first_else,
        ..
    } = terminator(&module, entry)
    else {
        panic!("entry should end in a conditional branch");
    };
    assert_eq!(first_else, else_bb);
    assert_eq!(module.block(next).name, "and.next");
    let Terminator::CondBr {
        then_bb: last_then,
        else_bb: last_else,
        ..
    } = terminator(&module, next)
    else {
        panic!("second term should end in a conditional branch");
    };
    assert_eq!((last_then, last_else), (then_bb, else_bb));
}

#[test]
fn template_instances_are_cached_by_arguments() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let head = b.member_decl("head", b.ty_named("T"));
    let list = b.template("List", &["T"], vec![head], &[]);
    let root = b.module(&[list]);
    let list_of_int = b.ty_generic("List", vec![TypeExpr::int()]);
    let list_of_long = b.ty_generic("List", vec![TypeExpr::Prim(PrimType::Long)]);
    let ast = b.finish();

    let mut module = IrModule::new("templates");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    let first = lowerer.lower_type(&list_of_int, Span::DUMMY);
    let second = lowerer.lower_type(&list_of_int, Span::DUMMY);
    let other = lowerer.lower_type(&list_of_long, Span::DUMMY);
    let name = first.map(|t| lowerer.describe(t));
    assert!(lowerer.finish().is_ok());
    assert_eq!(ctx.error_count(), 0);

    assert!(first.is_some());
    assert_eq!(first, second);
    assert!(other.is_some() && other != first);
    assert_eq!(name.as_deref(), Some("List<int>"));
}

#[test]
fn non_module_root_is_fatal() {
    let interner = StringInterner::new();
    let mut b = AstBuilder::new(&interner);
    let root = b.int(1);
    let ast = b.finish();

    let mut module = IrModule::new("root");
    let mut ctx = context(&interner);
    let mut lowerer = Lowerer::new(&mut ctx, &ast, &interner, &mut module);
    lowerer.lower_root(root);
    assert!(matches!(lowerer.finish(), Err(InternalError::RootNotModule)));
}
