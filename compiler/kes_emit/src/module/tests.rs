use pretty_assertions::assert_eq;

use super::*;
use crate::{CodeEmitter, TypeKind};

fn module_with_main() -> (IrModule, FunctionId, BlockId) {
    let mut m = IrModule::new("test");
    let i32t = m.int_type(32);
    let fn_ty = m.function_type(&[], i32t, false);
    let f = m.declare_function("main", fn_ty);
    let entry = m.append_block(f, "entry");
    m.position_at_end(entry);
    (m, f, entry)
}

#[test]
fn declare_function_is_get_or_declare() {
    let mut m = IrModule::new("test");
    let i32t = m.int_type(32);
    let fn_ty = m.function_type(&[i32t], i32t, false);
    let a = m.declare_function("f(int)", fn_ty);
    let b = m.declare_function("f(int)", fn_ty);
    assert_eq!(a, b);
    assert_eq!(m.get_function("f(int)"), Some(a));
    assert!(m.function(a).is_declaration());
    assert_eq!(m.type_of(m.function(a).params[0]), i32t);
}

#[test]
fn instructions_land_in_current_block() {
    let (mut m, _, entry) = module_with_main();
    let i32t = m.int_type(32);
    let slot = m.alloca(i32t, "x");
    let five = m.const_int(i32t, 5);
    m.store(five, slot);
    let loaded = m.load(slot);
    m.ret(Some(loaded));

    assert_eq!(m.block(entry).instrs.len(), 3);
    assert!(m.block_terminated(entry));
    assert_eq!(m.type_of(loaded), i32t);
    assert_eq!(m.codegen_error_count(), 0);
}

#[test]
fn instruction_after_terminator_is_detached() {
    let (mut m, _, entry) = module_with_main();
    m.ret(None);
    let i32t = m.int_type(32);
    let slot = m.alloca(i32t, "late");
    assert_eq!(m.detached(), &[slot]);
    assert_eq!(m.codegen_error_count(), 1);
    assert!(m.block(entry).instrs.is_empty());
}

#[test]
fn second_terminator_is_rejected() {
    let (mut m, f, entry) = module_with_main();
    let other = m.append_block(f, "other");
    m.br(other);
    m.br(entry);
    assert_eq!(m.block(entry).terminator, Some(Terminator::Br(other)));
    assert_eq!(m.codegen_error_count(), 1);
}

#[test]
fn store_type_mismatch_is_skipped() {
    let (mut m, _, entry) = module_with_main();
    let i32t = m.int_type(32);
    let i64t = m.int_type(64);
    let slot = m.alloca(i32t, "x");
    let wide = m.const_int(i64t, 1);
    m.store(wide, slot);
    assert_eq!(m.block(entry).instrs.len(), 1);
    assert_eq!(m.codegen_error_count(), 1);
}

#[test]
fn struct_gep_types_follow_fields() {
    let (mut m, _, _) = module_with_main();
    let i32t = m.int_type(32);
    let f64t = m.float_type(64);
    let point = m.opaque_struct("Point");
    assert!(m.set_struct_body(point, &[i32t, f64t]));
    let slot = m.alloca(point, "p");
    let y = m.struct_gep(slot, 1);
    let f64p = m.pointer_type(f64t);
    assert_eq!(m.type_of(y), f64p);
    let bad = m.struct_gep(slot, 7);
    assert_eq!(bad, slot);
    assert_eq!(m.codegen_error_count(), 1);
}

#[test]
fn void_call_has_no_value() {
    let (mut m, _, _) = module_with_main();
    let void = m.void_type();
    let fn_ty = m.function_type(&[], void, false);
    let g = m.declare_function("g", fn_ty);
    assert_eq!(m.call(g, &[]), None);
    let i32t = m.int_type(32);
    let h_ty = m.function_type(&[], i32t, false);
    let h = m.declare_function("h", h_ty);
    assert!(m.call(h, &[]).is_some());
}

#[test]
fn invoke_terminates_block() {
    let (mut m, f, entry) = module_with_main();
    let i32t = m.int_type(32);
    let fn_ty = m.function_type(&[], i32t, false);
    let callee = m.declare_function("may_throw", fn_ty);
    let normal = m.append_block(f, "normal");
    let unwind = m.append_block(f, "unwind");
    let result = m.invoke(callee, &[], normal, unwind);
    assert!(result.is_some());
    assert!(m.block_terminated(entry));
    let succ = m.block(entry).terminator.as_ref().map(Terminator::successors);
    assert_eq!(succ.as_deref(), Some(&[normal, unwind][..]));
}

#[test]
fn landing_pad_is_ptr_selector_pair() {
    let (mut m, _, _) = module_with_main();
    let pad = m.landing_pad(&[], true);
    let ty = m.type_of(pad);
    let fields = m.struct_fields(ty).unwrap_or_default();
    assert_eq!(fields.len(), 2);
    assert!(matches!(m.type_kind(fields[0]), TypeKind::Pointer { .. }));
    assert_eq!(m.type_kind(fields[1]), TypeKind::Int { bits: 32 });
}

#[test]
fn global_string_is_i8_pointer() {
    let mut m = IrModule::new("test");
    let s = m.global_string("hi");
    let i8t = m.int_type(8);
    let i8p = m.pointer_type(i8t);
    assert_eq!(m.type_of(s), i8p);
    assert!(m.is_constant(s));
    assert_eq!(m.globals().len(), 1);
    assert_eq!(
        m.constant(m.globals()[0].init.unwrap_or(ValueId::NONE)),
        Some(&Constant::Bytes(b"hi\0".to_vec()))
    );
}

#[test]
fn global_initializer_requires_constant() {
    let (mut m, _, _) = module_with_main();
    let i32t = m.int_type(32);
    let g = m.add_global("g", i32t);
    let slot = m.alloca(i32t, "x");
    let loaded = m.load(slot);
    assert!(!m.set_global_initializer(g, loaded));
    let seven = m.const_int(i32t, 7);
    assert!(m.set_global_initializer(g, seven));
    assert_eq!(m.globals()[0].init, Some(seven));
}

#[test]
fn printer_renders_function() {
    let (mut m, _, _) = module_with_main();
    let i32t = m.int_type(32);
    let zero = m.const_int(i32t, 0);
    m.ret(Some(zero));
    let text = m.to_string();
    assert!(text.contains("define i32 @\"main\"() {"));
    assert!(text.contains("ret i32 0"));
}
