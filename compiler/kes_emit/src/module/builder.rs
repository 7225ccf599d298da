//! `CodeEmitter` implementation for `IrModule`.
//!
//! Defensive throughout: a malformed request (load through a non-pointer,
//! GEP into an opaque struct, instruction after a terminator) is logged,
//! counted as a codegen error, and answered with a usable placeholder
//! instead of panicking.

use smallvec::SmallVec;

use super::{BlockData, Constant, FunctionData, Global, Instr, IrModule, Terminator, ValueDef};
use crate::ids::to_u32;
use crate::ops::{normalize_int, round_float, BinOp, CastOp, FloatPredicate, IntPredicate};
use crate::{BlockId, CodeEmitter, FunctionId, FunctionSig, TypeId, TypeKind, ValueId};

impl IrModule {
    fn push_instr(&mut self, ty: TypeId, instr: Instr) -> ValueId {
        let id = self.push_value(ty, ValueDef::Instr(instr));
        match self.position {
            Some(bb) if self.blocks[bb.index()].terminator.is_none() => {
                self.blocks[bb.index()].instrs.push(id);
            }
            Some(bb) => {
                tracing::error!(block = ?bb, value = ?id, "instruction after terminator; detached");
                self.record_codegen_error();
                self.detached.push(id);
            }
            None => {
                tracing::error!(value = ?id, "instruction with no insertion point; detached");
                self.record_codegen_error();
                self.detached.push(id);
            }
        }
        id
    }

    fn set_terminator(&mut self, term: Terminator) {
        let Some(bb) = self.position else {
            tracing::error!(?term, "terminator with no insertion point");
            self.record_codegen_error();
            return;
        };
        let block = &mut self.blocks[bb.index()];
        if block.terminator.is_some() {
            tracing::error!(block = ?bb, ?term, "block already terminated");
            self.codegen_errors += 1;
            return;
        }
        block.terminator = Some(term);
    }

    fn pointee(&self, ptr: ValueId) -> Option<TypeId> {
        match self.types.kind(self.value(ptr).ty) {
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    fn call_result_ty(&mut self, f: FunctionId, args: &[ValueId]) -> TypeId {
        let fn_ty = self.functions[f.index()].ty;
        let Some(sig) = self.types.function_sig(fn_ty) else {
            return self.types.void();
        };
        let arity_ok = if sig.variadic {
            args.len() >= sig.params.len()
        } else {
            args.len() == sig.params.len()
        };
        if !arity_ok {
            tracing::error!(
                function = %self.functions[f.index()].name,
                expected = sig.params.len(),
                got = args.len(),
                "call arity mismatch"
            );
            self.record_codegen_error();
        }
        sig.ret
    }
}

impl CodeEmitter for IrModule {
    // -- Types --

    fn int_type(&mut self, bits: u32) -> TypeId {
        self.types.int(bits)
    }

    fn float_type(&mut self, bits: u32) -> TypeId {
        self.types.float(bits)
    }

    fn void_type(&mut self) -> TypeId {
        self.types.void()
    }

    fn pointer_type(&mut self, pointee: TypeId) -> TypeId {
        self.types.pointer(pointee)
    }

    fn function_type(&mut self, params: &[TypeId], ret: TypeId, variadic: bool) -> TypeId {
        self.types.function(params.to_vec(), ret, variadic)
    }

    fn literal_struct(&mut self, fields: &[TypeId]) -> TypeId {
        self.types.literal_struct(fields.to_vec())
    }

    fn opaque_struct(&mut self, name: &str) -> TypeId {
        self.types.named_struct(name)
    }

    fn set_struct_body(&mut self, ty: TypeId, fields: &[TypeId]) -> bool {
        self.types.set_struct_body(ty, fields.to_vec())
    }

    fn struct_fields(&self, ty: TypeId) -> Option<Vec<TypeId>> {
        self.types.struct_fields(ty).map(<[TypeId]>::to_vec)
    }

    fn struct_name(&self, ty: TypeId) -> Option<String> {
        self.types.struct_name(ty).map(str::to_owned)
    }

    fn type_kind(&self, ty: TypeId) -> TypeKind {
        self.types.kind(ty)
    }

    fn function_sig(&self, ty: TypeId) -> Option<FunctionSig> {
        self.types.function_sig(ty)
    }

    fn type_of(&self, value: ValueId) -> TypeId {
        self.value(value).ty
    }

    fn size_of(&self, ty: TypeId) -> u64 {
        self.types.size_of(ty)
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.types.display(ty)
    }

    // -- Functions --

    fn declare_function(&mut self, name: &str, fn_ty: TypeId) -> FunctionId {
        if let Some(&existing) = self.function_index.get(name) {
            if self.functions[existing.index()].ty != fn_ty {
                tracing::warn!(name, "redeclared with a different type; keeping the first");
            }
            return existing;
        }
        let id = FunctionId::from_raw(to_u32(self.functions.len()));
        let param_tys = self
            .types
            .function_sig(fn_ty)
            .map(|sig| sig.params)
            .unwrap_or_default();
        let params = param_tys
            .iter()
            .enumerate()
            .map(|(i, &ty)| {
                self.push_value(
                    ty,
                    ValueDef::Param {
                        function: id,
                        index: to_u32(i),
                    },
                )
            })
            .collect();
        self.functions.push(FunctionData {
            name: name.to_owned(),
            ty: fn_ty,
            params,
            blocks: Vec::new(),
            personality: None,
            ptr: None,
        });
        self.function_index.insert(name.to_owned(), id);
        tracing::trace!(name, ?id, "declare function");
        id
    }

    fn get_function(&self, name: &str) -> Option<FunctionId> {
        self.function_by_name(name)
    }

    fn function_name(&self, f: FunctionId) -> String {
        self.functions[f.index()].name.clone()
    }

    fn function_type_of(&self, f: FunctionId) -> TypeId {
        self.functions[f.index()].ty
    }

    fn param(&mut self, f: FunctionId, index: u32) -> ValueId {
        match self.functions[f.index()].params.get(index as usize) {
            Some(&v) => v,
            None => {
                tracing::error!(function = ?f, index, "parameter index out of range");
                self.record_codegen_error();
                let ty = self.types.int(64);
                self.const_zero(ty)
            }
        }
    }

    fn function_ptr(&mut self, f: FunctionId) -> ValueId {
        if let Some(ptr) = self.functions[f.index()].ptr {
            return ptr;
        }
        let fn_ty = self.functions[f.index()].ty;
        let ptr_ty = self.types.pointer(fn_ty);
        let v = self.push_value(ptr_ty, ValueDef::Function(f));
        self.functions[f.index()].ptr = Some(v);
        v
    }

    fn set_personality(&mut self, f: FunctionId, personality: FunctionId) {
        self.functions[f.index()].personality = Some(personality);
    }

    // -- Blocks --

    fn append_block(&mut self, f: FunctionId, name: &str) -> BlockId {
        let id = BlockId::from_raw(to_u32(self.blocks.len()));
        self.blocks.push(BlockData {
            name: name.to_owned(),
            function: f,
            instrs: Vec::new(),
            terminator: None,
        });
        self.functions[f.index()].blocks.push(id);
        id
    }

    fn position_at_end(&mut self, bb: BlockId) {
        self.position = Some(bb);
    }

    fn clear_position(&mut self) {
        self.position = None;
    }

    fn current_block(&self) -> Option<BlockId> {
        self.position
    }

    fn current_function(&self) -> Option<FunctionId> {
        self.position.map(|bb| self.blocks[bb.index()].function)
    }

    fn block_terminated(&self, bb: BlockId) -> bool {
        self.blocks[bb.index()].terminator.is_some()
    }

    // -- Constants --

    fn const_int(&mut self, ty: TypeId, value: i64) -> ValueId {
        let bits = match self.types.kind(ty) {
            TypeKind::Int { bits } => bits,
            other => {
                tracing::error!(?other, "const_int of non-integer type");
                self.record_codegen_error();
                64
            }
        };
        self.push_value(ty, ValueDef::Const(Constant::Int(normalize_int(value, bits))))
    }

    fn const_float(&mut self, ty: TypeId, value: f64) -> ValueId {
        let bits = match self.types.kind(ty) {
            TypeKind::Float { bits } => bits,
            _ => 64,
        };
        self.push_value(ty, ValueDef::Const(Constant::Float(round_float(value, bits))))
    }

    fn const_null(&mut self, ty: TypeId) -> ValueId {
        self.push_value(ty, ValueDef::Const(Constant::Null))
    }

    fn const_zero(&mut self, ty: TypeId) -> ValueId {
        let c = match self.types.kind(ty) {
            TypeKind::Int { .. } => Constant::Int(0),
            TypeKind::Float { .. } => Constant::Float(0.0),
            TypeKind::Pointer { .. } | TypeKind::Function => Constant::Null,
            TypeKind::Struct | TypeKind::Array { .. } | TypeKind::Void => Constant::Zero,
        };
        self.push_value(ty, ValueDef::Const(c))
    }

    fn const_struct(&mut self, ty: TypeId, fields: &[ValueId]) -> ValueId {
        self.push_value(ty, ValueDef::Const(Constant::Struct(fields.to_vec())))
    }

    fn is_constant(&self, value: ValueId) -> bool {
        matches!(
            self.value(value).def,
            ValueDef::Const(_) | ValueDef::Global(_) | ValueDef::Function(_)
        )
    }

    fn const_int_value(&self, value: ValueId) -> Option<i64> {
        match self.constant(value)? {
            Constant::Int(v) => Some(*v),
            _ => None,
        }
    }

    // -- Globals --

    fn add_global(&mut self, name: &str, ty: TypeId) -> ValueId {
        let index = to_u32(self.globals.len());
        self.globals.push(Global {
            name: name.to_owned(),
            value_ty: ty,
            init: None,
        });
        let ptr_ty = self.types.pointer(ty);
        self.push_value(ptr_ty, ValueDef::Global(index))
    }

    fn set_global_initializer(&mut self, global: ValueId, init: ValueId) -> bool {
        let ValueDef::Global(index) = self.value(global).def else {
            tracing::error!(value = ?global, "initializer for a non-global");
            self.record_codegen_error();
            return false;
        };
        if !self.is_constant(init) {
            return false;
        }
        self.globals[index as usize].init = Some(init);
        true
    }

    fn is_global(&self, value: ValueId) -> bool {
        matches!(self.value(value).def, ValueDef::Global(_))
    }

    fn global_string(&mut self, text: &str) -> ValueId {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let i8t = self.types.int(8);
        let arr = self.types.array(i8t, bytes.len() as u64);
        let init = self.push_value(arr, ValueDef::Const(Constant::Bytes(bytes)));
        let index = to_u32(self.globals.len());
        self.globals.push(Global {
            name: format!(".str.{}", self.string_count),
            value_ty: arr,
            init: Some(init),
        });
        self.string_count += 1;
        let i8p = self.types.pointer(i8t);
        self.push_value(i8p, ValueDef::Global(index))
    }

    // -- Instructions --

    fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let Some(v) = self.fold_binary(op, lhs, rhs) {
            return v;
        }
        let lty = self.value(lhs).ty;
        let rty = self.value(rhs).ty;
        if lty != rty {
            tracing::error!(lhs = %self.types.display(lty), rhs = %self.types.display(rty), %op, "binary operand types differ");
            self.record_codegen_error();
        }
        self.push_instr(lty, Instr::Binary { op, lhs, rhs })
    }

    fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let Some(v) = self.fold_icmp(pred, lhs, rhs) {
            return v;
        }
        let i1 = self.types.int(1);
        self.push_instr(i1, Instr::ICmp { pred, lhs, rhs })
    }

    fn fcmp(&mut self, pred: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let Some(v) = self.fold_fcmp(pred, lhs, rhs) {
            return v;
        }
        let i1 = self.types.int(1);
        self.push_instr(i1, Instr::FCmp { pred, lhs, rhs })
    }

    fn cast(&mut self, op: CastOp, value: ValueId, to: TypeId) -> ValueId {
        if self.value(value).ty == to {
            return value;
        }
        if let Some(v) = self.fold_cast(op, value, to) {
            return v;
        }
        self.push_instr(to, Instr::Cast { op, value })
    }

    fn alloca(&mut self, ty: TypeId, name: &str) -> ValueId {
        tracing::trace!(name, ty = %self.types.display(ty), "alloca");
        let ptr_ty = self.types.pointer(ty);
        self.push_instr(ptr_ty, Instr::Alloca { ty })
    }

    fn load(&mut self, ptr: ValueId) -> ValueId {
        let Some(pointee) = self.pointee(ptr) else {
            tracing::error!(val_type = %self.types.display(self.value(ptr).ty), "load from non-pointer; returning zero");
            self.record_codegen_error();
            let i64t = self.types.int(64);
            return self.const_zero(i64t);
        };
        self.push_instr(pointee, Instr::Load { ptr })
    }

    fn store(&mut self, value: ValueId, ptr: ValueId) {
        match self.pointee(ptr) {
            Some(pointee) if pointee == self.value(value).ty => {}
            _ => {
                tracing::error!(
                    val_type = %self.types.display(self.value(value).ty),
                    ptr_type = %self.types.display(self.value(ptr).ty),
                    "store type mismatch; skipping"
                );
                self.record_codegen_error();
                return;
            }
        }
        let void = self.types.void();
        self.push_instr(void, Instr::Store { value, ptr });
    }

    fn struct_gep(&mut self, ptr: ValueId, index: u32) -> ValueId {
        let field_ty = self
            .pointee(ptr)
            .and_then(|s| self.types.struct_fields(s))
            .and_then(|fields| fields.get(index as usize).copied());
        let Some(field_ty) = field_ty else {
            tracing::error!(val_type = %self.types.display(self.value(ptr).ty), index, "struct_gep on non-struct or out of range");
            self.record_codegen_error();
            return ptr;
        };
        let ptr_ty = self.types.pointer(field_ty);
        self.push_instr(ptr_ty, Instr::StructGep { ptr, index })
    }

    fn gep(&mut self, ptr: ValueId, index: ValueId) -> ValueId {
        let ty = self.value(ptr).ty;
        if !self.types.kind(ty).is_pointer() {
            tracing::error!(val_type = %self.types.display(ty), "gep on non-pointer");
            self.record_codegen_error();
            return ptr;
        }
        self.push_instr(ty, Instr::Gep { ptr, index })
    }

    fn extract_value(&mut self, aggregate: ValueId, index: u32) -> ValueId {
        let agg_ty = self.value(aggregate).ty;
        let Some(field_ty) = self
            .types
            .struct_fields(agg_ty)
            .and_then(|f| f.get(index as usize).copied())
        else {
            tracing::error!(val_type = %self.types.display(agg_ty), index, "extract_value out of range");
            self.record_codegen_error();
            return aggregate;
        };
        self.push_instr(field_ty, Instr::ExtractValue { aggregate, index })
    }

    fn phi(&mut self, ty: TypeId, incoming: &[(ValueId, BlockId)]) -> ValueId {
        let incoming: SmallVec<[(ValueId, BlockId); 4]> = incoming.iter().copied().collect();
        self.push_instr(ty, Instr::Phi { incoming })
    }

    fn call(&mut self, f: FunctionId, args: &[ValueId]) -> Option<ValueId> {
        let ret = self.call_result_ty(f, args);
        let v = self.push_instr(
            ret,
            Instr::Call {
                function: f,
                args: args.to_vec(),
            },
        );
        (self.types.kind(ret) != TypeKind::Void).then_some(v)
    }

    fn inline_asm(&mut self, text: &str) {
        let void = self.types.void();
        self.push_instr(
            void,
            Instr::InlineAsm {
                text: text.to_owned(),
            },
        );
    }

    // -- Exceptions --

    fn invoke(
        &mut self,
        f: FunctionId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
    ) -> Option<ValueId> {
        let ret = self.call_result_ty(f, args);
        let result = (self.types.kind(ret) != TypeKind::Void)
            .then(|| self.push_value(ret, ValueDef::InvokeResult));
        self.set_terminator(Terminator::Invoke {
            function: f,
            args: args.to_vec(),
            normal,
            unwind,
            result,
        });
        result
    }

    fn landing_pad(&mut self, clauses: &[ValueId], catch_all: bool) -> ValueId {
        let i8t = self.types.int(8);
        let i8p = self.types.pointer(i8t);
        let i32t = self.types.int(32);
        let ty = self.types.literal_struct(vec![i8p, i32t]);
        self.push_instr(
            ty,
            Instr::LandingPad {
                clauses: clauses.to_vec(),
                catch_all,
            },
        )
    }

    fn eh_typeid_for(&mut self, descriptor: ValueId) -> ValueId {
        let i32t = self.types.int(32);
        self.push_instr(i32t, Instr::TypeIdFor { descriptor })
    }

    fn resume(&mut self, value: ValueId) {
        self.set_terminator(Terminator::Resume(value));
    }

    // -- Terminators --

    fn br(&mut self, dest: BlockId) {
        self.set_terminator(Terminator::Br(dest));
    }

    fn cond_br(&mut self, cond: ValueId, then_bb: BlockId, else_bb: BlockId) {
        let ty = self.value(cond).ty;
        if self.types.kind(ty) != (TypeKind::Int { bits: 1 }) {
            tracing::error!(val_type = %self.types.display(ty), "cond_br on non-i1; branching to else");
            self.record_codegen_error();
            self.set_terminator(Terminator::Br(else_bb));
            return;
        }
        self.set_terminator(Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        });
    }

    fn ret(&mut self, value: Option<ValueId>) {
        self.set_terminator(Terminator::Ret(value));
    }

    fn unreachable(&mut self) {
        self.set_terminator(Terminator::Unreachable);
    }
}
