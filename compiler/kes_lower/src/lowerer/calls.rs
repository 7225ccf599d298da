//! Calls: free functions, methods, argument adaptation, invoke.

use kes_diagnostic::Diagnostic;
use kes_emit::{FunctionId, TypeId, ValueId};
use kes_ir::{Name, NodeId, NodeRange, Span};

use super::{Lowerer, Operand};
use crate::error::InternalError;
use crate::runtime_decl::RuntimeFn;
use crate::symbols::{Overload, OverloadSet, ParamSig, Resolution};
use crate::type_lower::describe_list;

/// Where a call's overload set lives.
enum Callee {
    Free(Name),
    Method { object: TypeId, name: Name },
    Constructor(TypeId),
}

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Call sites
    // -----------------------------------------------------------------------

    /// `f(args)`. Inside a method, an unknown free function name falls
    /// back to a method of `this`.
    pub(crate) fn lower_call(&mut self, callee: Name, args: NodeRange, span: Span) -> Option<Operand> {
        let args = self.lower_args(args)?;
        if self.ctx.symbols.functions(callee).is_none() {
            if let Some(this_ty) = self.func.as_ref().and_then(|f| f.this_ty) {
                let has_method = self
                    .ctx
                    .symbols
                    .object_by_type(this_ty)
                    .is_some_and(|d| d.methods.contains_key(&callee));
                if has_method {
                    let this = self.this_pointer()?;
                    return self.call_method(this, this_ty, callee, &args, span);
                }
            }
            self.error(Diagnostic::unresolved(
                format!("unknown function '{}'", self.name_str(callee)),
                span,
            ));
            return None;
        }
        let overload = self.resolve(&Callee::Free(callee), &args, span)?;
        let values = self.adapt_args(&args, &overload.params, span)?;
        let result = self.emit_call(overload.function, &values);
        self.note_throws(&overload.throws);
        Self::call_result(result, overload.ret_ref)
    }

    /// `receiver.method(args)`; the receiver may be an object or a pointer
    /// to one.
    pub(crate) fn lower_method_call(
        &mut self,
        receiver: NodeId,
        method: Name,
        args: NodeRange,
        span: Span,
    ) -> Option<Operand> {
        let recv = self.lower_required(receiver)?;
        let (this, object) = self.object_address(recv, span)?;
        let args = self.lower_args(args)?;
        self.call_method(this, object, method, &args, span)
    }

    fn call_method(
        &mut self,
        this: ValueId,
        object: TypeId,
        method: Name,
        args: &[Operand],
        span: Span,
    ) -> Option<Operand> {
        let has_method = self
            .ctx
            .symbols
            .object_by_type(object)
            .is_some_and(|d| d.methods.contains_key(&method));
        if !has_method {
            self.error(Diagnostic::unresolved(
                format!(
                    "'{}' has no method '{}'",
                    self.describe(object),
                    self.name_str(method)
                ),
                span,
            ));
            return None;
        }
        let overload = self.resolve(
            &Callee::Method {
                object,
                name: method,
            },
            args,
            span,
        )?;
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(this);
        values.extend(self.adapt_args(args, &overload.params, span)?);
        let result = self.emit_call(overload.function, &values);
        self.note_throws(&overload.throws);
        Self::call_result(result, overload.ret_ref)
    }

    /// Run the constructor of `object` matching `args` on `this`.
    pub(crate) fn call_constructor(&mut self, this: ValueId, object: TypeId, args: &[Operand], span: Span) -> Option<()> {
        let overload = self.resolve(&Callee::Constructor(object), args, span)?;
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(this);
        values.extend(self.adapt_args(args, &overload.params, span)?);
        self.emit_call(overload.function, &values);
        self.note_throws(&overload.throws);
        Some(())
    }

    /// Address of the object an operand denotes, and its struct type.
    pub(crate) fn object_address(&mut self, op: Operand, span: Span) -> Option<(ValueId, TypeId)> {
        let ty = self.operand_ty(op);
        if self.is_struct(ty) {
            return Some((self.address_of(op), ty));
        }
        if let Some(pointee) = self.pointee(ty).filter(|&p| self.is_struct(p)) {
            return Some((self.load_operand(op), pointee));
        }
        self.error(Diagnostic::type_mismatch(
            format!("'{}' is not an object", self.describe(ty)),
            span,
        ));
        None
    }

    fn lower_args(&mut self, args: NodeRange) -> Option<Vec<Operand>> {
        let ast = self.ast;
        let mut lowered = Vec::with_capacity(args.len());
        let mut ok = true;
        for &arg in ast.list(args) {
            match self.lower_required(arg) {
                Some(op) => lowered.push(op),
                None => ok = false,
            }
        }
        ok.then_some(lowered)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn overload_set(&self, callee: &Callee) -> Option<&OverloadSet> {
        match *callee {
            Callee::Free(name) => self.ctx.symbols.functions(name),
            Callee::Method { object, name } => self
                .ctx
                .symbols
                .object_by_type(object)
                .and_then(|d| d.methods.get(&name)),
            Callee::Constructor(object) => self.ctx.symbols.constructors(object),
        }
    }

    fn callee_label(&self, callee: &Callee) -> String {
        match *callee {
            Callee::Free(name) => format!("function '{}'", self.name_str(name)),
            Callee::Method { object, name } => format!(
                "method '{}.{}'",
                self.describe(object),
                self.name_str(name)
            ),
            Callee::Constructor(object) => format!("constructor of '{}'", self.describe(object)),
        }
    }

    /// Resolve `callee` for `args`, reporting failures.
    fn resolve(&mut self, callee: &Callee, args: &[Operand], span: Span) -> Option<Overload> {
        let arg_tys: Vec<TypeId> = args.iter().map(|&a| self.operand_ty(a)).collect();
        let resolution = {
            let types = self.types();
            self.overload_set(callee)
                .map_or(Resolution::NotFound, |set| set.resolve(&types, &arg_tys))
        };
        match resolution {
            Resolution::Found(index) => {
                let found = self.overload_set(callee).and_then(|s| s.get(index)).cloned();
                if found.is_none() {
                    let name = self.callee_label(callee);
                    self.set_fatal(InternalError::VanishedOverload { name });
                }
                found
            }
            Resolution::NotFound => {
                self.error(Diagnostic::overload(
                    format!(
                        "no overload of {} matches {}",
                        self.callee_label(callee),
                        describe_list(&*self.emitter, &arg_tys)
                    ),
                    span,
                ));
                None
            }
            Resolution::Ambiguous(count) => {
                self.error(Diagnostic::overload(
                    format!(
                        "call to {} with {} is ambiguous between {count} overloads",
                        self.callee_label(callee),
                        describe_list(&*self.emitter, &arg_tys)
                    ),
                    span,
                ));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Argument adaptation
    // -----------------------------------------------------------------------

    /// Turn matched arguments into the values the callee receives.
    pub(crate) fn adapt_args(&mut self, args: &[Operand], params: &[ParamSig], span: Span) -> Option<Vec<ValueId>> {
        if args.len() != params.len() {
            return None;
        }
        args.iter()
            .zip(params)
            .map(|(&arg, &param)| self.adapt_arg(arg, param, span))
            .collect()
    }

    /// One argument, following the rule it matched under:
    ///
    /// - reference parameter: pass the address (a pointer argument already is one)
    /// - value parameter given a pointer to the type: load through it
    /// - pointer parameter given a value of the pointee: pass its address
    /// - otherwise the value itself; only the `long` index retry passes a
    ///   narrower integer here, and it is widened
    fn adapt_arg(&mut self, arg: Operand, param: ParamSig, span: Span) -> Option<ValueId> {
        let ty = self.operand_ty(arg);
        if param.is_reference {
            if self.pointee(ty) == Some(param.ty) {
                return Some(self.load_operand(arg));
            }
            return Some(self.address_of(arg));
        }
        if ty == param.ty {
            return Some(self.load_operand(arg));
        }
        if self.pointee(ty) == Some(param.ty) {
            let address = self.load_operand(arg);
            return Some(self.emitter.load(address));
        }
        if self.pointee(param.ty) == Some(ty) {
            return Some(self.address_of(arg));
        }
        let value = self.load_operand(arg);
        self.coerce(value, param.ty, span)
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// `call`, or `invoke` unwinding to the innermost try's landing pad.
    /// Runtime functions that cannot unwind are always plain calls.
    pub(crate) fn emit_call(&mut self, f: FunctionId, args: &[ValueId]) -> Option<ValueId> {
        let may_unwind = self.ctx.runtime.identify(f).map_or(true, RuntimeFn::may_unwind);
        let landing = self.tries.last().map(|t| t.landing_bb);
        match landing {
            Some(unwind) if may_unwind => {
                let normal = self.append_block("invoke.cont");
                let result = self.emitter.invoke(f, args, normal, unwind);
                self.emitter.position_at_end(normal);
                result
            }
            _ => self.emitter.call(f, args),
        }
    }

    /// Call result as an operand: a returned reference is a place.
    pub(crate) fn call_result(result: Option<ValueId>, ret_ref: bool) -> Option<Operand> {
        result.map(|v| {
            if ret_ref {
                Operand::place(v)
            } else {
                Operand::value(v)
            }
        })
    }
}
