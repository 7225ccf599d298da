//! Functions, methods, constructors, operators, and the module root.
//!
//! Declaring a callable lowers its signature, creates the backend function
//! under its mangled symbol, enters it in the right table, and leaves a
//! [`PendingFn`] behind. Defining it later lowers the body and records the
//! body's throw set on the table entry.
//!
//! Symbols:
//!
//! | Callable | Symbol |
//! |----------|--------|
//! | free function | `name(int,Point&)` |
//! | entry point with no parameters | `main` |
//! | method | `Point.norm(double)` |
//! | constructor | `Point.new(int,int)` |
//! | operator | `operator+(Point,Point)` |

use std::mem;

use kes_diagnostic::Diagnostic;
use kes_emit::{FunctionId, TypeId, TypeKind};
use kes_ir::{
    ConstructorDecl, FunctionDecl, Name, NodeId, NodeRange, OpSymbol, OperatorDecl, Param, Span,
    TypeExpr,
};

use super::{FunctionState, Lowerer};
use crate::error::InternalError;
use crate::operators::{OperatorEntry, OperatorKey};
use crate::symbols::{Overload, ParamSig, ThrowSet, VarBinding};

/// A lowered parameter list and return type.
#[derive(Clone, Debug)]
pub(crate) struct Signature {
    pub names: Vec<Name>,
    pub params: Vec<ParamSig>,
    pub ret: TypeId,
    pub ret_ref: bool,
}

/// The table entry a body's throw set is recorded on.
#[derive(Copy, Clone, Debug)]
pub(crate) enum FnOwner {
    Free(Name),
    Method { object: TypeId, name: Name },
    Constructor(TypeId),
    Operator(usize),
}

/// A declared callable whose body has not been lowered.
#[derive(Clone, Debug)]
pub(crate) struct PendingFn {
    pub function: FunctionId,
    pub symbol: String,
    pub sig: Signature,
    pub this_ty: Option<TypeId>,
    pub owner: FnOwner,
    pub body: NodeId,
}

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Module root
    // -----------------------------------------------------------------------

    /// Lower a module's items in source order. Each declaration is visible
    /// to the items after it; a function is declared before its own body,
    /// so it may recurse.
    pub(crate) fn lower_module_items(&mut self, items: NodeRange) {
        let ast = self.ast;
        for &item in ast.list(items) {
            if self.is_fatal() {
                return;
            }
            self.lower_stmt(item);
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch entry points
    // -----------------------------------------------------------------------

    pub(crate) fn lower_function_decl(&mut self, id: NodeId, decl: &FunctionDecl, span: Span) {
        if self.func.is_some() {
            self.error(Diagnostic::structural(
                "functions must be declared at module scope",
                span,
            ));
            return;
        }
        self.declare_free_function(id, decl, span);
        self.define_pending(id);
    }

    pub(crate) fn lower_operator_decl(&mut self, id: NodeId, decl: &OperatorDecl, span: Span) {
        if self.func.is_some() {
            self.error(Diagnostic::structural(
                "operators must be declared at module scope",
                span,
            ));
            return;
        }
        self.declare_operator(id, decl, span);
        self.define_pending(id);
    }

    // -----------------------------------------------------------------------
    // Signatures
    // -----------------------------------------------------------------------

    pub(crate) fn param_sig(&mut self, ty: &TypeExpr, span: Span) -> Option<ParamSig> {
        let value_ty = self.lower_type(ty.strip_reference(), span)?;
        if self.kind(value_ty) == TypeKind::Void {
            self.error(Diagnostic::type_mismatch("parameters cannot have type 'void'", span));
            return None;
        }
        Some(ParamSig {
            ty: value_ty,
            is_reference: ty.is_reference(),
        })
    }

    fn lower_signature(&mut self, params: &[Param], ret: &TypeExpr, span: Span) -> Option<Signature> {
        let mut sig = Signature {
            names: Vec::with_capacity(params.len()),
            params: Vec::with_capacity(params.len()),
            ret: TypeId::NONE,
            ret_ref: ret.is_reference(),
        };
        let mut ok = true;
        for param in params {
            match self.param_sig(&param.ty, span) {
                Some(p) => {
                    sig.names.push(param.name);
                    sig.params.push(p);
                }
                None => ok = false,
            }
        }
        sig.ret = self.lower_type(ret.strip_reference(), span)?;
        ok.then_some(sig)
    }

    /// Backend function type: `this` first for methods, references as
    /// pointers.
    fn backend_fn_type(&mut self, this_ty: Option<TypeId>, sig: &Signature) -> TypeId {
        let mut params = Vec::with_capacity(sig.params.len() + 1);
        if let Some(this) = this_ty {
            params.push(self.emitter.pointer_type(this));
        }
        for p in &sig.params {
            params.push(if p.is_reference {
                self.emitter.pointer_type(p.ty)
            } else {
                p.ty
            });
        }
        let ret = if sig.ret_ref {
            self.emitter.pointer_type(sig.ret)
        } else {
            sig.ret
        };
        self.emitter.function_type(&params, ret, false)
    }

    pub(crate) fn mangle(&self, base: &str, params: &[ParamSig]) -> String {
        let parts: Vec<String> = params
            .iter()
            .map(|p| {
                let ty = self.describe(p.ty);
                if p.is_reference {
                    format!("{ty}&")
                } else {
                    ty
                }
            })
            .collect();
        format!("{base}({})", parts.join(","))
    }

    fn make_overload(symbol: &str, sig: &Signature, function: FunctionId) -> Overload {
        Overload {
            symbol: symbol.to_owned(),
            params: sig.params.clone(),
            ret: sig.ret,
            ret_ref: sig.ret_ref,
            function,
            throws: ThrowSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Declare
    // -----------------------------------------------------------------------

    pub(crate) fn declare_free_function(&mut self, id: NodeId, decl: &FunctionDecl, span: Span) {
        if !self.declared.insert(id) {
            return;
        }
        let Some(sig) = self.lower_signature(&decl.params, &decl.ret, span) else {
            return;
        };
        let name = self.name_str(decl.name);
        let symbol = if name == self.ctx.options.entry_point && sig.params.is_empty() {
            name.to_owned()
        } else {
            self.mangle(name, &sig.params)
        };
        let fn_ty = self.backend_fn_type(None, &sig);
        let function = self.emitter.declare_function(&symbol, fn_ty);
        let overload = Self::make_overload(&symbol, &sig, function);
        if self.ctx.symbols.declare_function(decl.name, overload).is_err() {
            self.error(Diagnostic::structural(
                format!("function '{symbol}' is already declared"),
                span,
            ));
            return;
        }
        tracing::debug!(%symbol, "function declared");
        self.pending.insert(
            id,
            PendingFn {
                function,
                symbol,
                sig,
                this_ty: None,
                owner: FnOwner::Free(decl.name),
                body: decl.body,
            },
        );
    }

    pub(crate) fn declare_method(&mut self, id: NodeId, object: TypeId, decl: &FunctionDecl, span: Span) {
        if !self.declared.insert(id) {
            return;
        }
        let Some(sig) = self.lower_signature(&decl.params, &decl.ret, span) else {
            return;
        };
        let object_name = self.describe(object);
        let symbol = self.mangle(&format!("{object_name}.{}", self.name_str(decl.name)), &sig.params);
        let fn_ty = self.backend_fn_type(Some(object), &sig);
        let function = self.emitter.declare_function(&symbol, fn_ty);
        let overload = Self::make_overload(&symbol, &sig, function);
        let Some(desc) = self.ctx.symbols.object_by_type_mut(object) else {
            self.set_fatal(InternalError::MissingObject { name: object_name });
            return;
        };
        if desc.methods.entry(decl.name).or_default().insert(overload).is_err() {
            self.error(Diagnostic::structural(
                format!("method '{symbol}' is already declared"),
                span,
            ));
            return;
        }
        tracing::debug!(%symbol, "method declared");
        self.pending.insert(
            id,
            PendingFn {
                function,
                symbol,
                sig,
                this_ty: Some(object),
                owner: FnOwner::Method {
                    object,
                    name: decl.name,
                },
                body: decl.body,
            },
        );
    }

    pub(crate) fn declare_constructor(&mut self, id: NodeId, object: TypeId, decl: &ConstructorDecl, span: Span) {
        if !self.declared.insert(id) {
            return;
        }
        let void = TypeExpr::void();
        let Some(sig) = self.lower_signature(&decl.params, &void, span) else {
            return;
        };
        let object_name = self.describe(object);
        let symbol = self.mangle(&format!("{object_name}.new"), &sig.params);
        let fn_ty = self.backend_fn_type(Some(object), &sig);
        let function = self.emitter.declare_function(&symbol, fn_ty);
        let overload = Self::make_overload(&symbol, &sig, function);
        let Some(desc) = self.ctx.symbols.object_by_type_mut(object) else {
            self.set_fatal(InternalError::MissingObject { name: object_name });
            return;
        };
        if desc.constructors.insert(overload).is_err() {
            self.error(Diagnostic::structural(
                format!("constructor '{symbol}' is already declared"),
                span,
            ));
            return;
        }
        tracing::debug!(%symbol, "constructor declared");
        self.pending.insert(
            id,
            PendingFn {
                function,
                symbol,
                sig,
                this_ty: Some(object),
                owner: FnOwner::Constructor(object),
                body: decl.body,
            },
        );
    }

    /// Register an operator. The key's shape follows the symbol:
    /// binary and `[]` take both sides, prefix unary only the right, `as`
    /// the operand plus the return type as target, `delete` the operand.
    pub(crate) fn declare_operator(&mut self, id: NodeId, decl: &OperatorDecl, span: Span) {
        if !self.declared.insert(id) {
            return;
        }
        let lhs = decl.lhs.as_ref().map(|p| self.param_sig(&p.ty, span));
        let rhs = decl.rhs.as_ref().map(|p| self.param_sig(&p.ty, span));
        if lhs == Some(None) || rhs == Some(None) {
            return;
        }
        let (lhs, rhs) = (lhs.flatten(), rhs.flatten());
        let Some(ret) = self.lower_type(decl.ret.strip_reference(), span) else {
            return;
        };

        let key = match (decl.symbol, lhs, rhs) {
            (OpSymbol::Binary(_) | OpSymbol::Index, Some(l), Some(r)) => OperatorKey::binary(l.ty, decl.symbol, r.ty),
            (OpSymbol::Unary(_), None, Some(r)) => OperatorKey::prefix(decl.symbol, r.ty),
            (OpSymbol::As, Some(l), None) => OperatorKey::binary(l.ty, OpSymbol::As, ret),
            (OpSymbol::Delete, Some(l), None) => OperatorKey::postfix(l.ty, OpSymbol::Delete),
            _ => {
                self.error(Diagnostic::structural(
                    format!("operator '{}' has the wrong operands", decl.symbol),
                    span,
                ));
                return;
            }
        };

        let mut names = Vec::with_capacity(2);
        let mut params = Vec::with_capacity(2);
        for (param, sig) in [(&decl.lhs, lhs), (&decl.rhs, rhs)] {
            if let (Some(param), Some(sig)) = (param, sig) {
                names.push(param.name);
                params.push(sig);
            }
        }
        let sig = Signature {
            names,
            params,
            ret,
            ret_ref: decl.ret.is_reference(),
        };
        let symbol = self.mangle(&format!("operator{}", decl.symbol), &sig.params);
        let fn_ty = self.backend_fn_type(None, &sig);
        let function = self.emitter.declare_function(&symbol, fn_ty);
        let entry = OperatorEntry {
            function,
            params: sig.params.clone(),
            ret: sig.ret,
            ret_ref: sig.ret_ref,
            throws: ThrowSet::new(),
        };
        let Ok(index) = self.ctx.operators.insert(key, entry) else {
            self.error(Diagnostic::structural(
                format!("operator '{symbol}' is already declared"),
                span,
            ));
            return;
        };
        self.pending.insert(
            id,
            PendingFn {
                function,
                symbol,
                sig,
                this_ty: None,
                owner: FnOwner::Operator(index),
                body: decl.body,
            },
        );
    }

    // -----------------------------------------------------------------------
    // Define
    // -----------------------------------------------------------------------

    /// Lower the body of the callable declared by `id`, if it has one.
    pub(crate) fn define_pending(&mut self, id: NodeId) {
        let Some(pending) = self.pending.remove(&id) else {
            return;
        };
        if !pending.body.is_valid() {
            return;
        }
        let throws = self.lower_body(&pending);
        self.record_throws(&pending, throws);
    }

    /// Lower a function body in a fresh function state and return the
    /// exception types it lets escape.
    fn lower_body(&mut self, pending: &PendingFn) -> ThrowSet {
        let function = pending.function;
        let saved_func = self.func.take();
        let saved_loops = mem::take(&mut self.loops);
        let saved_tries = mem::take(&mut self.tries);
        let saved_block = self.emitter.current_block();
        let saved_vars = {
            let emitter = &*self.emitter;
            self.ctx.symbols.enter_function(|b| emitter.is_global(b.storage))
        };

        let alloca_bb = self.emitter.append_block(function, "entry");
        let body_bb = self.emitter.append_block(function, "body");
        self.func = Some(FunctionState {
            id: function,
            symbol: pending.symbol.clone(),
            ret: pending.sig.ret,
            ret_ref: pending.sig.ret_ref,
            this_ty: pending.this_ty,
            alloca_bb,
        });
        self.emitter.position_at_end(alloca_bb);
        self.bind_params(pending);

        self.emitter.position_at_end(body_bb);
        self.push_throw_frame();
        self.lower_stmt(pending.body);
        let throws = self.pop_throw_frame();
        if !self.emitter.current_block_terminated() {
            self.emit_default_return();
        }
        self.emitter.position_at_end(alloca_bb);
        self.emitter.br(body_bb);

        if !self.loops.is_empty() {
            self.set_fatal(InternalError::UnbalancedTargets {
                function: pending.symbol.clone(),
                expected: 0,
                found: self.loops.len(),
            });
        }

        self.ctx.symbols.exit_function(saved_vars);
        self.func = saved_func;
        self.loops = saved_loops;
        self.tries = saved_tries;
        match saved_block {
            Some(bb) => self.emitter.position_at_end(bb),
            None => self.emitter.clear_position(),
        }
        throws
    }

    /// Bind `this` and the parameters. Value parameters get a stack slot;
    /// reference parameters are bound to the address they receive.
    fn bind_params(&mut self, pending: &PendingFn) {
        let function = pending.function;
        let mut index = 0;
        if let Some(object) = pending.this_ty {
            let this = self.emitter.param(function, 0);
            let this_ty = self.emitter.pointer_type(object);
            let slot = self.emitter.alloca(this_ty, "this");
            self.emitter.store(this, slot);
            self.ctx.symbols.set_variable(
                self.this_name,
                VarBinding {
                    storage: slot,
                    value_ty: this_ty,
                    is_reference: false,
                },
            );
            index = 1;
        }
        for (&name, &param) in pending.sig.names.iter().zip(&pending.sig.params) {
            let value = self.emitter.param(function, index);
            index += 1;
            let storage = if param.is_reference {
                value
            } else {
                let label = self.name_str(name);
                let slot = self.emitter.alloca(param.ty, label);
                self.emitter.store(value, slot);
                slot
            };
            self.ctx.symbols.set_variable(
                name,
                VarBinding {
                    storage,
                    value_ty: param.ty,
                    is_reference: param.is_reference,
                },
            );
        }
    }

    fn record_throws(&mut self, pending: &PendingFn, throws: ThrowSet) {
        let function = pending.function;
        let symbols = &mut self.ctx.symbols;
        let slot = match pending.owner {
            FnOwner::Free(name) => symbols
                .functions_mut(name)
                .and_then(|s| s.by_function_mut(function))
                .map(|o| &mut o.throws),
            FnOwner::Method { object, name } => symbols
                .object_by_type_mut(object)
                .and_then(|d| d.methods.get_mut(&name))
                .and_then(|s| s.by_function_mut(function))
                .map(|o| &mut o.throws),
            FnOwner::Constructor(object) => symbols
                .object_by_type_mut(object)
                .and_then(|d| d.constructors.by_function_mut(function))
                .map(|o| &mut o.throws),
            FnOwner::Operator(index) => self.ctx.operators.get_mut(index).map(|e| &mut e.throws),
        };
        match slot {
            Some(slot) => *slot = throws,
            None => self.set_fatal(InternalError::VanishedOverload {
                name: pending.symbol.clone(),
            }),
        }
    }
}
