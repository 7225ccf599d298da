//! Template declarations and instantiation.
//!
//! `instantiate` creates the instance's struct as an opaque type and enters
//! it in the caches *before* lowering any member, so a member such as
//! `Node<T>* next` inside `Node<T>` resolves to the instance under
//! construction. Members and method bodies are lowered by a nested
//! [`Lowerer`] over the blueprint's AST while each placeholder name is
//! bound to its argument type.

use kes_diagnostic::Diagnostic;
use kes_emit::TypeId;
use kes_ir::{Name, Span, TemplateDecl};
use tracing::instrument;

use super::Lowerer;
use crate::error::InternalError;
use crate::symbols::ObjectDesc;
use crate::templates::{Blueprint, BlueprintBody};

impl Lowerer<'_> {
    pub(crate) fn register_template(&mut self, decl: &TemplateDecl, span: Span) {
        if self.func.is_some() {
            self.error(Diagnostic::structural(
                "templates must be declared at module scope",
                span,
            ));
            return;
        }
        let ast = self.shared_ast();
        let methods = self.ast.list(decl.methods).to_vec();
        let blueprint = Blueprint {
            name: decl.name,
            params: decl.params.clone(),
            body: BlueprintBody::Declared {
                ast,
                members: decl.members.clone(),
                methods,
            },
        };
        if self.ctx.templates.insert(blueprint).is_err() {
            self.error(Diagnostic::structural(
                format!(
                    "template '{}' with {} parameters is already declared",
                    self.name_str(decl.name),
                    decl.params.len()
                ),
                span,
            ));
            return;
        }
        tracing::debug!(template = self.name_str(decl.name), "template registered");
    }

    /// The object type for `name<args>`, instantiating it on first use.
    #[instrument(level = "debug", skip_all, fields(template = self.name_str(name)))]
    pub(crate) fn instantiate(&mut self, name: Name, args: &[TypeId], span: Span) -> Option<TypeId> {
        if let Some(ty) = self.ctx.templates.instance(name, args) {
            return Some(ty);
        }
        let text = self.name_str(name);
        let Some(blueprint) = self.ctx.templates.get(name, args.len()).cloned() else {
            if self.ctx.templates.has_name(name) {
                self.error(Diagnostic::type_mismatch(
                    format!("template '{text}' does not take {} type arguments", args.len()),
                    span,
                ));
            } else {
                self.error(Diagnostic::unresolved(format!("unknown template '{text}'"), span));
            }
            return None;
        };

        let arg_names: Vec<String> = args.iter().map(|&a| self.describe(a)).collect();
        let canonical = format!("{text}<{}>", arg_names.join(","));
        let canonical_name = self.interner.intern(&canonical);
        if let Some(desc) = self.ctx.symbols.object(canonical_name) {
            let ty = desc.ty;
            self.ctx.templates.record_instance(name, args.to_vec(), ty);
            return Some(ty);
        }

        let ty = self.emitter.opaque_struct(&canonical);
        self.ctx.symbols.declare_object(ObjectDesc::new(canonical_name, ty));
        self.ctx.templates.record_instance(name, args.to_vec(), ty);
        tracing::debug!(%canonical, "instantiating");

        match &blueprint.body {
            BlueprintBody::DynArray => match args.first() {
                Some(&elem) => self.build_dynarray(ty, elem),
                None => self.set_fatal(InternalError::MissingBlueprint { name: canonical }),
            },
            BlueprintBody::Declared { .. } => self.instantiate_declared(ty, &blueprint, args, span),
        }
        Some(ty)
    }

    fn instantiate_declared(&mut self, ty: TypeId, blueprint: &Blueprint, args: &[TypeId], span: Span) {
        let BlueprintBody::Declared {
            ast,
            members,
            methods,
        } = &blueprint.body
        else {
            return;
        };
        let mut shadowed = Vec::with_capacity(args.len());
        for (&param, &arg) in blueprint.params.iter().zip(args) {
            shadowed.push((param, self.ctx.symbols.bind_placeholder(param, arg)));
        }
        let here = self.emitter.current_block();

        let result = {
            let mut nested = Lowerer::for_blueprint(&mut *self.ctx, ast, self.interner, &mut *self.emitter);
            nested.define_layout(ty, members, span);
            nested.declare_methods(ty, methods);
            nested.define_methods(methods);
            nested.finish()
        };

        for (param, hidden) in shadowed.into_iter().rev() {
            self.ctx.symbols.unbind_placeholder(param, hidden);
        }
        match here {
            Some(bb) => self.emitter.position_at_end(bb),
            None => self.emitter.clear_position(),
        }
        if let Err(error) = result {
            self.set_fatal(error);
        }
    }
}
