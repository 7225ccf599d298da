//! Convenience construction API for [`Ast`].
//!
//! A parser drives the same calls; tests use it directly to build
//! programs without source text. Every node is stamped with the current
//! line, set via [`AstBuilder::at_line`].

use crate::ast::{
    CatchClause, ConstructorDecl, FunctionDecl, MemberDecl, ObjectDecl, OperatorDecl, Param,
    SwitchCase, TemplateDecl, VarInit,
};
use crate::{
    Ast, BinaryOp, LogicalOp, Name, NodeId, NodeKind, OpSymbol, Span, StringInterner, TypeExpr,
    UnaryOp,
};

/// Builds an [`Ast`] node by node.
pub struct AstBuilder<'a> {
    ast: Ast,
    interner: &'a StringInterner,
    line: u32,
}

impl<'a> AstBuilder<'a> {
    pub fn new(interner: &'a StringInterner) -> Self {
        AstBuilder {
            ast: Ast::new(),
            interner,
            line: 1,
        }
    }

    /// Set the source line for subsequently built nodes.
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Consume the builder, returning the arena.
    pub fn finish(self) -> Ast {
        self.ast
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn node(&mut self, kind: NodeKind) -> NodeId {
        self.ast.alloc(kind, Span::at_line(self.line))
    }

    // Types

    pub fn ty_named(&self, name: &str) -> TypeExpr {
        TypeExpr::Named(self.name(name))
    }

    pub fn ty_generic(&self, name: &str, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Generic {
            name: self.name(name),
            args,
        }
    }

    pub fn param(&self, name: &str, ty: TypeExpr) -> Param {
        Param {
            name: self.name(name),
            ty,
        }
    }

    pub fn member_decl(&self, name: &str, ty: TypeExpr) -> MemberDecl {
        MemberDecl {
            name: self.name(name),
            ty,
        }
    }

    // Literals

    pub fn int(&mut self, value: i64) -> NodeId {
        self.node(NodeKind::IntLit(value))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.node(NodeKind::FloatLit(value))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.node(NodeKind::BoolLit(value))
    }

    pub fn char_lit(&mut self, value: u8) -> NodeId {
        self.node(NodeKind::CharLit(value))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        let name = self.name(value);
        self.node(NodeKind::StrLit(name))
    }

    pub fn null(&mut self) -> NodeId {
        self.node(NodeKind::Null)
    }

    // Expressions

    pub fn ident(&mut self, name: &str) -> NodeId {
        let name = self.name(name);
        self.node(NodeKind::Ident(name))
    }

    pub fn this(&mut self) -> NodeId {
        self.node(NodeKind::This)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.node(NodeKind::Binary { op, lhs, rhs })
    }

    pub fn logical(&mut self, op: LogicalOp, terms: &[NodeId]) -> NodeId {
        let terms = self.ast.alloc_list(terms.iter().copied());
        self.node(NodeKind::Logical { op, terms })
    }

    pub fn and(&mut self, terms: &[NodeId]) -> NodeId {
        self.logical(LogicalOp::And, terms)
    }

    pub fn or(&mut self, terms: &[NodeId]) -> NodeId {
        self.logical(LogicalOp::Or, terms)
    }

    pub fn compare(&mut self, first: NodeId, rest: Vec<(BinaryOp, NodeId)>) -> NodeId {
        self.node(NodeKind::Comparison { first, rest })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.node(NodeKind::Unary { op, operand })
    }

    pub fn address_of(&mut self, operand: NodeId) -> NodeId {
        self.unary(UnaryOp::AddressOf, operand)
    }

    pub fn deref(&mut self, operand: NodeId) -> NodeId {
        self.unary(UnaryOp::Deref, operand)
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.node(NodeKind::Assign {
            op: None,
            target,
            value,
        })
    }

    pub fn compound_assign(&mut self, op: BinaryOp, target: NodeId, value: NodeId) -> NodeId {
        self.node(NodeKind::Assign {
            op: Some(op),
            target,
            value,
        })
    }

    pub fn call(&mut self, callee: &str, args: &[NodeId]) -> NodeId {
        let callee = self.name(callee);
        let args = self.ast.alloc_list(args.iter().copied());
        self.node(NodeKind::Call { callee, args })
    }

    pub fn method_call(&mut self, receiver: NodeId, method: &str, args: &[NodeId]) -> NodeId {
        let method = self.name(method);
        let args = self.ast.alloc_list(args.iter().copied());
        self.node(NodeKind::MethodCall {
            receiver,
            method,
            args,
        })
    }

    pub fn member(&mut self, object: NodeId, member: &str) -> NodeId {
        let member = self.name(member);
        self.node(NodeKind::Member { object, member })
    }

    pub fn index(&mut self, object: NodeId, index: NodeId) -> NodeId {
        self.node(NodeKind::Index { object, index })
    }

    pub fn cast(&mut self, expr: NodeId, ty: TypeExpr) -> NodeId {
        self.node(NodeKind::Cast { expr, ty })
    }

    pub fn construct(&mut self, ty: TypeExpr, args: &[NodeId]) -> NodeId {
        let args = self.ast.alloc_list(args.iter().copied());
        self.node(NodeKind::Construct {
            ty,
            args,
            heap: false,
        })
    }

    pub fn new_object(&mut self, ty: TypeExpr, args: &[NodeId]) -> NodeId {
        let args = self.ast.alloc_list(args.iter().copied());
        self.node(NodeKind::Construct {
            ty,
            args,
            heap: true,
        })
    }

    pub fn delete(&mut self, operand: NodeId) -> NodeId {
        self.node(NodeKind::Delete(operand))
    }

    pub fn size_of(&mut self, ty: TypeExpr) -> NodeId {
        self.node(NodeKind::SizeOf(ty))
    }

    pub fn debug_print(&mut self, expr: NodeId) -> NodeId {
        self.node(NodeKind::DebugPrint(expr))
    }

    pub fn print(&mut self, args: &[NodeId]) -> NodeId {
        let args = self.ast.alloc_list(args.iter().copied());
        self.node(NodeKind::Print(args))
    }

    pub fn asm(&mut self, text: &str) -> NodeId {
        let text = self.name(text);
        self.node(NodeKind::Asm(text))
    }

    pub fn throw(&mut self, value: NodeId) -> NodeId {
        self.node(NodeKind::Throw(value))
    }

    pub fn catch(&self, ty: TypeExpr, binding: &str, body: NodeId) -> CatchClause {
        CatchClause {
            ty,
            binding: self.name(binding),
            body,
        }
    }

    pub fn try_catch(&mut self, body: NodeId, catches: Vec<CatchClause>) -> NodeId {
        self.node(NodeKind::Try { body, catches })
    }

    // Statements

    pub fn var(&mut self, ty: TypeExpr, name: &str, init: Option<NodeId>) -> NodeId {
        let var = VarInit {
            name: self.name(name),
            init: init.unwrap_or(NodeId::INVALID),
        };
        self.node(NodeKind::VarDecl {
            ty,
            vars: vec![var],
        })
    }

    /// `T a = x, b = y;`
    pub fn vars(&mut self, ty: TypeExpr, vars: &[(&str, Option<NodeId>)]) -> NodeId {
        let vars = vars
            .iter()
            .map(|(name, init)| VarInit {
                name: self.name(name),
                init: init.unwrap_or(NodeId::INVALID),
            })
            .collect();
        self.node(NodeKind::VarDecl { ty, vars })
    }

    pub fn if_(&mut self, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) -> NodeId {
        self.node(NodeKind::If {
            cond,
            then_branch,
            else_branch: else_branch.unwrap_or(NodeId::INVALID),
        })
    }

    pub fn while_(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.node(NodeKind::While { cond, body })
    }

    pub fn for_(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.node(NodeKind::For {
            init: init.unwrap_or(NodeId::INVALID),
            cond: cond.unwrap_or(NodeId::INVALID),
            step: step.unwrap_or(NodeId::INVALID),
            body,
        })
    }

    pub fn switch(
        &mut self,
        scrutinee: NodeId,
        cases: &[(NodeId, NodeId)],
        default: Option<NodeId>,
        auto_break: bool,
    ) -> NodeId {
        let cases = cases
            .iter()
            .map(|&(value, body)| SwitchCase { value, body })
            .collect();
        self.node(NodeKind::Switch {
            scrutinee,
            cases,
            default: default.unwrap_or(NodeId::INVALID),
            auto_break,
        })
    }

    pub fn break_(&mut self) -> NodeId {
        self.node(NodeKind::Break)
    }

    pub fn continue_(&mut self) -> NodeId {
        self.node(NodeKind::Continue)
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Return(value.unwrap_or(NodeId::INVALID)))
    }

    pub fn block(&mut self, stmts: &[NodeId]) -> NodeId {
        let stmts = self.ast.alloc_list(stmts.iter().copied());
        self.node(NodeKind::Block(stmts))
    }

    // Declarations

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<Param>,
        ret: TypeExpr,
        body: &[NodeId],
    ) -> NodeId {
        let body = self.block(body);
        let name = self.name(name);
        self.node(NodeKind::Function(FunctionDecl {
            name,
            params,
            ret,
            body,
        }))
    }

    pub fn constructor(&mut self, params: Vec<Param>, body: &[NodeId]) -> NodeId {
        let body = self.block(body);
        self.node(NodeKind::Constructor(ConstructorDecl { params, body }))
    }

    pub fn object(&mut self, name: &str, members: Vec<MemberDecl>, methods: &[NodeId]) -> NodeId {
        let name = self.name(name);
        let methods = self.ast.alloc_list(methods.iter().copied());
        self.node(NodeKind::Object(ObjectDecl {
            name,
            members,
            methods,
        }))
    }

    pub fn template(
        &mut self,
        name: &str,
        params: &[&str],
        members: Vec<MemberDecl>,
        methods: &[NodeId],
    ) -> NodeId {
        let name = self.name(name);
        let params = params.iter().map(|p| self.name(p)).collect();
        let methods = self.ast.alloc_list(methods.iter().copied());
        self.node(NodeKind::Template(TemplateDecl {
            name,
            params,
            members,
            methods,
        }))
    }

    pub fn operator(
        &mut self,
        lhs: Option<Param>,
        symbol: OpSymbol,
        rhs: Option<Param>,
        ret: TypeExpr,
        body: &[NodeId],
    ) -> NodeId {
        let body = self.block(body);
        self.node(NodeKind::Operator(OperatorDecl {
            lhs,
            symbol,
            rhs,
            ret,
            body,
        }))
    }

    pub fn module(&mut self, items: &[NodeId]) -> NodeId {
        let items = self.ast.alloc_list(items.iter().copied());
        self.node(NodeKind::Module(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_function_with_body_block() {
        let interner = StringInterner::new();
        let mut b = AstBuilder::new(&interner);
        b.at_line(3);
        let five = b.int(5);
        let ret = b.ret(Some(five));
        let f = b.function("main", vec![], TypeExpr::int(), &[ret]);
        let ast = b.finish();

        let NodeKind::Function(decl) = &ast.get(f).kind else {
            panic!("expected function");
        };
        assert_eq!(interner.lookup(decl.name), "main");
        assert_eq!(ast.get(f).span.line, 3);
        let NodeKind::Block(stmts) = ast.get(decl.body).kind else {
            panic!("expected block body");
        };
        assert_eq!(ast.list(stmts), &[ret]);
    }

    #[test]
    fn optional_children_default_to_invalid() {
        let interner = StringInterner::new();
        let mut b = AstBuilder::new(&interner);
        let cond = b.boolean(true);
        let body = b.block(&[]);
        let node = b.if_(cond, body, None);
        let ast = b.finish();
        let NodeKind::If { else_branch, .. } = ast.get(node).kind else {
            panic!("expected if");
        };
        assert!(!else_branch.is_valid());
    }
}
