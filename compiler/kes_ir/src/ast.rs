//! Flat AST arena.
//!
//! Every node lives in [`Ast::nodes`] and refers to its children by
//! [`NodeId`]. Variable-length child lists (call arguments, block
//! statements, logical terms) are stored contiguously in [`Ast::lists`]
//! and referenced by [`NodeRange`]. Optional children use
//! [`NodeId::INVALID`].
//!
//! The tree is produced by a parser (or by [`AstBuilder`](crate::AstBuilder)
//! in tests); lowering trusts its shape and never re-validates it.

use crate::{BinaryOp, LogicalOp, Name, NodeId, NodeRange, Span, TypeExpr, UnaryOp};

/// A single AST node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// A formal parameter: `int x`, `Node& n`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: Name,
    pub ty: TypeExpr,
}

/// `name = init` inside a variable declaration. `init` may be invalid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarInit {
    pub name: Name,
    pub init: NodeId,
}

/// `catch (T name) { ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    pub ty: TypeExpr,
    pub binding: Name,
    pub body: NodeId,
}

/// `case value: body`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchCase {
    pub value: NodeId,
    pub body: NodeId,
}

/// A data member of an object or template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberDecl {
    pub name: Name,
    pub ty: TypeExpr,
}

/// A free function or method.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Name,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    /// Block node; invalid for a bodiless declaration.
    pub body: NodeId,
}

/// A constructor inside an object or template body.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub body: NodeId,
}

/// `object Name { members; methods }`
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDecl {
    pub name: Name,
    pub members: Vec<MemberDecl>,
    /// `Function`, `Constructor` and `Operator` nodes.
    pub methods: NodeRange,
}

/// `template<T, U> object Name { ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateDecl {
    pub name: Name,
    pub params: Vec<Name>,
    pub members: Vec<MemberDecl>,
    pub methods: NodeRange,
}

/// `operator (lhs) symbol (rhs) -> ret { body }`.
///
/// `lhs` absent means a prefix operator; `rhs` absent means the operator
/// takes only its left operand (`as`, `delete`).
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorDecl {
    pub lhs: Option<Param>,
    pub symbol: crate::OpSymbol,
    pub rhs: Option<Param>,
    pub ret: TypeExpr,
    pub body: NodeId,
}

/// Node kinds: expressions, statements and declarations in one closed enum.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // Literals
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    CharLit(u8),
    StrLit(Name),
    Null,

    // Expressions
    Ident(Name),
    This,
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// `a && b && c`: at least two terms.
    Logical {
        op: LogicalOp,
        terms: NodeRange,
    },
    /// `a < b <= c`: every adjacent pair is compared, short-circuiting.
    Comparison {
        first: NodeId,
        rest: Vec<(BinaryOp, NodeId)>,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        op: Option<BinaryOp>,
        target: NodeId,
        value: NodeId,
    },
    Call {
        callee: Name,
        args: NodeRange,
    },
    MethodCall {
        receiver: NodeId,
        method: Name,
        args: NodeRange,
    },
    Member {
        object: NodeId,
        member: Name,
    },
    Index {
        object: NodeId,
        index: NodeId,
    },
    Cast {
        expr: NodeId,
        ty: TypeExpr,
    },
    /// `T(args)` on the stack, or `new T(args)` on the heap.
    Construct {
        ty: TypeExpr,
        args: NodeRange,
        heap: bool,
    },
    Delete(NodeId),
    SizeOf(TypeExpr),
    /// `expr!`
    DebugPrint(NodeId),
    Print(NodeRange),
    Asm(Name),
    Throw(NodeId),
    Try {
        body: NodeId,
        catches: Vec<CatchClause>,
    },

    // Statements
    VarDecl {
        ty: TypeExpr,
        vars: Vec<VarInit>,
    },
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    For {
        init: NodeId,
        cond: NodeId,
        step: NodeId,
        body: NodeId,
    },
    Switch {
        scrutinee: NodeId,
        cases: Vec<SwitchCase>,
        default: NodeId,
        auto_break: bool,
    },
    Break,
    Continue,
    Return(NodeId),
    Block(NodeRange),

    // Declarations
    Function(FunctionDecl),
    Constructor(ConstructorDecl),
    Object(ObjectDecl),
    Template(TemplateDecl),
    Operator(OperatorDecl),
    Module(NodeRange),
}

impl NodeKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::IntLit(_) => "int",
            NodeKind::FloatLit(_) => "float",
            NodeKind::BoolLit(_) => "bool",
            NodeKind::CharLit(_) => "char",
            NodeKind::StrLit(_) => "string",
            NodeKind::Null => "null",
            NodeKind::Ident(_) => "ident",
            NodeKind::This => "this",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Logical { .. } => "logical",
            NodeKind::Comparison { .. } => "comparison",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Assign { .. } => "assign",
            NodeKind::Call { .. } => "call",
            NodeKind::MethodCall { .. } => "method_call",
            NodeKind::Member { .. } => "member",
            NodeKind::Index { .. } => "index",
            NodeKind::Cast { .. } => "cast",
            NodeKind::Construct { .. } => "construct",
            NodeKind::Delete(_) => "delete",
            NodeKind::SizeOf(_) => "sizeof",
            NodeKind::DebugPrint(_) => "debug_print",
            NodeKind::Print(_) => "print",
            NodeKind::Asm(_) => "asm",
            NodeKind::Throw(_) => "throw",
            NodeKind::Try { .. } => "try",
            NodeKind::VarDecl { .. } => "var_decl",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::For { .. } => "for",
            NodeKind::Switch { .. } => "switch",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Return(_) => "return",
            NodeKind::Block(_) => "block",
            NodeKind::Function(_) => "function",
            NodeKind::Constructor(_) => "constructor",
            NodeKind::Object(_) => "object",
            NodeKind::Template(_) => "template",
            NodeKind::Operator(_) => "operator",
            NodeKind::Module(_) => "module",
        }
    }
}

/// Node arena.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    lists: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, returning its id.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId::new(to_u32(self.nodes.len()));
        self.nodes.push(Node { kind, span });
        id
    }

    /// Store a list of child ids, returning its range.
    pub fn alloc_list(&mut self, ids: impl IntoIterator<Item = NodeId>) -> NodeRange {
        let start = to_u32(self.lists.len());
        self.lists.extend(ids);
        NodeRange::new(start, to_u32(self.lists.len()) - start)
    }

    /// Get a node by id.
    ///
    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Get a node by id, or `None` for [`NodeId::INVALID`].
    #[inline]
    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    /// Get the ids in a range.
    #[inline]
    pub fn list(&self, range: NodeRange) -> &[NodeId] {
        let start = range.start as usize;
        &self.lists[start..start + range.len()]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or_else(|_| panic!("AST exceeded {} entries", u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_list() {
        let mut ast = Ast::new();
        let a = ast.alloc(NodeKind::IntLit(1), Span::at_line(1));
        let b = ast.alloc(NodeKind::IntLit(2), Span::at_line(1));
        let range = ast.alloc_list([a, b]);
        let block = ast.alloc(NodeKind::Block(range), Span::DUMMY);

        assert_eq!(ast.list(range), &[a, b]);
        assert_eq!(ast.get(block).kind.label(), "block");
        assert_eq!(ast.len(), 3);
        assert!(ast.try_get(NodeId::INVALID).is_none());
    }

    #[test]
    fn empty_list() {
        let mut ast = Ast::new();
        let range = ast.alloc_list([]);
        assert!(range.is_empty());
        assert!(ast.list(range).is_empty());
    }
}
