//! Syntax tree for one parsed module.
//!
//! Nodes keep the byte span and line/column selection of every identifier so
//! the declaration-graph builder can record positions without re-lexing.

use vbatool_core::graph::{Accessibility, ProcedureKind};
use vbatool_core::{Selection, Span};

/// An identifier occurrence with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
    pub selection: Selection,
}

/// A possibly-qualified type reference (`Class1` or `OtherProject.Class1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub segments: Vec<Ident>,
}

impl TypeRef {
    /// The unqualified type name (last segment).
    pub fn name(&self) -> &Ident {
        self.segments.last().expect("type ref has at least one segment")
    }

    /// The qualifier (project or module name), if present.
    pub fn qualifier(&self) -> Option<&Ident> {
        if self.segments.len() > 1 {
            self.segments.first()
        } else {
            None
        }
    }

    /// Selection covering the whole reference.
    pub fn selection(&self) -> Selection {
        let first = self.segments.first().expect("non-empty type ref");
        let last = self.segments.last().expect("non-empty type ref");
        first.selection.extended_to(last.selection)
    }
}

/// A source annotation comment (`'@Ignore ConstantNotUsed`).
///
/// `target_line` is the start line of the statement the annotation precedes,
/// when there is one; `'@IgnoreModule` annotations apply module-wide
/// regardless of placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<String>,
    pub selection: Selection,
    pub target_line: Option<u32>,
}

/// A parsed module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleTree {
    /// `Implements` declarations, in source order.
    pub implements: Vec<TypeRef>,
    /// Module-level items, in source order.
    pub items: Vec<ModuleItem>,
    /// All annotations found in the module.
    pub annotations: Vec<Annotation>,
}

/// A module-level item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleItem {
    Variables(VariableGroup),
    Constants(ConstGroup),
    Procedure(Procedure),
    UserType(UserTypeDef),
    Enum(EnumDef),
}

/// One `Dim`/`Private`/`Public` statement declaring one or more variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableGroup {
    pub accessibility: Option<Accessibility>,
    pub vars: Vec<VarDecl>,
}

/// A single declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: Ident,
    pub type_name: Option<TypeRef>,
    pub is_array: bool,
    /// `Dim x As New Class1`
    pub is_new: bool,
}

/// One `Const` statement declaring one or more constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstGroup {
    pub accessibility: Option<Accessibility>,
    pub consts: Vec<ConstDecl>,
}

/// A single declared constant with its value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstDecl {
    pub name: Ident,
    pub type_name: Option<TypeRef>,
    pub value: Expression,
}

/// A procedure definition with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    pub accessibility: Option<Accessibility>,
    pub kind: ProcedureKind,
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    pub body: Vec<Statement>,
    /// Selection covering the whole definition (signature through `End`).
    pub extent: Selection,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Ident,
    pub optional: bool,
    pub param_array: bool,
    pub by_val: bool,
    pub type_name: Option<TypeRef>,
    pub default: Option<Expression>,
}

/// A user-defined type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeDef {
    pub accessibility: Option<Accessibility>,
    pub name: Ident,
    pub members: Vec<UserTypeMember>,
    pub extent: Selection,
}

/// A member of a user-defined type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeMember {
    pub name: Ident,
    pub type_name: Option<TypeRef>,
}

/// An enumeration definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub accessibility: Option<Accessibility>,
    pub name: Ident,
    pub members: Vec<EnumMember>,
    pub extent: Selection,
}

/// A member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: Ident,
    pub value: Option<Expression>,
}

/// A statement in a procedure body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Local `Dim`/`Static` declaration.
    Variables(VariableGroup),
    /// Local `Const` declaration.
    Constants(ConstGroup),
    /// `target = value` or `Set target = value`.
    Assign {
        target: Expression,
        value: Expression,
        is_set: bool,
    },
    /// A call statement: `Foo arg1, arg2` or `Call Foo(arg1)`.
    Call {
        callee: Expression,
        args: Vec<Expression>,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_ifs: Vec<(Expression, Vec<Statement>)>,
        else_body: Option<Vec<Statement>>,
    },
    For {
        counter: Expression,
        from: Expression,
        to: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
    },
    ForEach {
        element: Expression,
        collection: Expression,
        body: Vec<Statement>,
    },
    DoLoop {
        condition: Option<Expression>,
        body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Exit,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i64),
    Float(String),
    String(String),
    Bool(bool),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Is,
    Concat,
    Add,
    Sub,
    Mod,
    IntDiv,
    Mul,
    Div,
    Pow,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A bare identifier.
    Name(Ident),
    /// Member access: `base.name`.
    Member { base: Box<Expression>, name: Ident },
    /// Call or index: `callee(args)`.
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        span: Span,
    },
    /// `New TypeRef`.
    New { type_ref: TypeRef, span: Span },
    /// The `Nothing` literal.
    Nothing { span: Span },
    Literal {
        literal: Literal,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    Paren(Box<Expression>),
    /// An omitted argument in a call (`Foo , x`).
    Missing { span: Span },
}

impl Expression {
    /// Byte span covered by this expression.
    pub fn span(&self) -> Span {
        match self {
            Expression::Name(ident) => ident.span,
            Expression::Member { base, name } => Span::new(base.span().start, name.span.end),
            Expression::Call { span, .. } => *span,
            Expression::New { span, .. } => *span,
            Expression::Nothing { span } => *span,
            Expression::Literal { span, .. } => *span,
            Expression::Binary { lhs, rhs, .. } => {
                Span::new(lhs.span().start, rhs.span().end)
            }
            Expression::Unary { expr, .. } => expr.span(),
            Expression::Paren(inner) => inner.span(),
            Expression::Missing { span } => *span,
        }
    }

    /// Whether this expression is an omitted argument.
    pub fn is_missing(&self) -> bool {
        matches!(self, Expression::Missing { .. })
    }
}
