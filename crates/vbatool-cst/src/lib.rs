//! Lexer, parser, and syntax tree for VBA-style module sources.
//!
//! The parser is line-oriented recursive descent over a logos token stream.
//! Every name-introducing or name-using node carries both its byte [`Span`]
//! and its 1-indexed line/column [`Selection`], so downstream consumers never
//! rescan source text.
//!
//! [`Span`]: vbatool_core::Span
//! [`Selection`]: vbatool_core::Selection

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{
    Annotation, BinaryOp, ConstDecl, ConstGroup, EnumDef, EnumMember, Expression, Ident, Literal,
    ModuleItem, ModuleTree, Param, Procedure, Statement, TypeRef, UnaryOp, UserTypeDef,
    UserTypeMember, VarDecl, VariableGroup,
};
pub use parser::{parse_module, ParseError};
