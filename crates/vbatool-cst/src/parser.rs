//! Line-oriented recursive-descent parser.
//!
//! Produces a [`ModuleTree`] per module, or a [`ParseError`] carrying the
//! offending selection. A parse error never panics; the caller isolates it
//! to the failing module.

use thiserror::Error;

use vbatool_core::graph::{Accessibility, ProcedureKind};
use vbatool_core::text::LineIndex;
use vbatool_core::{Selection, Span};

use crate::ast::{
    Annotation, BinaryOp, ConstDecl, ConstGroup, EnumDef, EnumMember, Expression, Ident, Literal,
    ModuleItem, ModuleTree, Param, Procedure, Statement, TypeRef, UnaryOp, UserTypeDef,
    UserTypeMember, VarDecl, VariableGroup,
};
use crate::lexer::{tokenize, Tok, Token};

/// A grammar failure in one module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{selection}: {message}")]
pub struct ParseError {
    pub message: String,
    pub selection: Selection,
}

/// Parse one module's source text into a syntax tree.
pub fn parse_module(source: &str) -> Result<ModuleTree, ParseError> {
    let index = LineIndex::new(source);
    let tokens = tokenize(source).map_err(|span| ParseError {
        message: "unrecognized character".to_string(),
        selection: index.selection(span),
    })?;
    Parser {
        tokens,
        pos: 0,
        index,
        tree: ModuleTree::default(),
        pending: Vec::new(),
    }
    .parse()
}

/// Which block construct a statement list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockCtx {
    Procedure,
    If,
    For,
    Do,
    While,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    index: LineIndex,
    tree: ModuleTree,
    /// Indices of annotations awaiting a target statement.
    pending: Vec<usize>,
}

// Binary operators by precedence level, loosest first. The empty level is
// where prefix `Not` binds.
const LEVELS: &[&[(Tok, BinaryOp)]] = &[
    &[(Tok::Or, BinaryOp::Or)],
    &[(Tok::And, BinaryOp::And)],
    &[],
    &[
        (Tok::Eq, BinaryOp::Eq),
        (Tok::Neq, BinaryOp::Neq),
        (Tok::Lt, BinaryOp::Lt),
        (Tok::Gt, BinaryOp::Gt),
        (Tok::Le, BinaryOp::Le),
        (Tok::Ge, BinaryOp::Ge),
        (Tok::Is, BinaryOp::Is),
    ],
    &[(Tok::Amp, BinaryOp::Concat)],
    &[(Tok::Plus, BinaryOp::Add), (Tok::Minus, BinaryOp::Sub)],
    &[(Tok::Mod, BinaryOp::Mod)],
    &[(Tok::Backslash, BinaryOp::IntDiv)],
    &[(Tok::Star, BinaryOp::Mul), (Tok::Slash, BinaryOp::Div)],
    &[(Tok::Caret, BinaryOp::Pow)],
];

const NOT_LEVEL: usize = 2;

impl Parser {
    // ========================================================================
    // Token plumbing
    // ========================================================================

    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn at(&self, kind: Tok) -> bool {
        self.peek() == Some(kind)
    }

    fn current_selection(&self) -> Selection {
        match self.tokens.get(self.pos) {
            Some(token) => self.index.selection(token.span),
            None => self
                .tokens
                .last()
                .map(|token| self.index.selection(token.span))
                .unwrap_or_default(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            selection: self.current_selection(),
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of module"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: Tok, what: &str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(found) if found == kind => self.next_token(),
            Some(found) => Err(self.error(format!("expected {what}, found {found:?}"))),
            None => Err(self.error(format!("expected {what}, found end of module"))),
        }
    }

    fn ident(&mut self) -> Result<Ident, ParseError> {
        let token = self.expect(Tok::Ident, "identifier")?;
        let name = token
            .text
            .trim_end_matches(|c| "$%&!#".contains(c))
            .to_string();
        Ok(Ident {
            name,
            span: token.span,
            selection: self.index.selection(token.span),
        })
    }

    /// Consume newlines, `:` separators, and comments; record annotations.
    fn skip_terminators(&mut self) {
        loop {
            match self.peek() {
                Some(Tok::Newline) | Some(Tok::StatementSep) => {
                    self.pos += 1;
                }
                Some(Tok::Comment) => self.handle_comment(),
                _ => break,
            }
        }
    }

    /// Consume the rest of the current logical line.
    fn skip_line(&mut self) {
        while let Some(kind) = self.peek() {
            if kind == Tok::Newline {
                break;
            }
            self.pos += 1;
        }
    }

    fn handle_comment(&mut self) {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        let body = token.text.trim_start_matches('\'').trim_start();
        let Some(rest) = body.strip_prefix('@') else {
            return;
        };
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            return;
        }
        let args: Vec<String> = rest[name.len()..]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let idx = self.tree.annotations.len();
        self.tree.annotations.push(Annotation {
            name,
            args,
            selection: self.index.selection(token.span),
            target_line: None,
        });
        self.pending.push(idx);
    }

    /// Attach pending annotations to the statement starting at the current
    /// token.
    fn attach_pending(&mut self) {
        if let Some(token) = self.tokens.get(self.pos) {
            let line = self.index.selection(token.span).start_line;
            for idx in self.pending.drain(..) {
                self.tree.annotations[idx].target_line = Some(line);
            }
        }
    }

    // ========================================================================
    // Module level
    // ========================================================================

    fn parse(mut self) -> Result<ModuleTree, ParseError> {
        self.skip_terminators();
        while self.pos < self.tokens.len() {
            self.parse_module_item()?;
            self.skip_terminators();
        }
        Ok(self.tree)
    }

    fn parse_module_item(&mut self) -> Result<(), ParseError> {
        self.attach_pending();
        match self.peek() {
            Some(Tok::Option) => {
                self.skip_line();
                Ok(())
            }
            Some(Tok::Ident) => {
                let text = &self.tokens[self.pos].text;
                if text.eq_ignore_ascii_case("attribute") || text.eq_ignore_ascii_case("version") {
                    self.skip_line();
                    Ok(())
                } else {
                    Err(self.error(format!("unexpected '{text}' at module level")))
                }
            }
            Some(Tok::Implements) => {
                self.pos += 1;
                let type_ref = self.parse_type_ref()?;
                self.tree.implements.push(type_ref);
                Ok(())
            }
            Some(Tok::Public) | Some(Tok::Private) | Some(Tok::Friend) | Some(Tok::Global) => {
                let access = self.parse_accessibility();
                match self.peek() {
                    Some(Tok::Sub) | Some(Tok::Function) | Some(Tok::Property) => {
                        let procedure = self.parse_procedure(Some(access))?;
                        self.tree.items.push(ModuleItem::Procedure(procedure));
                        Ok(())
                    }
                    Some(Tok::Const) => {
                        let group = self.parse_const_group(Some(access))?;
                        self.tree.items.push(ModuleItem::Constants(group));
                        Ok(())
                    }
                    Some(Tok::Type) => {
                        let udt = self.parse_user_type(Some(access))?;
                        self.tree.items.push(ModuleItem::UserType(udt));
                        Ok(())
                    }
                    Some(Tok::Enum) => {
                        let def = self.parse_enum(Some(access))?;
                        self.tree.items.push(ModuleItem::Enum(def));
                        Ok(())
                    }
                    Some(Tok::Ident) => {
                        let group = self.parse_variable_list(Some(access))?;
                        self.tree.items.push(ModuleItem::Variables(group));
                        Ok(())
                    }
                    _ => Err(self.error("expected declaration after access modifier")),
                }
            }
            Some(Tok::Dim) => {
                self.pos += 1;
                let group = self.parse_variable_list(None)?;
                self.tree.items.push(ModuleItem::Variables(group));
                Ok(())
            }
            Some(Tok::Const) => {
                let group = self.parse_const_group(None)?;
                self.tree.items.push(ModuleItem::Constants(group));
                Ok(())
            }
            Some(Tok::Sub) | Some(Tok::Function) | Some(Tok::Property) => {
                let procedure = self.parse_procedure(None)?;
                self.tree.items.push(ModuleItem::Procedure(procedure));
                Ok(())
            }
            Some(Tok::Type) => {
                let udt = self.parse_user_type(None)?;
                self.tree.items.push(ModuleItem::UserType(udt));
                Ok(())
            }
            Some(Tok::Enum) => {
                let def = self.parse_enum(None)?;
                self.tree.items.push(ModuleItem::Enum(def));
                Ok(())
            }
            Some(found) => Err(self.error(format!("unexpected {found:?} at module level"))),
            None => Ok(()),
        }
    }

    fn parse_accessibility(&mut self) -> Accessibility {
        let access = match self.peek() {
            Some(Tok::Public) | Some(Tok::Global) => Accessibility::Public,
            Some(Tok::Private) => Accessibility::Private,
            Some(Tok::Friend) => Accessibility::Friend,
            _ => Accessibility::Implicit,
        };
        self.pos += 1;
        access
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Parse `name [()] [As [New] Type], ...` — caller has consumed the
    /// introducing keyword (`Dim`, `Static`, access modifier).
    fn parse_variable_list(
        &mut self,
        accessibility: Option<Accessibility>,
    ) -> Result<VariableGroup, ParseError> {
        let mut vars = Vec::new();
        loop {
            let name = self.ident()?;
            let mut is_array = false;
            if self.at(Tok::LParen) {
                self.pos += 1;
                self.skip_array_dimensions()?;
                is_array = true;
            }
            let mut is_new = false;
            let mut type_name = None;
            if self.at(Tok::As) {
                self.pos += 1;
                if self.at(Tok::New) {
                    self.pos += 1;
                    is_new = true;
                }
                type_name = Some(self.parse_type_ref()?);
            }
            vars.push(VarDecl {
                name,
                type_name,
                is_array,
                is_new,
            });
            if self.at(Tok::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(VariableGroup {
            accessibility,
            vars,
        })
    }

    fn skip_array_dimensions(&mut self) -> Result<(), ParseError> {
        while !self.at(Tok::RParen) {
            match self.peek() {
                Some(Tok::IntLit) | Some(Tok::To) | Some(Tok::Comma) => self.pos += 1,
                _ => return Err(self.error("expected array bounds")),
            }
        }
        self.pos += 1;
        Ok(())
    }

    /// Parse `Const name [As Type] = expr, ...` — expects the `Const` keyword.
    fn parse_const_group(
        &mut self,
        accessibility: Option<Accessibility>,
    ) -> Result<ConstGroup, ParseError> {
        self.expect(Tok::Const, "'Const'")?;
        let mut consts = Vec::new();
        loop {
            let name = self.ident()?;
            let type_name = if self.at(Tok::As) {
                self.pos += 1;
                Some(self.parse_type_ref()?)
            } else {
                None
            };
            self.expect(Tok::Eq, "'=' in constant declaration")?;
            let value = self.parse_expression()?;
            consts.push(ConstDecl {
                name,
                type_name,
                value,
            });
            if self.at(Tok::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(ConstGroup {
            accessibility,
            consts,
        })
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let mut segments = vec![self.ident()?];
        while self.at(Tok::Dot) {
            self.pos += 1;
            segments.push(self.ident()?);
        }
        Ok(TypeRef { segments })
    }

    fn parse_user_type(
        &mut self,
        accessibility: Option<Accessibility>,
    ) -> Result<UserTypeDef, ParseError> {
        let start = self.current_selection();
        self.expect(Tok::Type, "'Type'")?;
        let name = self.ident()?;
        self.skip_terminators();
        let mut members = Vec::new();
        while !self.at(Tok::End) {
            if self.peek().is_none() {
                return Err(self.error("unterminated Type block"));
            }
            let member_name = self.ident()?;
            if self.at(Tok::LParen) {
                self.pos += 1;
                self.skip_array_dimensions()?;
            }
            let type_name = if self.at(Tok::As) {
                self.pos += 1;
                Some(self.parse_type_ref()?)
            } else {
                None
            };
            members.push(UserTypeMember {
                name: member_name,
                type_name,
            });
            self.skip_terminators();
        }
        self.expect(Tok::End, "'End Type'")?;
        let end = self.expect(Tok::Type, "'Type' after 'End'")?;
        Ok(UserTypeDef {
            accessibility,
            name,
            members,
            extent: start.extended_to(self.index.selection(end.span)),
        })
    }

    fn parse_enum(
        &mut self,
        accessibility: Option<Accessibility>,
    ) -> Result<EnumDef, ParseError> {
        let start = self.current_selection();
        self.expect(Tok::Enum, "'Enum'")?;
        let name = self.ident()?;
        self.skip_terminators();
        let mut members = Vec::new();
        while !self.at(Tok::End) {
            if self.peek().is_none() {
                return Err(self.error("unterminated Enum block"));
            }
            let member_name = self.ident()?;
            let value = if self.at(Tok::Eq) {
                self.pos += 1;
                Some(self.parse_expression()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                value,
            });
            self.skip_terminators();
        }
        self.expect(Tok::End, "'End Enum'")?;
        let end = self.expect(Tok::Enum, "'Enum' after 'End'")?;
        Ok(EnumDef {
            accessibility,
            name,
            members,
            extent: start.extended_to(self.index.selection(end.span)),
        })
    }

    // ========================================================================
    // Procedures
    // ========================================================================

    fn parse_procedure(
        &mut self,
        accessibility: Option<Accessibility>,
    ) -> Result<Procedure, ParseError> {
        let start = self.current_selection();
        let kind = match self.next_token()?.kind {
            Tok::Sub => ProcedureKind::Sub,
            Tok::Function => ProcedureKind::Function,
            Tok::Property => match self.next_token()?.kind {
                Tok::Get => ProcedureKind::PropertyGet,
                Tok::Let => ProcedureKind::PropertyLet,
                Tok::Set => ProcedureKind::PropertySet,
                _ => return Err(self.error("expected Get, Let, or Set after 'Property'")),
            },
            _ => return Err(self.error("expected procedure keyword")),
        };
        let name = self.ident()?;

        let mut params = Vec::new();
        if self.at(Tok::LParen) {
            self.pos += 1;
            if !self.at(Tok::RParen) {
                loop {
                    params.push(self.parse_param()?);
                    if self.at(Tok::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
            }
            self.expect(Tok::RParen, "')' after parameter list")?;
        }

        let return_type = if self.at(Tok::As) {
            self.pos += 1;
            Some(self.parse_type_ref()?)
        } else {
            None
        };

        let body = self.parse_statements(BlockCtx::Procedure)?;

        self.expect(Tok::End, "'End' closing the procedure")?;
        let end = match self.peek() {
            Some(Tok::Sub) | Some(Tok::Function) | Some(Tok::Property) => self.next_token()?,
            _ => return Err(self.error("expected Sub, Function, or Property after 'End'")),
        };

        Ok(Procedure {
            accessibility,
            kind,
            name,
            params,
            return_type,
            body,
            extent: start.extended_to(self.index.selection(end.span)),
        })
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let mut optional = false;
        let mut param_array = false;
        let mut by_val = false;
        loop {
            match self.peek() {
                Some(Tok::Optional) => {
                    optional = true;
                    self.pos += 1;
                }
                Some(Tok::ByVal) => {
                    by_val = true;
                    self.pos += 1;
                }
                Some(Tok::ByRef) => {
                    self.pos += 1;
                }
                Some(Tok::ParamArray) => {
                    param_array = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let name = self.ident()?;
        if self.at(Tok::LParen) {
            self.pos += 1;
            self.expect(Tok::RParen, "')' in array parameter")?;
        }
        let type_name = if self.at(Tok::As) {
            self.pos += 1;
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let default = if self.at(Tok::Eq) {
            self.pos += 1;
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Param {
            name,
            optional,
            param_array,
            by_val,
            type_name,
            default,
        })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn at_block_end(&self, ctx: BlockCtx) -> bool {
        match self.peek() {
            Some(Tok::End) => matches!(ctx, BlockCtx::Procedure | BlockCtx::If),
            Some(Tok::Else) | Some(Tok::ElseIf) => ctx == BlockCtx::If,
            Some(Tok::Next) => ctx == BlockCtx::For,
            Some(Tok::Loop) => ctx == BlockCtx::Do,
            Some(Tok::Wend) => ctx == BlockCtx::While,
            None => true,
            _ => false,
        }
    }

    fn parse_statements(&mut self, ctx: BlockCtx) -> Result<Vec<Statement>, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_block_end(ctx) {
                break;
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        self.attach_pending();
        match self.peek() {
            Some(Tok::Dim) | Some(Tok::Static) => {
                self.pos += 1;
                Ok(Statement::Variables(self.parse_variable_list(None)?))
            }
            Some(Tok::Const) => Ok(Statement::Constants(self.parse_const_group(None)?)),
            Some(Tok::Set) => {
                self.pos += 1;
                let target = self.parse_postfix_expression()?;
                self.expect(Tok::Eq, "'=' in Set assignment")?;
                let value = self.parse_expression()?;
                Ok(Statement::Assign {
                    target,
                    value,
                    is_set: true,
                })
            }
            Some(Tok::Call) => {
                self.pos += 1;
                let expr = self.parse_postfix_expression()?;
                Ok(self.call_statement(expr, Vec::new()))
            }
            Some(Tok::If) => self.parse_if(),
            Some(Tok::For) => self.parse_for(),
            Some(Tok::Do) => self.parse_do(),
            Some(Tok::While) => self.parse_while(),
            Some(Tok::Exit) => {
                self.pos += 1;
                if matches!(
                    self.peek(),
                    Some(Tok::Sub)
                        | Some(Tok::Function)
                        | Some(Tok::Property)
                        | Some(Tok::For)
                        | Some(Tok::Do)
                ) {
                    self.pos += 1;
                }
                Ok(Statement::Exit)
            }
            Some(Tok::Ident) => {
                let target = self.parse_postfix_expression()?;
                if self.at(Tok::Eq) {
                    self.pos += 1;
                    let value = self.parse_expression()?;
                    Ok(Statement::Assign {
                        target,
                        value,
                        is_set: false,
                    })
                } else if self.starts_bare_argument() {
                    let args = self.parse_bare_args()?;
                    Ok(self.call_statement(target, args))
                } else {
                    Ok(self.call_statement(target, Vec::new()))
                }
            }
            Some(found) => Err(self.error(format!("unexpected {found:?} in procedure body"))),
            None => Err(self.error("unexpected end of module in procedure body")),
        }
    }

    fn call_statement(&self, expr: Expression, extra_args: Vec<Expression>) -> Statement {
        match expr {
            Expression::Call { callee, mut args, .. } => {
                args.extend(extra_args);
                Statement::Call {
                    callee: *callee,
                    args,
                }
            }
            other => Statement::Call {
                callee: other,
                args: extra_args,
            },
        }
    }

    fn starts_bare_argument(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Ident)
                | Some(Tok::IntLit)
                | Some(Tok::FloatLit)
                | Some(Tok::StringLit)
                | Some(Tok::True)
                | Some(Tok::False)
                | Some(Tok::Nothing)
                | Some(Tok::New)
                | Some(Tok::Not)
                | Some(Tok::Minus)
                | Some(Tok::LParen)
                | Some(Tok::Comma)
        )
    }

    fn parse_bare_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        loop {
            if self.at(Tok::Comma) {
                // Omitted argument slot.
                let span = self.tokens[self.pos].span;
                args.push(Expression::Missing {
                    span: Span::new(span.start, span.start),
                });
                self.pos += 1;
                continue;
            }
            if !self.starts_bare_argument() {
                break;
            }
            args.push(self.parse_expression()?);
            if self.at(Tok::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.expect(Tok::If, "'If'")?;
        let condition = self.parse_expression()?;
        self.expect(Tok::Then, "'Then'")?;

        // Single-line form: `If cond Then statement`
        if !matches!(self.peek(), Some(Tok::Newline) | Some(Tok::Comment) | None) {
            let inline = self.parse_statement()?;
            return Ok(Statement::If {
                condition,
                then_body: vec![inline],
                else_ifs: Vec::new(),
                else_body: None,
            });
        }

        let then_body = self.parse_statements(BlockCtx::If)?;
        let mut else_ifs = Vec::new();
        let mut else_body = None;
        loop {
            match self.peek() {
                Some(Tok::ElseIf) => {
                    self.pos += 1;
                    let elseif_cond = self.parse_expression()?;
                    self.expect(Tok::Then, "'Then' after 'ElseIf'")?;
                    let body = self.parse_statements(BlockCtx::If)?;
                    else_ifs.push((elseif_cond, body));
                }
                Some(Tok::Else) => {
                    self.pos += 1;
                    else_body = Some(self.parse_statements(BlockCtx::If)?);
                }
                _ => break,
            }
        }
        self.expect(Tok::End, "'End If'")?;
        self.expect(Tok::If, "'If' after 'End'")?;
        Ok(Statement::If {
            condition,
            then_body,
            else_ifs,
            else_body,
        })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.expect(Tok::For, "'For'")?;
        if self.at(Tok::Each) {
            self.pos += 1;
            let element = Expression::Name(self.ident()?);
            self.expect(Tok::In, "'In'")?;
            let collection = self.parse_expression()?;
            let body = self.parse_statements(BlockCtx::For)?;
            self.expect(Tok::Next, "'Next'")?;
            if self.at(Tok::Ident) {
                self.pos += 1;
            }
            return Ok(Statement::ForEach {
                element,
                collection,
                body,
            });
        }
        let counter = Expression::Name(self.ident()?);
        self.expect(Tok::Eq, "'=' in For statement")?;
        let from = self.parse_expression()?;
        self.expect(Tok::To, "'To'")?;
        let to = self.parse_expression()?;
        let step = if self.at(Tok::Step) {
            self.pos += 1;
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_statements(BlockCtx::For)?;
        self.expect(Tok::Next, "'Next'")?;
        if self.at(Tok::Ident) {
            self.pos += 1;
        }
        Ok(Statement::For {
            counter,
            from,
            to,
            step,
            body,
        })
    }

    fn parse_do(&mut self) -> Result<Statement, ParseError> {
        self.expect(Tok::Do, "'Do'")?;
        let mut condition = None;
        if matches!(self.peek(), Some(Tok::While) | Some(Tok::Until)) {
            self.pos += 1;
            condition = Some(self.parse_expression()?);
        }
        let body = self.parse_statements(BlockCtx::Do)?;
        self.expect(Tok::Loop, "'Loop'")?;
        if matches!(self.peek(), Some(Tok::While) | Some(Tok::Until)) {
            self.pos += 1;
            let post = self.parse_expression()?;
            if condition.is_none() {
                condition = Some(post);
            }
        }
        Ok(Statement::DoLoop { condition, body })
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        self.expect(Tok::While, "'While'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_statements(BlockCtx::While)?;
        self.expect(Tok::Wend, "'Wend'")?;
        Ok(Statement::While { condition, body })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expression, ParseError> {
        if level == NOT_LEVEL && self.at(Tok::Not) {
            self.pos += 1;
            let expr = self.parse_binary(NOT_LEVEL)?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        if level >= LEVELS.len() {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.match_level(level) {
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn match_level(&self, level: usize) -> Option<BinaryOp> {
        let kind = self.peek()?;
        LEVELS[level]
            .iter()
            .find(|(tok, _)| *tok == kind)
            .map(|(_, op)| *op)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.at(Tok::Minus) {
            self.pos += 1;
            let expr = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                expr: Box::new(expr),
            });
        }
        self.parse_operand()
    }

    fn parse_operand(&mut self) -> Result<Expression, ParseError> {
        match self.peek() {
            Some(Tok::Ident) => self.parse_postfix_expression(),
            Some(Tok::IntLit) => {
                let token = self.next_token()?;
                let value = token
                    .text
                    .parse::<i64>()
                    .map_err(|_| self.error("integer literal out of range"))?;
                Ok(Expression::Literal {
                    literal: Literal::Integer(value),
                    span: token.span,
                })
            }
            Some(Tok::FloatLit) => {
                let token = self.next_token()?;
                Ok(Expression::Literal {
                    literal: Literal::Float(token.text),
                    span: token.span,
                })
            }
            Some(Tok::StringLit) => {
                let token = self.next_token()?;
                let inner = token.text[1..token.text.len() - 1].replace("\"\"", "\"");
                Ok(Expression::Literal {
                    literal: Literal::String(inner),
                    span: token.span,
                })
            }
            Some(Tok::True) | Some(Tok::False) => {
                let token = self.next_token()?;
                Ok(Expression::Literal {
                    literal: Literal::Bool(token.kind == Tok::True),
                    span: token.span,
                })
            }
            Some(Tok::Nothing) => {
                let token = self.next_token()?;
                Ok(Expression::Nothing { span: token.span })
            }
            Some(Tok::New) => {
                let token = self.next_token()?;
                let type_ref = self.parse_type_ref()?;
                let end = type_ref.name().span.end;
                Ok(Expression::New {
                    type_ref,
                    span: Span::new(token.span.start, end),
                })
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(Expression::Paren(Box::new(inner)))
            }
            Some(found) => Err(self.error(format!("expected expression, found {found:?}"))),
            None => Err(self.error("expected expression, found end of module")),
        }
    }

    /// Parse an identifier followed by `.member` and `(args)` postfixes.
    fn parse_postfix_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expr = Expression::Name(self.ident()?);
        loop {
            if self.at(Tok::Dot) {
                self.pos += 1;
                let name = self.ident()?;
                expr = Expression::Member {
                    base: Box::new(expr),
                    name,
                };
            } else if self.at(Tok::LParen) {
                let start = expr.span().start;
                self.pos += 1;
                let args = self.parse_paren_args()?;
                let close = self.expect(Tok::RParen, "')' closing argument list")?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    args,
                    span: Span::new(start, close.span.end),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_paren_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        if self.at(Tok::RParen) {
            return Ok(args);
        }
        loop {
            if self.at(Tok::Comma) {
                let span = self.tokens[self.pos].span;
                args.push(Expression::Missing {
                    span: Span::new(span.start, span.start),
                });
                self.pos += 1;
                continue;
            }
            if self.at(Tok::RParen) {
                break;
            }
            args.push(self.parse_expression()?);
            if self.at(Tok::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(args)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, ModuleItem, Statement};

    fn parse(source: &str) -> ModuleTree {
        parse_module(source).expect("module should parse")
    }

    mod declarations {
        use super::*;

        #[test]
        fn const_declaration() {
            let tree = parse("Public Sub Foo()\n    Const const1 As Integer = 9\nEnd Sub\n");
            let ModuleItem::Procedure(procedure) = &tree.items[0] else {
                panic!("expected procedure");
            };
            assert_eq!(procedure.name.name, "Foo");
            let Statement::Constants(group) = &procedure.body[0] else {
                panic!("expected constant statement");
            };
            assert_eq!(group.consts.len(), 1);
            assert_eq!(group.consts[0].name.name, "const1");
            assert_eq!(
                group.consts[0].type_name.as_ref().unwrap().name().name,
                "Integer"
            );
            // "const1" starts at line 2, column 11.
            assert_eq!(group.consts[0].name.selection.start_line, 2);
            assert_eq!(group.consts[0].name.selection.start_column, 11);
        }

        #[test]
        fn two_constants_in_one_statement() {
            let tree = parse("Sub Foo()\n    Const a = 1, b = 2\nEnd Sub\n");
            let ModuleItem::Procedure(procedure) = &tree.items[0] else {
                panic!("expected procedure");
            };
            let Statement::Constants(group) = &procedure.body[0] else {
                panic!("expected constants");
            };
            assert_eq!(group.consts.len(), 2);
            assert_eq!(group.consts[0].name.name, "a");
            assert_eq!(group.consts[1].name.name, "b");
        }

        #[test]
        fn module_level_variables() {
            let tree = parse("Private count As Long\nPublic shared As Object\nDim untyped\n");
            assert_eq!(tree.items.len(), 3);
            let ModuleItem::Variables(group) = &tree.items[0] else {
                panic!("expected variables");
            };
            assert_eq!(group.accessibility, Some(Accessibility::Private));
            assert_eq!(group.vars[0].name.name, "count");
        }

        #[test]
        fn procedure_with_params_and_return_type() {
            let tree =
                parse("Private Function Add(ByVal a As Long, b As Long) As Long\nEnd Function\n");
            let ModuleItem::Procedure(procedure) = &tree.items[0] else {
                panic!("expected procedure");
            };
            assert_eq!(procedure.kind, ProcedureKind::Function);
            assert_eq!(procedure.params.len(), 2);
            assert!(procedure.params[0].by_val);
            assert_eq!(procedure.return_type.as_ref().unwrap().name().name, "Long");
        }

        #[test]
        fn property_accessors() {
            let tree = parse(
                "Public Property Get Count() As Long\nEnd Property\n\
                 Public Property Let Count(value As Long)\nEnd Property\n",
            );
            let kinds: Vec<ProcedureKind> = tree
                .items
                .iter()
                .map(|item| match item {
                    ModuleItem::Procedure(p) => p.kind,
                    _ => panic!("expected procedure"),
                })
                .collect();
            assert_eq!(
                kinds,
                vec![ProcedureKind::PropertyGet, ProcedureKind::PropertyLet]
            );
        }

        #[test]
        fn enum_with_members() {
            let tree = parse("Public Enum Color\n    Red\n    Green = 2\nEnd Enum\n");
            let ModuleItem::Enum(def) = &tree.items[0] else {
                panic!("expected enum");
            };
            assert_eq!(def.name.name, "Color");
            assert_eq!(def.members.len(), 2);
            assert!(def.members[1].value.is_some());
        }

        #[test]
        fn user_defined_type() {
            let tree = parse("Type Point\n    X As Long\n    Y As Long\nEnd Type\n");
            let ModuleItem::UserType(udt) = &tree.items[0] else {
                panic!("expected user type");
            };
            assert_eq!(udt.members.len(), 2);
        }

        #[test]
        fn implements_clause() {
            let tree = parse("Implements Interface1\n\nPrivate Sub Interface1_Foo()\nEnd Sub\n");
            assert_eq!(tree.implements.len(), 1);
            assert_eq!(tree.implements[0].name().name, "Interface1");
        }
    }

    mod statements {
        use super::*;

        fn body_of(source: &str) -> Vec<Statement> {
            let tree = parse(source);
            match &tree.items[0] {
                ModuleItem::Procedure(procedure) => procedure.body.clone(),
                _ => panic!("expected procedure"),
            }
        }

        #[test]
        fn bare_call_with_arguments() {
            let body = body_of("Sub DoIt()\n    Bar expression\nEnd Sub\n");
            let Statement::Call { callee, args } = &body[0] else {
                panic!("expected call");
            };
            let Expression::Name(name) = callee else {
                panic!("expected name callee");
            };
            assert_eq!(name.name, "Bar");
            assert_eq!(args.len(), 1);
        }

        #[test]
        fn call_keyword_form() {
            let body = body_of("Sub DoIt()\n    Call Bar(1, 2)\nEnd Sub\n");
            let Statement::Call { args, .. } = &body[0] else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
        }

        #[test]
        fn missing_argument_slots() {
            let body = body_of("Sub DoIt()\n    Bar , Nothing\nEnd Sub\n");
            let Statement::Call { args, .. } = &body[0] else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
            assert!(args[0].is_missing());
            assert!(matches!(args[1], Expression::Nothing { .. }));
        }

        #[test]
        fn set_assignment() {
            let body = body_of("Sub DoIt()\n    Set target = New Class1\nEnd Sub\n");
            let Statement::Assign { is_set, value, .. } = &body[0] else {
                panic!("expected assignment");
            };
            assert!(*is_set);
            assert!(matches!(value, Expression::New { .. }));
        }

        #[test]
        fn let_assignment_with_comparison_rhs() {
            let body = body_of("Sub DoIt()\n    flag = a = b\nEnd Sub\n");
            let Statement::Assign { is_set, value, .. } = &body[0] else {
                panic!("expected assignment");
            };
            assert!(!*is_set);
            assert!(matches!(
                value,
                Expression::Binary {
                    op: BinaryOp::Eq,
                    ..
                }
            ));
        }

        #[test]
        fn if_block_with_else() {
            let body = body_of(
                "Sub DoIt()\n    If x > 0 Then\n        Foo\n    Else\n        Bar\n    End If\nEnd Sub\n",
            );
            let Statement::If {
                then_body,
                else_body,
                ..
            } = &body[0]
            else {
                panic!("expected if");
            };
            assert_eq!(then_body.len(), 1);
            assert_eq!(else_body.as_ref().unwrap().len(), 1);
        }

        #[test]
        fn single_line_if() {
            let body = body_of("Sub DoIt()\n    If x Then Foo\nEnd Sub\n");
            let Statement::If { then_body, .. } = &body[0] else {
                panic!("expected if");
            };
            assert_eq!(then_body.len(), 1);
        }

        #[test]
        fn for_loop() {
            let body =
                body_of("Sub DoIt()\n    For i = 1 To 10\n        Foo i\n    Next i\nEnd Sub\n");
            let Statement::For { counter, body, .. } = &body[0] else {
                panic!("expected for");
            };
            assert!(matches!(counter, Expression::Name(_)));
            assert_eq!(body.len(), 1);
        }

        #[test]
        fn do_while_loop() {
            let body = body_of("Sub DoIt()\n    Do While x < 3\n        Foo\n    Loop\nEnd Sub\n");
            let Statement::DoLoop { condition, body } = &body[0] else {
                panic!("expected do loop");
            };
            assert!(condition.is_some());
            assert_eq!(body.len(), 1);
        }

        #[test]
        fn statement_separator_on_one_line() {
            let body = body_of("Sub DoIt()\n    Const a = 1: Const b = 2\nEnd Sub\n");
            assert_eq!(body.len(), 2);
        }

        #[test]
        fn line_continuation_in_call() {
            let body = body_of("Sub DoIt()\n    Bar a, _\n        b\nEnd Sub\n");
            let Statement::Call { args, .. } = &body[0] else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
        }
    }

    mod annotations {
        use super::*;

        #[test]
        fn ignore_module_without_rules_is_blanket() {
            let tree = parse("'@IgnoreModule\n\nPublic Sub Foo()\nEnd Sub\n");
            assert_eq!(tree.annotations.len(), 1);
            assert_eq!(tree.annotations[0].name, "IgnoreModule");
            assert!(tree.annotations[0].args.is_empty());
        }

        #[test]
        fn ignore_module_with_rule_list() {
            let tree = parse("'@IgnoreModule ConstantNotUsed, VariableNotUsed\n");
            assert_eq!(
                tree.annotations[0].args,
                vec!["ConstantNotUsed", "VariableNotUsed"]
            );
        }

        #[test]
        fn statement_ignore_attaches_to_next_statement() {
            let tree = parse(
                "Public Sub Foo()\n    '@Ignore ConstantNotUsed\n    Const const1 As Integer = 9\nEnd Sub\n",
            );
            let annotation = &tree.annotations[0];
            assert_eq!(annotation.name, "Ignore");
            assert_eq!(annotation.args, vec!["ConstantNotUsed"]);
            assert_eq!(annotation.target_line, Some(3));
        }

        #[test]
        fn plain_comments_are_not_annotations() {
            let tree = parse("' just a comment\nPublic Sub Foo()\nEnd Sub\n");
            assert!(tree.annotations.is_empty());
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn unterminated_procedure_is_an_error() {
            let err = parse_module("Public Sub Foo()\n    Const a = 1\n").unwrap_err();
            assert!(err.message.contains("End"));
        }

        #[test]
        fn garbage_at_module_level_is_an_error() {
            let err = parse_module("Public Sub Foo()\nEnd Sub\n= 12\n").unwrap_err();
            assert!(err.message.contains("unexpected"));
        }

        #[test]
        fn error_carries_selection() {
            let err = parse_module("Sub Foo()\n    Const = 1\nEnd Sub\n").unwrap_err();
            assert_eq!(err.selection.start_line, 2);
        }
    }
}
