//! Logos token lexer for VBA-style source.
//!
//! Keywords are matched case-insensitively (host-language semantics). Line
//! continuations (` _` at end of line) are consumed as trivia; newlines and
//! `:` separators are real tokens because the grammar is line-oriented.

use logos::Logos;
use vbatool_core::Span;

/// Token kinds.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
#[logos(skip r"_[ \t]*\r?\n")]
pub enum Tok {
    #[regex(r"\r?\n")]
    Newline,

    #[token(":")]
    StatementSep,

    #[regex(r"'[^\r\n]*")]
    Comment,

    // ------------------------------------------------------------------
    // Keywords
    // ------------------------------------------------------------------
    #[token("sub", ignore(ascii_case))]
    Sub,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("property", ignore(ascii_case))]
    Property,
    #[token("get", ignore(ascii_case))]
    Get,
    #[token("let", ignore(ascii_case))]
    Let,
    #[token("set", ignore(ascii_case))]
    Set,
    #[token("end", ignore(ascii_case))]
    End,
    #[token("dim", ignore(ascii_case))]
    Dim,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("static", ignore(ascii_case))]
    Static,
    #[token("public", ignore(ascii_case))]
    Public,
    #[token("private", ignore(ascii_case))]
    Private,
    #[token("friend", ignore(ascii_case))]
    Friend,
    #[token("global", ignore(ascii_case))]
    Global,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("type", ignore(ascii_case))]
    Type,
    #[token("enum", ignore(ascii_case))]
    Enum,
    #[token("byval", ignore(ascii_case))]
    ByVal,
    #[token("byref", ignore(ascii_case))]
    ByRef,
    #[token("optional", ignore(ascii_case))]
    Optional,
    #[token("paramarray", ignore(ascii_case))]
    ParamArray,
    #[token("new", ignore(ascii_case))]
    New,
    #[token("nothing", ignore(ascii_case))]
    Nothing,
    #[token("call", ignore(ascii_case))]
    Call,
    #[token("implements", ignore(ascii_case))]
    Implements,
    #[token("option", ignore(ascii_case))]
    Option,
    #[token("explicit", ignore(ascii_case))]
    Explicit,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("then", ignore(ascii_case))]
    Then,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("elseif", ignore(ascii_case))]
    ElseIf,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("to", ignore(ascii_case))]
    To,
    #[token("step", ignore(ascii_case))]
    Step,
    #[token("next", ignore(ascii_case))]
    Next,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("loop", ignore(ascii_case))]
    Loop,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("wend", ignore(ascii_case))]
    Wend,
    #[token("until", ignore(ascii_case))]
    Until,
    #[token("exit", ignore(ascii_case))]
    Exit,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("mod", ignore(ascii_case))]
    Mod,
    #[token("is", ignore(ascii_case))]
    Is,
    #[token("each", ignore(ascii_case))]
    Each,
    #[token("in", ignore(ascii_case))]
    In,

    // ------------------------------------------------------------------
    // Literals and identifiers
    // ------------------------------------------------------------------
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLit,
    #[regex(r"[0-9]+")]
    IntLit,
    #[regex(r#""([^"\r\n]|"")*""#)]
    StringLit,
    // Trailing [$%&!#] covers legacy type-declaration suffixes.
    #[regex(r"[A-Za-z][A-Za-z0-9_]*[$%&!#]?")]
    Ident,

    // ------------------------------------------------------------------
    // Punctuation and operators
    // ------------------------------------------------------------------
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("<>")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\\")]
    Backslash,
    #[token("^")]
    Caret,
    #[token("&")]
    Amp,
}

/// A token with its source span and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Tok,
    pub span: Span,
    pub text: String,
}

/// Tokenize a module source. Returns the offending span on a lex error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Span> {
    let mut lexer = Tok::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u64, range.end as u64);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span,
                text: lexer.slice().to_string(),
            }),
            Err(()) => return Err(span),
        }
    }
    Ok(tokens)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(kinds("Sub SUB sub"), vec![Tok::Sub, Tok::Sub, Tok::Sub]);
        assert_eq!(kinds("CONST Const"), vec![Tok::Const, Tok::Const]);
    }

    #[test]
    fn identifiers_and_keywords_split_correctly() {
        // "Subtotal" must not lex as the keyword "Sub" plus "total".
        assert_eq!(kinds("Subtotal"), vec![Tok::Ident]);
        assert_eq!(kinds("EndValue"), vec![Tok::Ident]);
    }

    #[test]
    fn const_declaration_tokens() {
        let toks = kinds("Const const1 As Integer = 9");
        assert_eq!(
            toks,
            vec![Tok::Const, Tok::Ident, Tok::As, Tok::Ident, Tok::Eq, Tok::IntLit]
        );
    }

    #[test]
    fn string_literal_with_escaped_quotes() {
        let tokens = tokenize(r#"s = "say ""hi""" "#).unwrap();
        assert_eq!(tokens[2].kind, Tok::StringLit);
        assert_eq!(tokens[2].text, r#""say ""hi""""#);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let toks = kinds("x = 1 ' trailing comment\ny = 2");
        assert_eq!(
            toks,
            vec![
                Tok::Ident,
                Tok::Eq,
                Tok::IntLit,
                Tok::Comment,
                Tok::Newline,
                Tok::Ident,
                Tok::Eq,
                Tok::IntLit
            ]
        );
    }

    #[test]
    fn annotation_comment_preserves_text() {
        let tokens = tokenize("'@Ignore ConstantNotUsed\n").unwrap();
        assert_eq!(tokens[0].kind, Tok::Comment);
        assert_eq!(tokens[0].text, "'@Ignore ConstantNotUsed");
    }

    #[test]
    fn line_continuation_is_trivia() {
        let toks = kinds("Bar a, _\n    b");
        assert_eq!(
            toks,
            vec![Tok::Ident, Tok::Ident, Tok::Comma, Tok::Ident]
        );
    }

    #[test]
    fn statement_separator() {
        let toks = kinds("Const a = 1: Const b = 2");
        assert!(toks.contains(&Tok::StatementSep));
    }

    #[test]
    fn type_suffix_folds_into_identifier() {
        let tokens = tokenize("Mid$(s, 1)").unwrap();
        assert_eq!(tokens[0].kind, Tok::Ident);
        assert_eq!(tokens[0].text, "Mid$");
    }

    #[test]
    fn spans_are_byte_accurate() {
        let tokens = tokenize("Dim foo").unwrap();
        assert_eq!(tokens[1].span, Span::new(4, 7));
    }
}
