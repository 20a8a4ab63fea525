//! Identifier validation for the host language's grammar.

use thiserror::Error;

/// Reserved words that cannot be used as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "and", "as", "boolean", "byref", "byte", "byval", "call", "case", "const", "currency", "dim",
    "do", "double", "each", "else", "elseif", "end", "enum", "exit", "false", "for", "friend",
    "function", "get", "global", "goto", "if", "implements", "in", "integer", "is", "let", "long",
    "loop", "mod", "new", "next", "not", "nothing", "on", "option", "optional", "or", "paramarray",
    "private", "property", "public", "select", "set", "single", "static", "step", "string", "sub",
    "then", "to", "true", "type", "until", "variant", "wend", "while", "with",
];

/// Longest identifier the host language accepts.
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Why a proposed identifier is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier exceeds {MAX_IDENTIFIER_LENGTH} characters")]
    TooLong,

    #[error("identifier must start with a letter, found '{0}'")]
    InvalidStart(char),

    #[error("identifier contains invalid character '{0}'")]
    InvalidCharacter(char),

    #[error("'{0}' is a reserved word")]
    ReservedWord(String),
}

/// Validate a proposed identifier against the host grammar.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong);
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty");
    if !first.is_ascii_alphabetic() {
        return Err(ValidationError::InvalidStart(first));
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(ValidationError::InvalidCharacter(c));
        }
    }
    if RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::ReservedWord(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_identifiers() {
        assert!(validate_identifier("renamed").is_ok());
        assert!(validate_identifier("Const1").is_ok());
        assert!(validate_identifier("with_underscore").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate_identifier(""), Err(ValidationError::Empty));
    }

    #[test]
    fn rejects_digit_start() {
        assert_eq!(
            validate_identifier("1abc"),
            Err(ValidationError::InvalidStart('1'))
        );
    }

    #[test]
    fn rejects_underscore_start() {
        assert!(matches!(
            validate_identifier("_abc"),
            Err(ValidationError::InvalidStart('_'))
        ));
    }

    #[test]
    fn rejects_embedded_punctuation() {
        assert_eq!(
            validate_identifier("ab-c"),
            Err(ValidationError::InvalidCharacter('-'))
        );
    }

    #[test]
    fn rejects_reserved_words_case_insensitively() {
        assert!(matches!(
            validate_identifier("Sub"),
            Err(ValidationError::ReservedWord(_))
        ));
        assert!(matches!(
            validate_identifier("NOTHING"),
            Err(ValidationError::ReservedWord(_))
        ));
    }

    #[test]
    fn rejects_overlong_identifier() {
        let name = "a".repeat(256);
        assert_eq!(validate_identifier(&name), Err(ValidationError::TooLong));
    }
}
