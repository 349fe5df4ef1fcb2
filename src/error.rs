//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - LSD-000-009: Path errors
//! - LSD-010-019: Expression errors
//! - LSD-020-029: Directive errors
//! - LSD-030-039: Markup errors
//! - LSD-040-049: Config / IO errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LsdomError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum LsdomError {
    // ═══════════════════════════════════════════
    // PATH ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[LSD-001] Invalid path syntax: {path}")]
    InvalidPath { path: String },

    #[error("[LSD-002] Cannot traverse '{segment}' on {value_type} (path '{path}')")]
    InvalidTraversal {
        segment: String,
        value_type: String,
        path: String,
    },

    #[error("[LSD-003] Value at '{path}' is not a list")]
    NotAList { path: String },

    // ═══════════════════════════════════════════
    // EXPRESSION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[LSD-010] Expression parse error at position {position} in '{source_text}': {details}")]
    ExpressionParse {
        source_text: String,
        position: usize,
        details: String,
    },

    // ═══════════════════════════════════════════
    // DIRECTIVE ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[LSD-020] Malformed for directive: '{directive}'")]
    MalformedFor { directive: String },

    #[error("[LSD-021] for directive list '{expression}' is not a data path")]
    ForRequiresPath { expression: String },

    #[error("[LSD-022] for directive on a node without parent")]
    ForWithoutParent,

    #[error("[LSD-023] model directive '{expression}' is not a data path")]
    InvalidModelPath { expression: String },

    // ═══════════════════════════════════════════
    // MARKUP ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[LSD-030] Markup parse error at position {position}: {details}")]
    MarkupParse { position: usize, details: String },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[LSD-040] Configuration error: {reason}")]
    Config { reason: String },

    #[error("[LSD-041] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[LSD-042] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LsdomError {
    pub(crate) fn parse(source_text: &str, position: usize, details: impl Into<String>) -> Self {
        LsdomError::ExpressionParse {
            source_text: source_text.to_string(),
            position,
            details: details.into(),
        }
    }
}

impl FixSuggestion for LsdomError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            LsdomError::InvalidPath { .. } => Some("Use format: a.b.c or a[0].b"),
            LsdomError::InvalidTraversal { .. } => {
                Some("Check the path - you're trying to write a field into a non-object value")
            }
            LsdomError::NotAList { .. } => Some("List operations need an array at the path"),
            LsdomError::ExpressionParse { .. } => Some(
                "Expressions support member access, literals, arithmetic, comparison and ternary",
            ),
            LsdomError::MalformedFor { .. } => Some("Use for=\"item in list.path\""),
            LsdomError::ForRequiresPath { .. } => {
                Some("Bind the list to a plain data path such as todos or state.items")
            }
            LsdomError::ForWithoutParent => Some("Wrap the repeated element in a container"),
            LsdomError::InvalidModelPath { .. } => {
                Some("model needs a writable path such as form.name")
            }
            LsdomError::MarkupParse { .. } => Some("Check that every tag is closed"),
            LsdomError::Config { .. } => Some("Check the TOML syntax and field names"),
            LsdomError::Io(_) => Some("Check file path and permissions"),
            LsdomError::Json(_) => Some("Check the JSON syntax of the data file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_codes() {
        let err = LsdomError::MalformedFor {
            directive: "item of todos".into(),
        };
        assert_eq!(
            err.to_string(),
            "[LSD-020] Malformed for directive: 'item of todos'"
        );
    }

    #[test]
    fn parse_helper_builds_expression_error() {
        let err = LsdomError::parse("a +", 3, "unexpected end of expression");
        assert!(matches!(
            err,
            LsdomError::ExpressionParse { position: 3, .. }
        ));
        assert!(err.to_string().contains("'a +'"));
    }

    #[test]
    fn every_error_has_a_suggestion() {
        let errors = [
            LsdomError::InvalidPath { path: "a..b".into() },
            LsdomError::NotAList { path: "a".into() },
            LsdomError::ForWithoutParent,
            LsdomError::Config { reason: "x".into() },
        ];
        for err in errors {
            assert!(err.fix_suggestion().is_some(), "{err}");
        }
    }
}
