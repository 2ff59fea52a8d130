//! Error kinds and their process exit codes.
//!
//! No-match conditions (reference package not imported, member not in the
//! alias map) are not errors and never surface here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = UnaliasError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum UnaliasError {
    /// Bad caller input: exclude patterns, reference package selection, go.mod lookup.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A Go source file could not be parsed.
    #[error("failed to parse {}:{line}:{column}: syntax error near `{snippet}`", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        snippet: String,
    },

    /// An alias candidate is qualified by something other than a plain package name.
    #[error(
        "unexpected alias shape in {}:{line}: `{expr}` is not qualified by a package name",
        path.display()
    )]
    UnexpectedAliasShape {
        path: PathBuf,
        line: usize,
        expr: String,
    },

    /// Writing a rewritten file back to disk failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("failed to load Go grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),
}

impl UnaliasError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        UnaliasError::InvalidInput {
            message: message.into(),
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            UnaliasError::InvalidInput { .. } => 2,
            UnaliasError::Parse { .. } => 3,
            UnaliasError::UnexpectedAliasShape { .. } => 4,
            UnaliasError::Write { .. } => 5,
            UnaliasError::Read { .. } | UnaliasError::Walk(_) | UnaliasError::Grammar(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_fatal_kind() {
        let parse = UnaliasError::Parse {
            path: PathBuf::from("a.go"),
            line: 1,
            column: 1,
            snippet: "}".to_string(),
        };
        let shape = UnaliasError::UnexpectedAliasShape {
            path: PathBuf::from("a.go"),
            line: 3,
            expr: "a.b.C".to_string(),
        };
        let write = UnaliasError::Write {
            path: PathBuf::from("a.go"),
            source: io::Error::other("disk full"),
        };
        let codes = [
            UnaliasError::invalid_input("bad").exit_code(),
            parse.exit_code(),
            shape.exit_code(),
            write.exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5]);
    }

    #[test]
    fn messages_name_the_offending_location() {
        let shape = UnaliasError::UnexpectedAliasShape {
            path: PathBuf::from("types/alias.go"),
            line: 7,
            expr: "a.b.C".to_string(),
        };
        let msg = shape.to_string();
        assert!(msg.contains("types/alias.go:7"));
        assert!(msg.contains("a.b.C"));
    }
}
