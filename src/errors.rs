//! Resource-load error types.
//!
//! These errors fire at load time, before any sentence is decoded; a decoder
//! never returns them per sentence. Per-sentence failures are values on
//! [`crate::api::DecodeStatus`] instead. Enums are `#[non_exhaustive]` so
//! variants can be added without breaking callers.

use std::fmt;
use std::io;

/// Errors from loading or validating a phrase table.
#[derive(Debug)]
#[non_exhaustive]
pub enum PhraseTableError {
    /// I/O error while reading the table.
    Io(io::Error),
    /// The table file is not valid JSON or misses required fields.
    Parse { detail: String },
    /// A rule's feature vector does not match the table's declared arity.
    FeatureArity {
        rule: usize,
        got: usize,
        expected: usize,
    },
    /// A rule has an empty source phrase.
    EmptySourcePhrase { rule: usize },
}

impl fmt::Display for PhraseTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Parse { detail } => write!(f, "malformed phrase table: {detail}"),
            Self::FeatureArity {
                rule,
                got,
                expected,
            } => write!(
                f,
                "rule {rule}: feature arity mismatch: got {got}, expected {expected}"
            ),
            Self::EmptySourcePhrase { rule } => {
                write!(f, "rule {rule}: empty source phrase")
            }
        }
    }
}

impl std::error::Error for PhraseTableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PhraseTableError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
