//! Error types for drovefile parsing and loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for load operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while loading a drovefile from disk, including
/// recursive import resolution.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed reading file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("import not found: {}", path.display())]
    ImportNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("import cycle detected: {}", path.display())]
    ImportCycle { path: PathBuf },
}

/// A syntax error with the position it occurred at.
///
/// Line and column are 1-based and refer to the originating file, not
/// to any post-import position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {line}:{column}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub column: usize,
}

/// The taxonomy of syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("illegal character")]
    IllegalCharacter,

    #[error("block outside of a request")]
    BlockOutOfRequest,

    #[error("invalid section name")]
    InvalidSection,

    #[error("invalid block header '{0}'")]
    InvalidBlockHeader(String),

    #[error("block '{0}' defined multiple times")]
    SectionDefinedMultiple(String),

    #[error("invalid block entry assignment")]
    InvalidBlockEntryAssignment,

    #[error("invalid header key")]
    InvalidHeaderKey,

    #[error("invalid header separator")]
    InvalidHeaderSeparator,

    #[error("header field has no value")]
    NoHeaderValue,

    #[error("invalid request method")]
    InvalidRequestMethod,

    #[error("request has no URI")]
    NoRequestURI,

    #[error("invalid token ({0})")]
    InvalidToken(&'static str),

    #[error("invalid literal ({0})")]
    InvalidLiteral(&'static str),

    #[error("invalid string literal")]
    InvalidStringLiteral,

    #[error("empty use path")]
    EmptyUsePath,

    #[error("unclosed escape block")]
    OpenEscapeBlock,
}
