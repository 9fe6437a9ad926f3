use std::io;

use thiserror::Error;

use crate::graph::Token;

/// Errors raised while editing a graph or asking it for a starting point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The graph has no sets, so there is nothing to start from.
    #[error("the dialogue graph has no sets")]
    EmptyGraph,
    #[error("no node with token {0}")]
    UnknownToken(Token),
    #[error("token {0} does not belong to a dialogue set")]
    NotASet(Token),
    #[error("set {token} has no line at index {index}")]
    LineIndexOutOfRange { token: Token, index: usize },
    /// A set must always keep at least one line.
    #[error("cannot remove the last line of set {0}")]
    LastLine(Token),
    #[error("set {0} has no lines")]
    EmptySet(Token),
    #[error("token {0} is used by more than one node")]
    DuplicateToken(Token),
    #[error("token -1 is reserved for \"no link\" and cannot name a node")]
    ReservedToken,
}

/// Errors raised while reading or writing a persisted graph document.
#[derive(Debug, Error)]
pub enum GraphLoadError {
    #[error("could not access the dialogue document: {0}")]
    Io(#[from] io::Error),
    #[error("the dialogue document is corrupt: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("could not encode the dialogue document: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: i32 },
    #[error("invalid dialogue document: {0}")]
    Graph(#[from] GraphError),
}

/// Resolver misses. Callers usually fall back to empty text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("no content for line '{line_id}'")]
    ContentNotFound { line_id: String },
    #[error("line '{line_id}' has no '{locale}' entry")]
    LocaleNotFound { line_id: String, locale: String },
}

#[derive(Debug, Error)]
pub enum StringTableError {
    #[error("could not read the string table: {0}")]
    Io(#[from] io::Error),
    #[error("malformed string table: {0}")]
    Csv(#[from] csv::Error),
    #[error("the string table has no '{0}' column")]
    MissingIdColumn(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// The graph or the string table has not finished loading.
    #[error("dialogue assets are not loaded yet")]
    AssetsNotReady,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("the reader is not waiting for a player choice")]
    NotAwaitingChoice,
    #[error("{index} is not a valid choice (expected a number below {count})")]
    InvalidChoice { index: usize, count: usize },
}
