//! Error types for sqlmapper

use std::path::PathBuf;
use thiserror::Error;

use crate::session::ExecResult;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while loading catalogs, rendering statements,
/// executing them, or binding their results.
#[derive(Error, Debug)]
pub enum Error {
    // ---- catalog loading ----
    #[error("Failed to read mapper file: {path}")]
    MapperRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse mapper file: {path}")]
    MapperParse {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid mapper document: {message}")]
    InvalidMapper { message: String },

    #[error("Duplicate statement id: {id}")]
    DuplicateStatement { id: String },

    #[error("Unsupported mapper url scheme: {url}")]
    UnsupportedUrlScheme { url: String },

    // ---- statement build ----
    #[error("query is empty")]
    EmptyQuery,

    #[error("bind variable not found: {name}")]
    BindVariableNotFound { name: String },

    #[error("Invalid {element} attribute: {message}")]
    InvalidNodeAttribute { element: String, message: String },

    #[error("foreach collection {name} is not a sequence or keyed collection")]
    InvalidForeachCollection { name: String },

    #[error("foreach item variable {name} already exists in the parameters")]
    ForeachItemExists { name: String },

    #[error("sql fragment not found: {refid}")]
    FragmentNotFound { refid: String },

    #[error("Circular sql fragment reference: {refid} (include chain: {chain})")]
    CircularInclude { refid: String, chain: String },

    #[error("Expression syntax error: {message} (in {source_expr:?})")]
    ExpressionSyntax { message: String, source_expr: String },

    #[error("Expression evaluation failed: {message}")]
    ExpressionEval { message: String },

    // ---- execution ----
    #[error("statement not found: {id}")]
    StatementNotFound { id: String },

    #[error("invalid executor: statement {id} is {action}, not usable here")]
    InvalidExecutor { id: String, action: String },

    #[error("prepare statement failed")]
    PrepareFailed(#[source] Box<Error>),

    #[error("batch insert parameter requires a slice or array")]
    SliceOrArrayRequired,

    #[error("session error: {message}")]
    Session {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("environment not registered: {name}")]
    UnknownEnvironment { name: String },

    #[error("driver not registered: {name}")]
    UnknownDriver { name: String },

    /// Aggregate of per-batch failures that were skip-wrapped. Carries the
    /// result of the batches that did run so callers can reconcile.
    #[error("{} of {} batches failed: {}", .errors.len(), .batches, join_messages(.errors))]
    Batch {
        batches: usize,
        partial: ExecResult,
        errors: Vec<Error>,
    },

    // ---- result binding ----
    #[error("no rows in result set")]
    NoRows,

    #[error("too many rows in result set")]
    TooManyRows,

    #[error("cannot bind column {column} ({kind}) to {expected}")]
    ColumnBind {
        column: String,
        kind: &'static str,
        expected: &'static str,
    },

    #[error("cannot convert {kind} value to {expected}")]
    ValueConvert {
        kind: &'static str,
        expected: &'static str,
    },

    #[error("binding error: {message}")]
    Binding { message: String },

    #[error("result map is not set")]
    ResultMapNotSet,

    // ---- transactions & scopes ----
    #[error("transaction already begun")]
    TransactionAlreadyBegun,

    #[error("transaction not begun")]
    TransactionNotBegun,

    #[error("no manager found in context")]
    NoManagerInContext,

    #[error("{cause}; additionally, rollback failed: {rollback}")]
    RollbackFailed {
        cause: Box<Error>,
        rollback: Box<Error>,
    },

    // ---- control sentinels ----
    /// Returned from a batch unit of work to record the failure and keep
    /// going with the remaining batches.
    #[error("skip")]
    Skip,

    /// Skip with an underlying cause attached.
    #[error("skip")]
    Skipped(#[source] Box<Error>),

    /// Returned from a transaction closure to request a commit even though
    /// the closure did not finish with `Ok`.
    #[error("commit requested")]
    Commit,
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Wrap a driver-level failure.
    pub fn session<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Session {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// A driver-level failure with no structured source.
    pub fn session_msg(message: impl Into<String>) -> Self {
        Error::Session {
            message: message.into(),
            source: None,
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Error::Binding {
            message: message.into(),
        }
    }

    /// Wrap `self` so a batch records it and continues.
    pub fn into_skip(self) -> Self {
        Error::Skipped(Box::new(self))
    }

    /// True for the skip sentinel, skip-wrapped errors, and batch
    /// aggregates built from them.
    pub fn is_skip(&self) -> bool {
        match self {
            Error::Skip | Error::Skipped(_) => true,
            Error::Batch { errors, .. } => errors.iter().any(Error::is_skip),
            _ => false,
        }
    }

    /// True for the commit-requested sentinel.
    pub fn is_commit(&self) -> bool {
        matches!(self, Error::Commit)
    }
}
