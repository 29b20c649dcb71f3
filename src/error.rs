//! Error taxonomy for the export pipeline.
//!
//! Per-model failures ([`RetrievalError`], [`ConvertError`], [`MergeError`])
//! are logged and skipped by the pipeline; [`ConfigError`] and I/O failures
//! abort the run.
//! [`FormatError`] never leaves the formatter: callers fall back to the raw
//! text.

use std::path::PathBuf;
use thiserror::Error;

/// The remote store could not answer a request.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("remote error on {model}: {message}")]
    Remote { model: String, message: String },

    #[error("unexpected response for {model}: {message}")]
    Decode { model: String, message: String },

    #[error("authentication failed for user {user} on database {database}")]
    Login { user: String, database: String },
}

/// Generated source text could not be pretty-printed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unbalanced bracket {found:?} on line {line}")]
    Unbalanced { found: char, line: usize },

    #[error("unterminated string starting on line {line}")]
    UnterminatedString { line: usize },

    #[error("{count} bracket(s) left open at end of input")]
    Unclosed { count: usize },
}

/// Markup text could not be turned into an element tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Syntax(String),

    #[error("markup has no root element")]
    NoRoot,

    #[error("markup has {0} root elements, expected one")]
    MultipleRoots(usize),
}

/// Records could not be turned into an artifact.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("model '{0}' is not supported by the python converter")]
    UnsupportedModel(String),

    #[error("failed to encode {model} rows: {message}")]
    Encode { model: String, message: String },
}

/// An existing file cannot absorb a generated artifact.
#[derive(Error, Debug)]
#[error("failed merging into {file}: {reason}\n{payload}")]
pub struct MergeError {
    pub file: PathBuf,
    pub payload: String,
    pub reason: String,
}

impl MergeError {
    pub fn new(file: impl Into<PathBuf>, payload: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            file: file.into(),
            payload: payload.into(),
            reason: reason.to_string(),
        }
    }
}

/// The export request is invalid; raised before any file is written.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    #[error("you need to explicitly define a list of fields for exporting '{0}'")]
    MissingFields(String),

    #[error("unsupported output format '{0}'")]
    UnknownFormat(String),

    #[error("model '{0}' cannot be exported as python, only 'ir.model' can")]
    UnsupportedClassModel(String),

    #[error("invalid domain {domain:?}: {reason}")]
    Domain { domain: String, reason: String },

    #[error("invalid version '{0}'")]
    Version(String),
}

/// Everything that can stop an export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
