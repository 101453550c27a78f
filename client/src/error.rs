use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The remote operation a [`TransportError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn message(self) -> &'static str {
        match self {
            Operation::List => "failed to fetch tasks",
            Operation::Create => "failed to create task",
            Operation::Update => "failed to update task",
            Operation::Delete => "failed to delete task",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportErrorKind {
    #[error("request failed: {0}")]
    Network(String),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Failure of a single call against the task API.
///
/// Network errors, non-2xx responses and undecodable bodies all end up
/// here. The value is `Clone` so it can be kept as list error state and
/// handed to mutation callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation}: {kind}")]
pub struct TransportError {
    pub operation: Operation,
    #[source]
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(operation: Operation, kind: TransportErrorKind) -> Self {
        Self { operation, kind }
    }

    pub fn network(operation: Operation, err: impl fmt::Display) -> Self {
        Self::new(operation, TransportErrorKind::Network(err.to_string()))
    }

    pub fn status(operation: Operation, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            operation,
            TransportErrorKind::Status {
                status,
                body: body.into(),
            },
        )
    }

    pub fn decode(operation: Operation, err: impl fmt::Display) -> Self {
        Self::new(operation, TransportErrorKind::Decode(err.to_string()))
    }

    /// HTTP status of the failed response, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            TransportErrorKind::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("environment variable {var} is not valid unicode")]
    Env {
        var: &'static str,
        #[source]
        source: std::env::VarError,
    },

    #[error("unsupported URL scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
