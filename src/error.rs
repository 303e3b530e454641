use std::fmt;

use thiserror::Error;
use tokio::time::error::Elapsed;

/// Everything that can go wrong between picking a protocol and holding a decoded reply.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to bind local socket: {0}")]
    FailedPortBind(std::io::Error),

    #[error("host is unreachable: {0}")]
    UnreachableHost(std::io::Error),

    #[error("failed to send request: {0}")]
    SendError(std::io::Error),

    #[error("failed to receive response: {0}")]
    ReceiveError(std::io::Error),

    #[error("timed out waiting for the server")]
    Timeout(#[from] Elapsed),

    #[error("no response from server")]
    EmptyResponse,

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("bad request template: {0}")]
    Template(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Stable, coarse classification of a [QueryError].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Timeout,
    EmptyResponse,
    MalformedPacket,
    UnknownProtocol,
    Template,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "TransportError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::MalformedPacket => "MalformedPacket",
            ErrorKind::UnknownProtocol => "UnknownProtocol",
            ErrorKind::Template => "TemplateError",
            ErrorKind::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::FailedPortBind(_)
            | QueryError::UnreachableHost(_)
            | QueryError::SendError(_)
            | QueryError::ReceiveError(_) => ErrorKind::Transport,
            QueryError::Timeout(_) => ErrorKind::Timeout,
            QueryError::EmptyResponse => ErrorKind::EmptyResponse,
            QueryError::MalformedPacket(_) => ErrorKind::MalformedPacket,
            QueryError::UnknownProtocol(_) => ErrorKind::UnknownProtocol,
            QueryError::Template(_) => ErrorKind::Template,
            QueryError::Config(_) => ErrorKind::Config,
        }
    }
}
