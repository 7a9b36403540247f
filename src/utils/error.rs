/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 25/10/25
******************************************************************************/

//! Error types shared across the crate.

/// Errors reported by a [`ClientSession`](crate::client::ClientSession) and
/// its protocol layers.
///
/// The variants map to the distinct failure classes a caller may want to
/// react to: transport problems, server-reported errors, protocol parse
/// failures, rejected control requests and session lifecycle conditions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The HTTP request could not be performed.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// Reading from the streaming response body failed.
    #[error("read: {0}")]
    Read(#[from] std::io::Error),
    /// The server replied with a non-OK status and a diagnostic body.
    #[error("lightstreamer: {0}")]
    Server(String),
    /// The server replied with a non-OK status and an empty body.
    #[error("http: {0}")]
    Http(reqwest::StatusCode),
    /// A protocol line could not be parsed.
    #[error("invalid message {line:?}: {reason}")]
    Parse {
        /// The offending line, verbatim.
        line: String,
        /// Why the line was rejected.
        reason: String,
    },
    /// The server rejected a control request with REQERR.
    #[error("request rejected: {code}: {message}")]
    Rejected {
        /// Server-supplied error code.
        code: i32,
        /// Server-supplied error message.
        message: String,
    },
    /// The control endpoint replied with something other than REQOK/REQERR.
    #[error("unexpected control reply {0:?}")]
    UnexpectedReply(String),
    /// The session has no server-assigned id yet.
    #[error("session not connected")]
    NotConnected,
    /// The session was not bound within the configured timeout.
    #[error("timed out waiting for session bind")]
    BindTimeout,
    /// The governing cancellation token was triggered.
    #[error("operation canceled")]
    Canceled,
    /// An update could not be applied to the current snapshot.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}
