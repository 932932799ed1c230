//! Error types for imap-search

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Dialing the server failed (refused, unreachable, or timed out).
    #[error("failed to connect to {server}: {reason}")]
    Connection { server: String, reason: String },

    /// The server rejected the credentials. Carries the server's
    /// literal rejection text; operators script against it.
    #[error("{0}")]
    Authentication(String),

    /// `connect` was called on a session that is already live.
    /// Connections are one-shot per client; call `close` first.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    /// An operation that requires a live session was called before
    /// `connect` or after `close`.
    #[error("not connected to {0}")]
    NotConnected(String),

    /// The mailbox could not be opened.
    #[error("failed to open mailbox {mailbox:?} as {username} on {server}: {reason}")]
    OpenMailbox {
        server: String,
        username: String,
        mailbox: String,
        reason: String,
    },

    /// A transport-level failure while fetching envelopes.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Zero matches with `--no-results-error` set.
    #[error("Found no messages matching the search term: {0:?}")]
    EmptyResult(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
