//! IMAP mailbox search library
//!
//! Connects to an IMAP server, authenticates, opens a mailbox
//! read-only, fetches message envelopes, and filters them by a literal
//! substring match on the subject line. Useful in automated
//! environments, like CI/CD pipelines, to check that a mail arrived in
//! a given inbox.
//!
//! The IMAP wire protocol is delegated to [`async_imap`]; this crate
//! only adds the connect/select/fetch/filter/report pipeline around it.

mod client;
mod config;
mod envelope;
mod error;
mod stream;

pub mod filter;
pub mod report;

pub use client::{MailboxHandle, SearchClient};
pub use config::{ClientOptions, FileConfig, parse_duration, CONFIG_FILE_NAME, DEFAULT_TIMEOUT};
pub use envelope::Envelope;
pub use error::{Error, Result};
