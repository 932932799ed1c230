//! Message envelope metadata
//!
//! The search pipeline fetches ENVELOPE data only, never message
//! bodies. Only the subject participates in filtering; sender and date
//! are carried along for display.

use async_imap::types::Fetch;

/// Envelope metadata for one fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message sequence number at selection time.
    pub seq: u32,
    /// Subject line, decoded lossily from the raw envelope bytes. A
    /// message without a subject yields an empty string.
    pub subject: String,
    /// First `From` address in `mailbox@host` form, if present.
    pub from: Option<String>,
    /// Raw RFC 2822 date header, if present.
    pub date: Option<String>,
}

impl Envelope {
    /// Extract envelope metadata from a FETCH response.
    pub(crate) fn from_fetch(fetch: &Fetch) -> Self {
        let mut subject = String::new();
        let mut from = None;
        let mut date = None;

        if let Some(envelope) = fetch.envelope() {
            if let Some(raw) = envelope.subject.as_ref() {
                subject = String::from_utf8_lossy(raw).into_owned();
            }
            from = envelope.from.as_ref().and_then(|addresses| {
                addresses.iter().find_map(|address| {
                    let mailbox = address.mailbox.as_ref()?;
                    let host = address.host.as_ref()?;
                    Some(format!(
                        "{}@{}",
                        String::from_utf8_lossy(mailbox),
                        String::from_utf8_lossy(host)
                    ))
                })
            });
            date = envelope
                .date
                .as_ref()
                .map(|raw| String::from_utf8_lossy(raw).into_owned());
        }

        Self {
            seq: fetch.message,
            subject,
            from,
            date,
        }
    }
}
