//! IMAP search client
//!
//! Wraps `async-imap` into a small client that connects to a mailbox
//! server, opens a mailbox read-only, and searches it for messages
//! whose subject contains a search term.
//!
//! A client connects at most once; [`SearchClient::close`] must be
//! called (or the client dropped) to release the connection, after
//! which a fresh `connect` is allowed again.

use crate::config::ClientOptions;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::filter;
use crate::stream::MaybeTlsStream;
use async_imap::Session;
use futures::StreamExt;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info, warn};

type ImapSession = Session<Compat<MaybeTlsStream>>;

/// Capacity of the buffer between the fetch producer and the filter
/// consumer. The consumer always drains the channel to completion, so
/// the producer can never block on a full buffer indefinitely.
const FETCH_BUFFER: usize = 10;

/// A selected mailbox and its message count at selection time.
///
/// The count is a snapshot; it is not refreshed if the mailbox changes
/// while the session is open. Re-selecting replaces the handle.
#[derive(Debug, Clone)]
pub struct MailboxHandle {
    pub name: String,
    pub exists: u32,
}

/// Read-only IMAP client that searches one mailbox per invocation.
pub struct SearchClient {
    options: ClientOptions,
    session: Option<ImapSession>,
    user: Option<String>,
}

impl SearchClient {
    /// Create a client targeting the given server. Performs no I/O.
    #[must_use]
    pub const fn new(options: ClientOptions) -> Self {
        Self {
            options,
            session: None,
            user: None,
        }
    }

    /// The `host:port` address this client targets.
    #[must_use]
    pub fn server_address(&self) -> &str {
        &self.options.server
    }

    /// Whether a live, authenticated session exists.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The username of the live session, if connected.
    #[must_use]
    pub fn authenticated_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Dial the server and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyConnected`] if a session is live,
    /// [`Error::Connection`] if the dial fails or times out,
    /// [`Error::Tls`] if the handshake fails, and
    /// [`Error::Authentication`] with the server's literal rejection
    /// text if the credentials are refused.
    pub async fn connect(&mut self, username: &str, password: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyConnected(self.options.server.clone()));
        }

        debug!("Connecting to IMAP server at {}", self.options.server);
        let stream = self.dial().await?;

        let client = async_imap::Client::new(stream.compat());
        let session = client
            .login(username, password)
            .await
            .map_err(|(e, _)| match e {
                async_imap::error::Error::No(reason) => Error::Authentication(reason),
                other => Error::Connection {
                    server: self.options.server.clone(),
                    reason: other.to_string(),
                },
            })?;

        info!("Connected to {} as {}", self.options.server, username);
        self.session = Some(session);
        self.user = Some(username.to_string());
        Ok(())
    }

    /// Log out and drop the connection.
    ///
    /// Safe to call when not connected. After this, `is_connected` is
    /// false, `authenticated_user` is `None`, and `connect` may be
    /// called again.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.logout().await.ok();
            debug!("Closed connection to {}", self.options.server);
        }
        self.user = None;
    }

    /// Open a mailbox read-only and snapshot its message count.
    ///
    /// Uses EXAMINE, so no flags are set and nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a live session, or
    /// [`Error::OpenMailbox`] naming the server, user, mailbox, and
    /// cause when the mailbox cannot be opened.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxHandle> {
        let server = self.options.server.clone();
        let username = self.user.clone().unwrap_or_default();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::NotConnected(server.clone()))?;

        let status = session
            .examine(mailbox)
            .await
            .map_err(|e| Error::OpenMailbox {
                server,
                username,
                mailbox: mailbox.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Selected mailbox {} with {} messages", mailbox, status.exists);
        Ok(MailboxHandle {
            name: mailbox.to_string(),
            exists: status.exists,
        })
    }

    /// Search a mailbox for messages whose subject contains `term`.
    ///
    /// Fetches envelope metadata for every message in the mailbox and
    /// filters by literal substring match, preserving sequence order.
    /// An empty mailbox or a term with no matches yields an empty
    /// vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns the [`select`](Self::select) errors, or [`Error::Fetch`]
    /// on a transport failure mid-fetch (partial results are dropped).
    pub async fn search_mailbox(&mut self, mailbox: &str, term: &str) -> Result<Vec<Envelope>> {
        let handle = self.select(mailbox).await?;
        if handle.exists == 0 {
            info!("Mailbox {} is empty", handle.name);
            return Ok(Vec::new());
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.options.server.clone()))?;

        // Full range, 1..=EXISTS. Envelope metadata only, no bodies.
        let range = format!("1:{}", handle.exists);
        let matches = fetch_and_filter(session, &range, term).await?;

        info!(
            "Found {} of {} messages matching {:?} in {}",
            matches.len(),
            handle.exists,
            term,
            handle.name
        );
        Ok(matches)
    }

    // -- private helpers --

    async fn dial(&self) -> Result<MaybeTlsStream> {
        let connection_error = |reason: String| Error::Connection {
            server: self.options.server.clone(),
            reason,
        };

        let tcp = timeout(
            self.options.timeout,
            TcpStream::connect(&self.options.server),
        )
        .await
        .map_err(|_| {
            connection_error(format!(
                "dial timed out after {:?}",
                self.options.timeout
            ))
        })?
        .map_err(|e| connection_error(e.to_string()))?;

        if !self.options.use_tls {
            return Ok(MaybeTlsStream::Plain(tcp));
        }

        let connector = self.tls_connector();
        let server_name = ServerName::try_from(self.options.host().to_string())
            .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
        let tls_stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;

        Ok(MaybeTlsStream::Tls(Box::new(tls_stream)))
    }

    fn tls_connector(&self) -> TlsConnector {
        let config = if self.options.skip_verify {
            warn!(
                "Skipping TLS certificate verification for {}",
                self.options.server
            );
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
                .with_no_client_auth()
        } else {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };
        TlsConnector::from(Arc::new(config))
    }
}

/// Stream envelopes from the server and filter them by subject.
///
/// The producer drives the FETCH stream and sends tagged outcomes into
/// a bounded channel; the consumer drains the channel to completion,
/// keeping matches and recording the first failure. Merging data and
/// completion into one channel means the producer can never be stuck
/// on a full buffer while the consumer waits on a completion signal.
async fn fetch_and_filter(
    session: &mut ImapSession,
    range: &str,
    term: &str,
) -> Result<Vec<Envelope>> {
    let (tx, mut rx) = mpsc::channel::<Result<Envelope>>(FETCH_BUFFER);

    let producer = async move {
        let mut messages = match session.fetch(range, "ENVELOPE").await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(Err(Error::Fetch(e.to_string()))).await;
                return;
            }
        };

        while let Some(item) = messages.next().await {
            let outcome = item
                .map(|msg| Envelope::from_fetch(&msg))
                .map_err(|e| Error::Fetch(e.to_string()));
            let failed = outcome.is_err();
            // A send error means the consumer is gone; a fetch error
            // aborts the remaining sequence.
            if tx.send(outcome).await.is_err() || failed {
                break;
            }
        }
    };

    let consumer = async move {
        let mut matches = Vec::new();
        let mut failure = None;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(envelope) => {
                    if filter::subject_matches(&envelope.subject, term) {
                        matches.push(envelope);
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        failure.map_or(Ok(matches), Err)
    };

    let ((), outcome) = tokio::join!(producer, consumer);
    outcome
}

/// Certificate verifier that accepts all certificates
/// (for `--skip-verify` against self-signed servers).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
