//! In-process fake IMAP server for integration testing
//!
//! Speaks just enough IMAP (RFC 3501) to exercise `SearchClient`'s
//! full lifecycle:
//!
//! ```text
//!   Client connects via TCP (optionally with a TLS handshake first)
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client issues EXAMINE and FETCH n:m ENVELOPE
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! Every client command starts with a **tag** the client chooses
//! (async-imap uses `A0001`, `A0002`, ...). The server echoes the tag
//! in its completion response; lines prefixed with `*` are untagged
//! data responses sent before the final tagged OK/NO/BAD:
//!
//! ```text
//!   Client:  A0002 EXAMINE "INBOX"
//!   Server:  * 1 EXISTS
//!   Server:  A0002 OK [READ-ONLY] EXAMINE completed
//! ```
//!
//! ENVELOPE responses fit on one line, so no literal handling is
//! needed anywhere.

use super::handlers::{
    handle_capability, handle_fetch, handle_login, handle_logout, handle_select,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::core::AString;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use imap_codec::CommandCodec;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server on localhost with an OS-assigned port.
///
/// [`FakeImapServer::start`] serves plain TCP, matching the client's
/// default transport. [`FakeImapServer::start_tls`] wraps each
/// connection in TLS with a self-signed certificate generated at
/// startup via `rcgen` (the client must skip verification).
pub struct FakeImapServer {
    port: u16,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a plain-TCP fake IMAP server with the given mailbox state.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_inner(mailbox, false).await
    }

    /// Start a TLS fake IMAP server with the given mailbox state.
    pub async fn start_tls(mailbox: Mailbox) -> Self {
        Self::start_inner(mailbox, true).await
    }

    async fn start_inner(mailbox: Mailbox, tls: bool) -> Self {
        // Ensure the ring crypto provider is installed process-wide.
        // Multiple tests may race to install it, so we ignore the
        // error if it's already set.
        let _ = rustls::crypto::ring::default_provider().install_default();

        // Bind to any available port on localhost.
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = tls.then(build_tls_acceptor);
        let mailbox = Arc::new(mailbox);

        // Spawn the accept loop. Each incoming connection gets its
        // own task that runs the IMAP command loop.
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let mailbox = mailbox.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            let Ok(tls_stream) = acceptor.accept(stream).await else {
                                return;
                            };
                            handle_imap_session(tls_stream, &mailbox).await;
                        }
                        None => handle_imap_session(stream, &mailbox).await,
                    }
                });
            }
        });

        Self {
            port,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` address clients should dial.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

/// Generate a self-signed certificate for 127.0.0.1 and build a TLS
/// acceptor around it. No cert files are needed.
fn build_tls_acceptor() -> TlsAcceptor {
    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");

    let cert_der = cert.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der.into())
        .expect("build server TLS config");

    TlsAcceptor::from(Arc::new(tls_config))
}

/// Extract the folder name from a parsed `imap_types::Mailbox`.
fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Decode an `AString` (atom, quoted, or literal) to text.
fn astring_text(value: &AString<'_>) -> String {
    let bytes: &[u8] = value.as_ref();
    String::from_utf8_lossy(bytes).into_owned()
}

/// Run the IMAP command loop over an established stream.
///
/// Sends the greeting, then uses `imap-codec`'s `CommandCodec` to
/// parse each client command into a strongly-typed `Command` and
/// dispatches on the `CommandBody` variant.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(stream: S, mailbox: &Mailbox) {
    let mut reader = BufReader::new(stream);
    let mut selected_folder: Option<String> = None;
    let codec = CommandCodec::default();

    // RFC 3501 Section 7.1.1: server greeting
    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        match command.body {
            CommandBody::Capability => {
                handle_capability(tag, &mut reader).await;
            }
            CommandBody::Login { username, password } => {
                let username = astring_text(&username);
                let password = astring_text(password.declassify());
                handle_login(tag, &username, &password, &mut reader).await;
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                selected_folder = handle_select(tag, &name, false, mailbox, &mut reader).await;
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                selected_folder = handle_select(tag, &name, true, mailbox, &mut reader).await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: false,
                ..
            } => {
                let alive = handle_fetch(
                    tag,
                    &sequence_set,
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
                // A folder configured to fail mid-fetch kills the
                // whole connection, like a real transport fault.
                if !alive {
                    break;
                }
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}
