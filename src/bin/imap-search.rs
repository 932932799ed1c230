#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI to connect to an IMAP mailbox and search it.
//!
//! Every flag can also be supplied through an `IMAP_CLI_`-prefixed
//! environment variable or a `.imap-cli.yaml` config file. Explicit
//! flags win over environment variables, which win over the file.

use clap::{Parser, Subcommand};
use imap_search::{
    parse_duration, report, ClientOptions, Error, FileConfig, SearchClient, DEFAULT_TIMEOUT,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imap-search")]
#[command(version)]
#[command(
    about = "A CLI to connect to an IMAP mailbox and search it.",
    long_about = "Enables quick searching of an IMAP mailbox. This can be useful in \
                  automated environments, like CI/CD pipelines, to check if a mail \
                  arrived in the given inbox.\n\n\
                  Usage example:\n\
                  imap-search --server \"my-server:993\" --username username \
                  --password password --tls search \"my mail\""
)]
struct Args {
    /// Config file (default is .imap-cli.yaml in the current or home directory)
    #[arg(long, global = true, env = "IMAP_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Mail server including port, e.g. --server=imap.my-server.com:143
    #[arg(long, short = 's', global = true, env = "IMAP_CLI_SERVER")]
    server: Option<String>,

    /// Username to use for the connection, e.g. --username=admin
    #[arg(long, short = 'u', global = true, env = "IMAP_CLI_USERNAME")]
    username: Option<String>,

    /// Password of the username, e.g. --password=my-password
    #[arg(long, short = 'p', global = true, env = "IMAP_CLI_PASSWORD")]
    password: Option<String>,

    /// Connect using TLS
    #[arg(long, global = true, env = "IMAP_CLI_TLS")]
    tls: bool,

    /// Skip the verification of the server certificate
    #[arg(long = "skip-verify", global = true, env = "IMAP_CLI_SKIP_VERIFY")]
    skip_verify: bool,

    /// Timeout for the connection to the mail server, e.g. 5s or 500ms
    #[arg(long, global = true, env = "IMAP_CLI_TIMEOUT")]
    timeout: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Searches a mailbox for mails matching a subject
    Search {
        /// Search term matched against message subjects
        term: String,

        /// Name of the mailbox
        #[arg(long, short = 'm', env = "IMAP_CLI_MAILBOX")]
        mailbox: Option<String>,

        /// Exit with an error code if no mails are found
        #[arg(long = "no-results-error", short = 'e', env = "IMAP_CLI_NO_RESULTS_ERROR")]
        no_results_error: bool,
    },
}

/// Fully resolved invocation settings, merged from flags, environment,
/// and config file. Built once and passed through the pipeline; no
/// process-wide mutable state.
struct Settings {
    server: String,
    username: String,
    password: String,
    mailbox: String,
    tls: bool,
    skip_verify: bool,
    timeout: Duration,
    no_results_error: bool,
    term: String,
}

impl Settings {
    fn resolve(args: Args, file: FileConfig) -> anyhow::Result<Self> {
        let Command::Search {
            term,
            mailbox,
            no_results_error,
        } = args.command;

        let timeout = match args.timeout.or(file.timeout) {
            Some(raw) => parse_duration(&raw)?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            server: required("server", args.server, file.server)?,
            username: required("username", args.username, file.username)?,
            password: required("password", args.password, file.password)?,
            mailbox: mailbox
                .or(file.mailbox)
                .unwrap_or_else(|| "INBOX".to_string()),
            tls: args.tls || file.tls.unwrap_or(false),
            skip_verify: args.skip_verify || file.skip_verify.unwrap_or(false),
            timeout,
            no_results_error: no_results_error || file.no_results_error.unwrap_or(false),
            term,
        })
    }
}

fn required(name: &str, flag: Option<String>, file: Option<String>) -> Result<String, Error> {
    flag.or(file)
        .ok_or_else(|| Error::Config(format!("required flag {name:?} not set")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Environment variables may come from a local .env file.
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let (file, config_path) = match FileConfig::load(args.config.as_deref())? {
        Some((file, path)) => (file, Some(path)),
        None => (FileConfig::default(), None),
    };
    if let Some(path) = &config_path {
        println!("Using config file: \"{}\"", path.display());
    }

    let settings = Settings::resolve(args, file)?;
    run_search(&settings).await
}

async fn run_search(settings: &Settings) -> anyhow::Result<()> {
    let options = ClientOptions {
        server: settings.server.clone(),
        use_tls: settings.tls,
        skip_verify: settings.skip_verify,
        timeout: settings.timeout,
    };

    let mut client = SearchClient::new(options);
    client.connect(&settings.username, &settings.password).await?;

    // Always close the connection, even when the search fails.
    let outcome = client
        .search_mailbox(&settings.mailbox, &settings.term)
        .await;
    client.close().await;
    let matches = outcome?;

    report::report(
        &mut std::io::stdout(),
        &matches,
        &settings.term,
        settings.no_results_error,
    )?;
    Ok(())
}
