//! splitstream - stream records from the Splitwise API
//!
//! Resolves configuration and the API token, opens a connection and prints
//! the records of one collection as they arrive.

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span};

use splitstream::api::SplitwiseClient;
use splitstream::cache::ReferenceCache;
use splitstream::cli::{Cli, Request};
use splitstream::config::{Config, TOKEN_ENV_VAR};
use splitstream::connection::Connection;
use splitstream::logging::init_logging;
use splitstream::output::{drain, write_record, Summary};
use splitstream::resources::Expense;
use splitstream::stream::ResultStream;

/// Prints a stream and reports how many records were printed
async fn print_stream<T, W>(
    mut stream: ResultStream<T>,
    cli: &Cli,
    label: &str,
    keep: impl Fn(&T) -> bool,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    T: Summary + Serialize + Send + 'static,
    W: Write,
{
    let printed = drain(&mut stream, cli.take, cli.json, keep, out).await?;
    eprintln!("number of {}: {}", label, printed);

    match stream.terminal_error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn print_one<T, W>(record: &T, cli: &Cli, out: &mut W) -> Result<(), Box<dyn Error>>
where
    T: Summary + Serialize,
    W: Write,
{
    write_record(out, record, cli.json)?;
    out.flush()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    init_logging(&config.logging);

    // Validate arguments before looking for a token
    let request = Request::from_command(
        &cli.command,
        config.pagination.page_limit,
        Local::now().date_naive(),
    )?;
    let token = config.resolve_token(cli.token.as_deref(), std::env::var(TOKEN_ENV_VAR).ok())?;

    let api = SplitwiseClient::with_settings(
        token.clone(),
        config.api.base_url.clone(),
        config.timeout(),
    )?;
    let cache = match config.snapshot_store() {
        Some(snapshots) => ReferenceCache::with_snapshots(snapshots),
        None => ReferenceCache::new(),
    };
    let cache = ReferenceCache::install_global(cache);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling streams");
            interrupt.cancel();
        }
    });

    let conn = Connection::with_api(token, Arc::new(api), cancel, info_span!("splitstream"))
        .with_cache(cache)
        .with_limits(config.limits());

    if request.uses_reference_data() {
        let (currencies, categories) = conn.warm_cache().await;
        info!(
            "reference data ready: {} currencies, {} categories",
            currencies, categories
        );
    }

    let mut out = io::BufWriter::new(io::stdout());
    match request {
        Request::Expenses {
            params,
            include_payments,
        } => {
            let stream = conn.expenses(params);
            let keep = |e: &Expense| include_payments || !e.payment;
            print_stream(stream, &cli, "expenses", keep, &mut out).await
        }
        Request::Expense(id) => print_one(&conn.expense(id).await?, &cli, &mut out),
        Request::Friends => print_stream(conn.friends(), &cli, "friends", |_| true, &mut out).await,
        Request::Friend(id) => print_one(&conn.friend(id).await?, &cli, &mut out),
        Request::Groups => print_stream(conn.groups(), &cli, "groups", |_| true, &mut out).await,
        Request::Group(id) => print_one(&conn.group(id).await?, &cli, &mut out),
        Request::Notifications(params) => {
            let stream = conn.notifications(params);
            print_stream(stream, &cli, "notifications", |_| true, &mut out).await
        }
        Request::Categories => {
            let stream = conn.main_categories().await;
            print_stream(stream, &cli, "categories", |_| true, &mut out).await
        }
        Request::Category(id) => print_one(&conn.main_category(id).await?, &cli, &mut out),
        Request::Currencies => {
            let stream = conn.currencies().await;
            print_stream(stream, &cli, "currencies", |_| true, &mut out).await
        }
        Request::Currency(code) => print_one(&conn.currency(&code).await?, &cli, &mut out),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
