//! Copy every chain from one store into another, across backends.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::time::Duration;

use chainsync::config::TransferSettings;
use chainsync::domain::{StoreTransfer, TransferOptions, TransferReport};
use chainsync::outbound::persistence::{StoreLocation, open_chain_repository};
use clap::Parser;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_POOL_SIZE: u32 = 4;

/// `store-transfer` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "store-transfer",
    about = "Copy chains, devices and feed blobs from one chain store into another",
    version
)]
struct CliArgs {
    /// Store to copy from. Falls back to `CHAINSYNC_TRANSFER_SOURCE_URL`.
    #[arg(long = "source", value_name = "url")]
    source: Option<String>,
    /// Store to copy into. Falls back to `CHAINSYNC_TRANSFER_DESTINATION_URL`.
    #[arg(long = "destination", value_name = "url")]
    destination: Option<String>,
    /// Copy read marks too. Falls back to
    /// `CHAINSYNC_TRANSFER_TRANSFER_READ_MARKS`.
    #[arg(long = "transfer-read-marks")]
    transfer_read_marks: bool,
}

/// Locations and options after merging flags over the environment.
#[derive(Debug)]
struct TransferPlan {
    source: StoreLocation,
    destination: StoreLocation,
    options: TransferOptions,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = TransferSettings::load_from_iter([OsString::from("store-transfer")])
        .map_err(|error| io::Error::other(format!("load transfer settings: {error}")))?;
    let plan = resolve_plan(args, settings)?;
    if plan.source == plan.destination {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "source and destination must be different stores",
        ));
    }

    info!(
        source = %plan.source,
        destination = %plan.destination,
        transfer_read_marks = plan.options.transfer_read_marks,
        "starting store transfer"
    );

    let source = open_chain_repository(&plan.source, TRANSFER_POOL_SIZE, CONNECTION_TIMEOUT)
        .await
        .map_err(|error| io::Error::other(format!("open source store: {error}")))?;
    let destination =
        open_chain_repository(&plan.destination, TRANSFER_POOL_SIZE, CONNECTION_TIMEOUT)
            .await
            .map_err(|error| io::Error::other(format!("open destination store: {error}")))?;

    let report = StoreTransfer::new(source.as_ref(), destination.as_ref(), plan.options)
        .run()
        .await
        .map_err(|error| io::Error::other(format!("transfer failed: {error}")))?;

    write_report(&report, &mut io::stdout().lock())
}

fn write_report(report: &TransferReport, out: &mut impl Write) -> io::Result<()> {
    info!(
        users = report.users,
        devices = report.devices,
        feed_blobs = report.feed_blobs,
        read_marks = report.read_marks,
        "store transfer finished"
    );
    writeln!(out, "users={}", report.users)?;
    writeln!(out, "devices={}", report.devices)?;
    writeln!(out, "feed_blobs={}", report.feed_blobs)?;
    writeln!(out, "read_marks={}", report.read_marks)
}

fn resolve_plan(args: CliArgs, settings: TransferSettings) -> io::Result<TransferPlan> {
    let merged = TransferSettings {
        source_url: args.source.or(settings.source_url),
        destination_url: args.destination.or(settings.destination_url),
        transfer_read_marks: args.transfer_read_marks || settings.transfer_read_marks,
    };
    let invalid = |error: String| io::Error::new(io::ErrorKind::InvalidInput, error);

    Ok(TransferPlan {
        source: merged.source().map_err(|error| invalid(format!("source: {error}")))?,
        destination: merged
            .destination()
            .map_err(|error| invalid(format!("destination: {error}")))?,
        options: merged.options(),
    })
}
