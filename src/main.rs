//! Onboarding tracker server and operator CLI.

use anyhow::{Context, Result};
use clap::Parser;
use flate2::Compression;
use flate2::write::GzEncoder;
use onboard_tracker::blob::{BlobStore, FsBlobStore};
use onboard_tracker::cli::export::ExportArgs;
use onboard_tracker::cli::{AddStaffArgs, Cli, Command, SummaryArgs};
use onboard_tracker::config::{Config, ConfigLoader, ConfigPaths};
use onboard_tracker::dashboard::{DashboardServer, start_server};
use onboard_tracker::db::Database;
use onboard_tracker::format::{OutputFormat, format_overview_markdown};
use onboard_tracker::logging;
use onboard_tracker::service::OnboardingService;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `--config` wins over ONBOARD_CONFIG_PATH
    let mut loader = match &cli.config {
        Some(path) => {
            ConfigLoader::load_with_explicit(Some(PathBuf::from(path)), ConfigPaths::discover())?
        }
        None => ConfigLoader::load()?,
    };

    logging::init(&cli.log, cli.verbose, &loader.config().server.log_dir)?;
    for path in loader.skipped_files() {
        warn!("Ignored unusable config file {}", path.display());
    }
    if let Some(path) = loader.config_path() {
        info!("Using config file {}", path.display());
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(blob_dir) = &cli.blob_dir {
        config.server.blob_dir = blob_dir.into();
    }
    if let Some(port) = cli.port {
        config.server.http.port = port;
    }
    let config = loader.into_config();

    match cli.command {
        Some(Command::Export(args)) => run_export(&config, args),
        Some(Command::Summary(args)) => run_summary(config, args),
        Some(Command::AddStaff(args)) => run_add_staff(config, args),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("Failed to open {}", config.server.db_path.display()))?;
    Ok(Arc::new(db))
}

/// Service wired to the filesystem blob store.
fn build_service(config: Config) -> Result<(OnboardingService, Arc<FsBlobStore>)> {
    let db = open_database(&config)?;
    config.ensure_blob_dir()?;
    let files = Arc::new(FsBlobStore::new(
        &config.server.blob_dir,
        &config.server.public_base_url,
    ));
    let blobs: Arc<dyn BlobStore> = files.clone();
    Ok((OnboardingService::new(db, blobs, Arc::new(config)), files))
}

async fn run_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.http.host, config.server.http.port)
        .parse()
        .context("Invalid HTTP listen address")?;
    info!(
        db = %config.server.db_path.display(),
        blobs = %config.server.blob_dir.display(),
        "Starting onboarding tracker"
    );

    let (service, files) = build_service(config)?;
    let handle = start_server(DashboardServer::new(service, Some(files)), addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    handle.shutdown().await;
    Ok(())
}

fn run_summary(config: Config, args: SummaryArgs) -> Result<()> {
    let (service, _) = build_service(config)?;
    let overview = service.operator_summary()?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&overview)?),
        OutputFormat::Markdown => {
            print!("{}", format_overview_markdown(&overview, service.phases()))
        }
    }
    Ok(())
}

fn run_add_staff(config: Config, args: AddStaffArgs) -> Result<()> {
    let (service, _) = build_service(config)?;
    let staff = service.bootstrap_staff(&args.email, &args.name, args.role.into())?;
    eprintln!("Added {} ({}) as {}", staff.name, staff.email, staff.role.as_str());
    Ok(())
}

fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let db = open_database(config)?;
    let snapshot = db.export_snapshot(args.tables_to_export().as_deref())?;

    let json_output = snapshot.to_json_pretty()?;
    let json_bytes = json_output.as_bytes();
    let should_compress = args.should_compress(Some(json_bytes.len() as u64));

    match (&args.output, should_compress) {
        (Some(path), true) => {
            let file = std::fs::File::create(path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(json_bytes)?;
            encoder.finish()?.sync_all()?;
            eprintln!("Exported {} rows to {} (gzipped)", snapshot.row_count(), path.display());
        }
        (Some(path), false) => {
            std::fs::write(path, &json_output)?;
            eprintln!("Exported {} rows to {}", snapshot.row_count(), path.display());
        }
        (None, true) => {
            let stdout = std::io::stdout();
            let mut encoder = GzEncoder::new(stdout.lock(), Compression::default());
            encoder.write_all(json_bytes)?;
            encoder.finish()?.flush()?;
        }
        (None, false) => print!("{}", json_output),
    }

    Ok(())
}
