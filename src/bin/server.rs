//! PostVault Server Binary
//!
//! Starts the REST server. Pending records are seeded from a file of
//! delimited lines, one record per line.

use std::path::Path;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use postvault::{open_executor, Backend, Collector, Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// PostVault Server
#[derive(Parser, Debug)]
#[command(name = "postvault-server")]
#[command(about = "REST service over scraped post records")]
#[command(version)]
struct Args {
    /// Interface to listen on
    #[arg(long, env = "POSTVAULT_HOST", default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "POSTVAULT_PORT", default_value_t = 8087)]
    port: u16,

    /// Name clients must send in the Host header
    #[arg(long, env = "POSTVAULT_SERVER_NAME", default_value = "reddit-scraper")]
    server_name: String,

    /// Output directory for every backend
    #[arg(short, long, env = "POSTVAULT_TARGET_DIR", default_value = "./output")]
    target_dir: String,

    /// Number of records the collector holds
    #[arg(short, long, env = "POSTVAULT_NUMBER", default_value_t = 500)]
    number: usize,

    /// Storage backend
    #[arg(short, long, env = "POSTVAULT_BACKEND", value_enum, default_value_t = BackendArg::Text)]
    backend: BackendArg,

    /// SQLite url for the sql backend
    #[arg(long, env = "POSTVAULT_DATABASE_URL")]
    database_url: Option<String>,

    /// Delay applied to every single-record ingestion, in milliseconds
    #[arg(long, env = "POSTVAULT_INGEST_DELAY_MS", default_value_t = 10_000)]
    ingest_delay_ms: u64,

    /// Remove output left by a previous run before starting
    #[arg(long, env = "POSTVAULT_CLEAN_SLATE")]
    clean_slate: bool,

    /// File of record lines to seed the collector with
    #[arg(short, long, env = "POSTVAULT_SEED_FILE")]
    seed_file: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Text,
    Sql,
    Document,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Text => Backend::Text,
            BackendArg::Sql => Backend::Sql,
            BackendArg::Document => Backend::Document,
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,postvault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("PostVault Server v{}", postvault::VERSION);
    tracing::info!("Target directory: {}", args.target_dir);
    tracing::info!("Backend: {:?}", args.backend);

    // Build config from args
    let mut builder = Config::builder()
        .host(&args.host)
        .port(args.port)
        .server_name(&args.server_name)
        .target_dir(&args.target_dir)
        .collector_target(args.number)
        .backend(args.backend.into())
        .ingest_delay(Duration::from_millis(args.ingest_delay_ms))
        .clean_slate(args.clean_slate);
    if let Some(url) = &args.database_url {
        builder = builder.database_url(url);
    }
    let config = builder.build();

    let mut collector = Collector::new(config.collector_target);
    if let Some(path) = &args.seed_file {
        match seed(&mut collector, Path::new(path)) {
            Ok(count) => tracing::info!("Seeded {} records from {}", count, path),
            Err(e) => {
                tracing::error!("Failed to read seed file {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    // Open storage
    let executor = match open_executor(&config) {
        Ok(executor) => executor,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    // Start server
    let server = match Server::bind(&config, collector, executor) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Hand every non-empty line of `path` to the collector
fn seed(collector: &mut Collector, path: &Path) -> std::io::Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    let mut count = 0;

    for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if collector.is_full() {
            tracing::warn!("Collector full at {} records, ignoring the rest", collector.len());
            break;
        }
        if collector.collect(line) {
            count += 1;
        }
    }
    Ok(count)
}
