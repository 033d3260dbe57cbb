//! Configuration for PostVault
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a PostVault instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Interface to listen on
    pub host: String,

    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Name clients must send in the `Host` header
    pub server_name: String,

    // -------------------------------------------------------------------------
    // Protocol Limits
    // -------------------------------------------------------------------------
    /// Max bytes in the request line or any single header line
    pub max_line_bytes: usize,

    /// Max number of header lines per request
    pub max_header_lines: usize,

    /// Max accepted `Content-Length`
    pub max_body_bytes: usize,

    // -------------------------------------------------------------------------
    // Ingestion Configuration
    // -------------------------------------------------------------------------
    /// Number of records the collector holds when full
    pub collector_target: usize,

    /// Throttle applied to every single-record ingestion
    pub ingest_delay: Duration,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Which storage executor serves the REST surface
    pub backend: Backend,

    /// Root directory for all output files
    /// Internal structure:
    ///   {target_dir}/
    ///     ├── reddit-YYYYMMDDHHMM.txt   (text backend)
    ///     ├── reddit.db                 (sql backend, default url)
    ///     └── documents/                (document backend journals)
    pub target_dir: PathBuf,

    /// SQLite connection url; derived from `target_dir` when unset
    pub database_url: Option<String>,

    /// Wipe any state left by a previous run on startup
    pub clean_slate: bool,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One delimited line per record in a timestamped text file
    Text,

    /// `users` + `posts` tables in SQLite
    Sql,

    /// `users` + `posts` collections in the embedded document store
    Document,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8087,
            server_name: "reddit-scraper".to_string(),
            max_line_bytes: 64 * 1024,
            max_header_lines: 50,
            max_body_bytes: 1024 * 1024, // 1 MB
            collector_target: 500,
            ingest_delay: Duration::from_secs(10),
            backend: Backend::Text,
            target_dir: PathBuf::from("./output"),
            database_url: None,
            clean_slate: false,
        }
    }
}

impl Config {
    const DOCUMENT_DIR: &'static str = "documents";
    const DATABASE_FILE: &'static str = "reddit.db";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `host:port` string for binding the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Directory holding the document store journals
    pub fn document_dir(&self) -> PathBuf {
        self.target_dir.join(Self::DOCUMENT_DIR)
    }

    /// Connection url for the SQL backend
    pub fn sqlite_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                self.target_dir.join(Self::DATABASE_FILE).display()
            ),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the listen interface
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the name expected in the `Host` header
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.max_line_bytes = bytes;
        self
    }

    pub fn max_header_lines(mut self, lines: usize) -> Self {
        self.config.max_header_lines = lines;
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    /// Set how many records fill the collector
    pub fn collector_target(mut self, count: usize) -> Self {
        self.config.collector_target = count;
        self
    }

    /// Set the single-record ingestion delay
    pub fn ingest_delay(mut self, delay: Duration) -> Self {
        self.config.ingest_delay = delay;
        self
    }

    /// Select the storage backend
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the output directory (root for all storage)
    pub fn target_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.target_dir = path.into();
        self
    }

    /// Set an explicit SQLite url
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Opt in to wiping previous output on startup
    pub fn clean_slate(mut self, enabled: bool) -> Self {
        self.config.clean_slate = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
