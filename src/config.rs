use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Read-only OPDS catalog for a Calibre library.
#[derive(Parser, Debug, Clone)]
#[command(name = "calibre-opds")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "CALIBRE_OPDS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Port to listen on (overrides the port of the bind address).
        #[arg(short, long, env = "CALIBRE_OPDS_PORT")]
        port: Option<u16>,

        /// Root directory of the Calibre library.
        #[arg(short, long, env = "CALIBRE_LIBRARY")]
        library: Option<PathBuf>,
    },

    /// Write a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Calibre library location.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// JSON API settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Catalog title, used in the root feed and the OpenSearch description.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        7777,
    )
}

fn default_title() -> String {
    "Calibre Library".to_string()
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory of the Calibre library (contains `metadata.db`).
    #[serde(default = "default_library_path")]
    pub path: PathBuf,

    /// Metadata database file, relative to the library root unless absolute.
    #[serde(default = "default_database_file")]
    pub database: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
            database: default_database_file(),
        }
    }
}

fn default_library_path() -> PathBuf {
    PathBuf::from("/books")
}

fn default_database_file() -> PathBuf {
    PathBuf::from("metadata.db")
}

impl LibraryConfig {
    /// Full path to the metadata database.
    pub fn database_path(&self) -> PathBuf {
        self.path.join(&self.database)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Number of read-only connections kept open.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize {
    4
}

/// JSON API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Page size when `limit` is not given.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Upper bound for `limit`.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> u32 {
    20
}

fn default_max_limit() -> u32 {
    200
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("calibre-opds.toml"),
            dirs::config_dir()
                .map(|p| p.join("calibre-opds").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/calibre-opds/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Apply command line overrides and normalize the library root.
    ///
    /// Runs once at startup; the rest of the process only sees the
    /// absolute library path.
    pub fn finalize(
        mut self,
        bind: Option<SocketAddr>,
        port: Option<u16>,
        library: Option<PathBuf>,
    ) -> crate::error::Result<Self> {
        if let Some(addr) = bind {
            self.server.bind = addr;
        }
        if let Some(port) = port {
            self.server.bind.set_port(port);
        }
        if let Some(path) = library {
            self.library.path = path;
        }

        self.library.path = std::path::absolute(&self.library.path).map_err(|e| {
            crate::error::AppError::Config(format!(
                "Invalid library path {}: {}",
                self.library.path.display(),
                e
            ))
        })?;

        if self.database.pool_size == 0 {
            return Err(crate::error::AppError::Config(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.api.default_limit == 0 || self.api.default_limit > self.api.max_limit {
            return Err(crate::error::AppError::Config(format!(
                "api.default_limit must be between 1 and api.max_limit ({})",
                self.api.max_limit
            )));
        }

        Ok(self)
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# calibre-opds configuration

[server]
bind = "0.0.0.0:7777"
title = "Calibre Library"

[library]
# Root of the Calibre library (the directory holding metadata.db)
path = "/books"
# database = "metadata.db"

[database]
# Number of read-only connections to the metadata database
pool_size = 4

[api]
# Default and maximum page size for /api/books
default_limit = 20
max_limit = 200
"#
        .to_string()
    }
}
