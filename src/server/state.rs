//! Application state shared across handlers.

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::media;
use std::path::Path;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Catalog database.
    pub db: Database,
    /// Encoded placeholder cover, rendered once at startup.
    placeholder: Arc<Vec<u8>>,
}

impl AppState {
    /// Create application state over an opened catalog.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            db,
            placeholder: Arc::new(media::placeholder_cover()?),
        })
    }

    /// Absolute root of the Calibre library.
    pub fn library_root(&self) -> &Path {
        &self.config.library.path
    }

    /// Catalog title.
    pub fn title(&self) -> &str {
        &self.config.server.title
    }

    /// JPEG bytes of the placeholder cover.
    pub fn placeholder(&self) -> &[u8] {
        &self.placeholder
    }
}
