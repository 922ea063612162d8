//! calibre-opds: a read-only OPDS catalog over a Calibre library.
//!
//! The server opens a Calibre `metadata.db` read-only and exposes it as
//! crawlable, paginated OPDS 1.2 Atom feeds for e-reader apps, plus a small
//! JSON API for web front-ends.
//!
//! # Features
//!
//! - Navigation by author, popular tag, unique tag and series
//! - Title and newest-first orderings
//! - Search over titles and author names
//! - Cover images with conditional GET
//! - Downloads of every stored format

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Browsing axes, orderings and book listings.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Calibre database access.
pub mod db;
/// Error types.
pub mod error;
/// Book format table.
pub mod formats;
/// Covers and book files on disk.
pub mod media;
/// OPDS feed generation.
pub mod opds;
/// HTTP server.
pub mod server;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
