pub mod queries;
mod schema;

pub use queries::{BookFilter, BookOrder, BookQuery, CountFilter, GroupSource};
pub use schema::Database;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Author reference attached to a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    /// Author row id.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// One stored file of a book (`data` table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    /// Calibre format code, e.g. `EPUB`.
    pub format: String,
    /// File name stem inside the book directory.
    pub name: String,
}

/// Book with everything a feed entry needs.
#[derive(Debug, Clone)]
pub struct BookSummary {
    /// Book row id.
    pub id: i64,
    /// Calibre book UUID.
    pub uuid: Option<String>,
    /// Title.
    pub title: String,
    /// Directory of the book, relative to the library root.
    pub path: String,
    /// Last metadata modification.
    pub last_modified: Option<DateTime<Utc>>,
    /// Authors in link order.
    pub authors: Vec<AuthorRef>,
    /// Comment/description (HTML).
    pub comment: Option<String>,
    /// Stored files in format order.
    pub files: Vec<ContentFile>,
}

/// Minimal book row used by file handlers.
#[derive(Debug, Clone)]
pub struct BookRecord {
    /// Book row id.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Directory of the book, relative to the library root.
    pub path: String,
}

/// A named category (author, tag or series) with its book count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Row id of the category.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Number of books linked to it.
    pub count: i64,
}

/// Parse a Calibre timestamp column.
///
/// Calibre writes `2023-04-01 10:12:13.123456+00:00`; older libraries and
/// hand-edited databases also contain RFC 3339 or zone-less values.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
