//! Read queries over the Calibre tables.
//!
//! Everything here takes a borrowed connection so callers can batch several
//! queries on one pooled handle inside [`Database::run`](super::Database::run).

use super::{AuthorRef, BookRecord, BookSummary, ContentFile, GroupEntry, parse_timestamp};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::HashMap;

/// Structural restriction on the book set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookFilter {
    /// Books linked to this author id.
    Author(i64),
    /// Books carrying this tag (case-insensitive exact match).
    Tag(String),
    /// Books in this series id.
    Series(i64),
}

/// Ordering applied before paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookOrder {
    /// Title sort key, A to Z.
    SortAscending,
    /// Title sort key, Z to A.
    SortDescending,
    /// Most recently added first.
    NewestFirst,
}

impl BookOrder {
    fn sql(self) -> &'static str {
        match self {
            BookOrder::SortAscending => "books.sort ASC, books.id ASC",
            BookOrder::SortDescending => "books.sort DESC, books.id DESC",
            BookOrder::NewestFirst => "books.timestamp DESC, books.id DESC",
        }
    }
}

/// A filtered, ordered window over the books table.
#[derive(Debug, Clone)]
pub struct BookQuery {
    /// Optional structural filter.
    pub filter: Option<BookFilter>,
    /// Free-text search over titles and author names.
    pub search: Option<String>,
    /// Ordering.
    pub order: BookOrder,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

impl BookQuery {
    /// Unfiltered query over the first `limit` books.
    pub fn new(order: BookOrder, limit: u64) -> Self {
        Self {
            filter: None,
            search: None,
            order,
            offset: 0,
            limit,
        }
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values = Vec::new();

        match &self.filter {
            Some(BookFilter::Author(id)) => {
                clauses.push(
                    "EXISTS (SELECT 1 FROM books_authors_link bal \
                     WHERE bal.book = books.id AND bal.author = ?)",
                );
                values.push(Value::Integer(*id));
            }
            Some(BookFilter::Tag(name)) => {
                clauses.push(
                    "EXISTS (SELECT 1 FROM books_tags_link btl JOIN tags t ON t.id = btl.tag \
                     WHERE btl.book = books.id AND unicode_lower(t.name) = ?)",
                );
                values.push(Value::Text(name.to_lowercase()));
            }
            Some(BookFilter::Series(id)) => {
                clauses.push(
                    "EXISTS (SELECT 1 FROM books_series_link bsl \
                     WHERE bsl.book = books.id AND bsl.series = ?)",
                );
                values.push(Value::Integer(*id));
            }
            None => {}
        }

        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            clauses.push(
                "(instr(unicode_lower(books.title), ?) > 0 OR EXISTS (\
                 SELECT 1 FROM books_authors_link bal JOIN authors a ON a.id = bal.author \
                 WHERE bal.book = books.id AND instr(unicode_lower(a.name), ?) > 0))",
            );
            values.push(Value::Text(needle.clone()));
            values.push(Value::Text(needle));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Number of books matching the query, ignoring offset and limit.
pub fn count_books(conn: &Connection, query: &BookQuery) -> Result<u64> {
    let (where_sql, values) = query.where_clause();
    let sql = format!("SELECT COUNT(*) FROM books{}", where_sql);
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Fetch one window of books with authors, comment and files attached.
///
/// Related rows for the whole window are loaded with one query per table.
pub fn find_books(conn: &Connection, query: &BookQuery) -> Result<Vec<BookSummary>> {
    let (where_sql, mut values) = query.where_clause();
    let sql = format!(
        "SELECT books.id, books.uuid, books.title, books.path, books.last_modified \
         FROM books{} ORDER BY {} LIMIT ? OFFSET ?",
        where_sql,
        query.order.sql()
    );
    values.push(Value::Integer(clamp_i64(query.limit)));
    values.push(Value::Integer(clamp_i64(query.offset)));

    let mut stmt = conn.prepare(&sql)?;
    let mut books = stmt
        .query_map(params_from_iter(values), |row| {
            let last_modified: Option<String> = row.get(4)?;
            Ok(BookSummary {
                id: row.get(0)?,
                uuid: row.get(1)?,
                title: row.get(2)?,
                path: row.get(3)?,
                last_modified: last_modified.as_deref().and_then(parse_timestamp),
                authors: Vec::new(),
                comment: None,
                files: Vec::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if books.is_empty() {
        return Ok(books);
    }

    let ids: Vec<i64> = books.iter().map(|b| b.id).collect();
    let mut authors = authors_by_book(conn, &ids)?;
    let mut comments = comments_by_book(conn, &ids)?;
    let mut files = files_by_book(conn, &ids)?;

    for book in &mut books {
        book.authors = authors.remove(&book.id).unwrap_or_default();
        book.comment = comments.remove(&book.id);
        book.files = files.remove(&book.id).unwrap_or_default();
    }

    Ok(books)
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `?,?,..` with one placeholder per id.
fn placeholders(ids: &[i64]) -> String {
    vec!["?"; ids.len()].join(",")
}

/// Authors of each book in link order.
fn authors_by_book(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, Vec<AuthorRef>>> {
    let sql = format!(
        "SELECT bal.book, a.id, a.name FROM books_authors_link bal \
         JOIN authors a ON a.id = bal.author \
         WHERE bal.book IN ({}) ORDER BY bal.book, bal.id",
        placeholders(ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(ids))?;

    let mut authors: HashMap<i64, Vec<AuthorRef>> = HashMap::new();
    while let Some(row) = rows.next()? {
        authors.entry(row.get(0)?).or_default().push(AuthorRef {
            id: row.get(1)?,
            name: row.get(2)?,
        });
    }
    Ok(authors)
}

fn comments_by_book(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, String>> {
    let sql = format!(
        "SELECT book, text FROM comments WHERE book IN ({})",
        placeholders(ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map(params_from_iter(ids), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(comments)
}

/// Stored files of each book in insertion order.
fn files_by_book(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, Vec<ContentFile>>> {
    let sql = format!(
        "SELECT book, format, name FROM data WHERE book IN ({}) ORDER BY book, id",
        placeholders(ids)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(ids))?;

    let mut files: HashMap<i64, Vec<ContentFile>> = HashMap::new();
    while let Some(row) = rows.next()? {
        files.entry(row.get(0)?).or_default().push(ContentFile {
            format: row.get(1)?,
            name: row.get(2)?,
        });
    }
    Ok(files)
}

/// Look up a single book row.
pub fn find_book(conn: &Connection, book_id: i64) -> Result<Option<BookRecord>> {
    let mut stmt = conn.prepare_cached("SELECT id, title, path FROM books WHERE id = ?1")?;
    Ok(stmt
        .query_row(params![book_id], |row| {
            Ok(BookRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                path: row.get(2)?,
            })
        })
        .optional()?)
}

/// Find the stored file of a book for a format code (case-insensitive).
pub fn find_content_file(
    conn: &Connection,
    book_id: i64,
    format: &str,
) -> Result<Option<ContentFile>> {
    let mut stmt = conn.prepare_cached(
        "SELECT format, name FROM data \
         WHERE book = ?1 AND unicode_lower(format) = ?2 ORDER BY id LIMIT 1",
    )?;
    Ok(stmt
        .query_row(params![book_id, format.to_lowercase()], |row| {
            Ok(ContentFile {
                format: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .optional()?)
}

/// Display name of an author.
pub fn author_name(conn: &Connection, author_id: i64) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached("SELECT name FROM authors WHERE id = ?1")?;
    Ok(stmt.query_row(params![author_id], |row| row.get(0)).optional()?)
}

/// Display name of a series.
pub fn series_name(conn: &Connection, series_id: i64) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached("SELECT name FROM series WHERE id = ?1")?;
    Ok(stmt.query_row(params![series_id], |row| row.get(0)).optional()?)
}

/// Most recent `last_modified` across all books.
pub fn latest_modification(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let latest: Option<String> =
        conn.query_row("SELECT MAX(last_modified) FROM books", [], |row| row.get(0))?;
    Ok(latest.as_deref().and_then(parse_timestamp))
}

/// Category tables that books are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSource {
    /// `authors` via `books_authors_link`.
    Authors,
    /// `tags` via `books_tags_link`.
    Tags,
    /// `series` via `books_series_link`.
    Series,
}

/// Restriction on a group's book count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter {
    /// Keep every group.
    Any,
    /// Keep groups with at least this many books.
    AtLeast(i64),
    /// Keep groups with fewer than this many books.
    Below(i64),
}

/// Categories of one kind with their live book counts.
pub fn group_counts(
    conn: &Connection,
    source: GroupSource,
    filter: CountFilter,
) -> Result<Vec<GroupEntry>> {
    let base = match source {
        GroupSource::Authors => {
            "SELECT g.id, g.name, COUNT(l.book) FROM authors g \
             LEFT JOIN books_authors_link l ON l.author = g.id \
             GROUP BY g.id, g.name"
        }
        GroupSource::Tags => {
            "SELECT g.id, g.name, COUNT(l.book) FROM tags g \
             LEFT JOIN books_tags_link l ON l.tag = g.id \
             GROUP BY g.id, g.name"
        }
        GroupSource::Series => {
            "SELECT g.id, g.name, COUNT(l.book) FROM series g \
             LEFT JOIN books_series_link l ON l.series = g.id \
             GROUP BY g.id, g.name"
        }
    };
    let order = match source {
        GroupSource::Tags => "g.name COLLATE NOCASE, g.id",
        GroupSource::Authors | GroupSource::Series => {
            "COALESCE(g.sort, g.name) COLLATE NOCASE, g.id"
        }
    };

    let (having, values) = match filter {
        CountFilter::Any => ("", Vec::new()),
        CountFilter::AtLeast(n) => (" HAVING COUNT(l.book) >= ?", vec![Value::Integer(n)]),
        CountFilter::Below(n) => (" HAVING COUNT(l.book) < ?", vec![Value::Integer(n)]),
    };

    let sql = format!("{}{} ORDER BY {}", base, having, order);
    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(GroupEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(groups)
}
