use super::SortKey;
use crate::db::{BookFilter, BookQuery, BookSummary, Database, queries};
use crate::error::{AppError, Result};
use crate::opds::PageLinks;
use serde::{Deserialize, Deserializer, de};
use std::fmt::Display;
use std::str::FromStr;

/// Entries per page in every paginated feed.
pub const PAGE_SIZE: u32 = 50;

/// Query string of `/opds/books/{sort}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingParams {
    /// Zero-based page number.
    #[serde(deserialize_with = "blank_as_default")]
    pub page: u32,
    /// Restrict to one author.
    #[serde(deserialize_with = "blank_as_none")]
    pub author_id: Option<i64>,
    /// Restrict to one tag name.
    pub tag: Option<String>,
    /// Restrict to one series.
    #[serde(deserialize_with = "blank_as_none")]
    pub series_id: Option<i64>,
    /// Free-text search over titles and author names.
    pub search: String,
}

/// Numeric query value where `key=` means the parameter was not sent.
fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

fn blank_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    Ok(blank_as_none(deserializer)?.unwrap_or_default())
}

/// Everything that selects a book listing except the page number.
///
/// Crawl links are rebuilt from this, so every filter the client sent
/// survives pagination even when precedence makes it inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRequest {
    /// Ordering.
    pub sort: SortKey,
    /// Author filter.
    pub author_id: Option<i64>,
    /// Tag filter.
    pub tag: Option<String>,
    /// Series filter.
    pub series_id: Option<i64>,
    /// Search text.
    pub search: String,
}

impl ListingRequest {
    /// Combine the path sort key with the query string.
    pub fn new(sort: SortKey, params: ListingParams) -> Self {
        Self {
            sort,
            author_id: params.author_id,
            tag: params.tag,
            series_id: params.series_id,
            search: params.search,
        }
    }

    /// Listing of one author's books.
    pub fn author(author_id: i64) -> Self {
        Self {
            author_id: Some(author_id),
            ..Self::default()
        }
    }

    /// Listing of books with a tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Listing of one series.
    pub fn series(series_id: i64) -> Self {
        Self {
            series_id: Some(series_id),
            ..Self::default()
        }
    }

    /// The structural filter in effect.
    ///
    /// Filters are exclusive: an author id wins over a tag, and a tag wins
    /// over a series id. A blank tag counts as absent.
    pub fn filter(&self) -> Option<BookFilter> {
        if let Some(id) = self.author_id {
            return Some(BookFilter::Author(id));
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.trim().is_empty()) {
            return Some(BookFilter::Tag(tag.to_string()));
        }
        self.series_id.map(BookFilter::Series)
    }

    /// Search text, if any.
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }

    /// Build the query for one page.
    pub fn query(&self, page: u32) -> BookQuery {
        BookQuery {
            filter: self.filter(),
            search: self.search_term().map(str::to_string),
            order: self.sort.order(),
            offset: u64::from(page) * u64::from(PAGE_SIZE),
            limit: u64::from(PAGE_SIZE),
        }
    }

    /// Link to this listing, optionally pinned to a page.
    pub fn href(&self, page: Option<u32>) -> String {
        let mut href = String::from("/opds/books");
        if self.sort != SortKey::Title {
            href.push('/');
            href.push_str(self.sort.key());
        }

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(page) = page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(id) = self.author_id {
            pairs.push(("authorId", id.to_string()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", urlencoding::encode(tag).into_owned()));
        }
        if let Some(id) = self.series_id {
            pairs.push(("seriesId", id.to_string()));
        }
        if !self.search.is_empty() {
            pairs.push(("search", urlencoding::encode(&self.search).into_owned()));
        }

        for (i, (key, value)) in pairs.iter().enumerate() {
            href.push(if i == 0 { '?' } else { '&' });
            href.push_str(key);
            href.push('=');
            href.push_str(value);
        }
        href
    }
}

impl PageLinks for ListingRequest {
    fn page_href(&self, page: u32) -> String {
        self.href(Some(page))
    }
}

/// One resolved page of books.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Feed title describing the active filter.
    pub title: String,
    /// Matching books across all pages.
    pub total: u64,
    /// Books on this page, in query order.
    pub books: Vec<BookSummary>,
}

/// Resolve a listing request against the catalog.
///
/// Author and series filters must reference existing rows; a dangling id is
/// reported as [`AppError::NotFound`].
pub async fn resolve_listing(db: &Database, request: &ListingRequest, page: u32) -> Result<Listing> {
    let query = request.query(page);

    db.run(move |conn| {
        let title = match &query.filter {
            None => "All Books".to_string(),
            Some(BookFilter::Author(id)) => {
                let name = queries::author_name(conn, *id)?
                    .ok_or_else(|| AppError::NotFound(format!("Author not found: {}", id)))?;
                format!("Books by {}", name)
            }
            Some(BookFilter::Tag(tag)) => format!("Books tagged with {}", tag),
            Some(BookFilter::Series(id)) => {
                let name = queries::series_name(conn, *id)?
                    .ok_or_else(|| AppError::NotFound(format!("Series not found: {}", id)))?;
                format!("Books in Series: {}", name)
            }
        };

        let total = queries::count_books(conn, &query)?;
        let books = queries::find_books(conn, &query)?;

        Ok(Listing {
            title,
            total,
            books,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_beats_tag_beats_series() {
        let request = ListingRequest {
            author_id: Some(7),
            tag: Some("sf".to_string()),
            series_id: Some(3),
            ..ListingRequest::default()
        };
        assert_eq!(request.filter(), Some(BookFilter::Author(7)));

        let request = ListingRequest {
            tag: Some("sf".to_string()),
            series_id: Some(3),
            ..ListingRequest::default()
        };
        assert_eq!(request.filter(), Some(BookFilter::Tag("sf".to_string())));

        let request = ListingRequest {
            tag: Some("   ".to_string()),
            series_id: Some(3),
            ..ListingRequest::default()
        };
        assert_eq!(request.filter(), Some(BookFilter::Series(3)));
    }

    #[test]
    fn href_keeps_every_parameter() {
        let request = ListingRequest {
            sort: SortKey::New,
            author_id: Some(7),
            tag: Some("science fiction".to_string()),
            series_id: Some(3),
            search: "dune & co".to_string(),
        };
        assert_eq!(
            request.href(Some(2)),
            "/opds/books/new?page=2&authorId=7&tag=science%20fiction&seriesId=3&search=dune%20%26%20co"
        );
    }

    #[test]
    fn href_without_filters() {
        assert_eq!(ListingRequest::default().href(None), "/opds/books");
        assert_eq!(ListingRequest::default().href(Some(0)), "/opds/books?page=0");
        assert_eq!(ListingRequest::author(4).href(None), "/opds/books?authorId=4");
    }

    #[test]
    fn query_pages_by_fixed_size() {
        let query = ListingRequest::default().query(3);
        assert_eq!(query.offset, 150);
        assert_eq!(query.limit, 50);
        assert!(query.search.is_none());
    }
}
