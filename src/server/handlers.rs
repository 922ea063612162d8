//! HTTP request handlers.

use crate::catalog::{Grouping, ListingParams, ListingRequest, PAGE_SIZE, SortKey, resolve_listing};
use crate::db::{AuthorRef, BookOrder, BookQuery, BookSummary, queries};
use crate::error::{AppError, Result};
use crate::formats;
use crate::media;
use crate::opds::{
    self, ATOM_MIME, Entry, Feed, FeedBuilder, Link, OPENSEARCH_RESPONSE_MIME, ROOT_HREF, Text, media_types,
    rel,
};
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::DuplexStream;
use tokio_util::io::{ReaderStream, SyncIoBridge};

/// Bytes buffered between the feed writer and the response body.
const STREAM_BUFFER: usize = 64 * 1024;

/// Stream an XML document to the client while it is being serialized.
///
/// The writer runs on the blocking pool; when the client goes away the pipe
/// closes and the write fails, which only ends that task.
fn xml_response<F>(content_type: &'static str, write: F) -> Response
where
    F: FnOnce(SyncIoBridge<DuplexStream>) -> Result<()> + Send + 'static,
{
    let (reader, writer) = tokio::io::duplex(STREAM_BUFFER);
    let bridge = SyncIoBridge::new(writer);

    tokio::task::spawn_blocking(move || {
        if let Err(e) = write(bridge) {
            tracing::debug!(error = %e, "XML stream aborted");
        }
    });

    (
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

fn atom_response(feed: Feed) -> Response {
    xml_response(ATOM_MIME, move |out| opds::write_feed(&feed, out))
}

fn placeholder_redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, media::PLACEHOLDER_COVER)]).into_response()
}

// ============================================================================
// OPDS CATALOG
// ============================================================================

/// OPDS root catalog.
pub async fn opds_root(State(state): State<AppState>) -> Result<Response> {
    let updated = state
        .db
        .run(|conn| queries::latest_modification(conn))
        .await?
        .unwrap_or(DateTime::UNIX_EPOCH);
    let title = state.title();

    let mut feed = FeedBuilder::new(opds::feed_id(ROOT_HREF), title)
        .updated(updated)
        .author(title)
        .self_link(ROOT_HREF, media_types::NAVIGATION_FEED)
        .start_link(ROOT_HREF)
        .search_link(opds::search_spec_href(title))
        .navigation_entry(Entry::navigation(
            "urn:calibre:books",
            "All Books",
            updated,
            Link::new(rel::SUBSECTION, ListingRequest::default().href(None), media_types::ACQUISITION_FEED),
        )
        .with_content(Text::plain("Every book in the library, by title")))
        .navigation_entry(Entry::navigation(
            "urn:calibre:books:new",
            "New Books",
            updated,
            Link::new(
                rel::SORT_NEW,
                ListingRequest::new(SortKey::New, ListingParams::default()).href(None),
                media_types::ACQUISITION_FEED,
            ),
        )
        .with_content(Text::plain("Most recently added first")));

    for grouping in Grouping::ALL {
        feed = feed.navigation_entry(Entry::navigation(
            format!("urn:calibre:by-{}", grouping.key()),
            grouping.title(),
            updated,
            Link::new(rel::SUBSECTION, grouping.href(), media_types::NAVIGATION_FEED),
        ));
    }

    Ok(atom_response(feed.build()))
}

/// Paginated acquisition feed in title order.
pub async fn opds_books(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Result<Response> {
    listing_feed(&state, SortKey::Title, params).await
}

/// Paginated acquisition feed with an explicit sort key.
pub async fn opds_books_sorted(
    State(state): State<AppState>,
    Path(sort): Path<String>,
    Query(params): Query<ListingParams>,
) -> Result<Response> {
    let sort: SortKey = sort.parse()?;
    listing_feed(&state, sort, params).await
}

async fn listing_feed(state: &AppState, sort: SortKey, params: ListingParams) -> Result<Response> {
    let page = params.page;
    let request = ListingRequest::new(sort, params);
    let listing = resolve_listing(&state.db, &request, page).await?;

    tracing::debug!(
        filter = ?request.filter(),
        search = request.search_term().unwrap_or_default(),
        sort = %sort,
        page,
        total = listing.total,
        "Resolved listing"
    );

    let updated = listing
        .books
        .iter()
        .filter_map(|b| b.last_modified)
        .max()
        .unwrap_or(DateTime::UNIX_EPOCH);

    let feed = FeedBuilder::new(opds::feed_id(&request.href(None)), listing.title)
        .updated(updated)
        .start_link(ROOT_HREF)
        .search_link(opds::search_spec_href(state.title()))
        .page_limit(PAGE_SIZE)
        .book_entries(&listing.books);
    let feed = opds::append_crawl_links(feed, listing.total, page, PAGE_SIZE, &request);

    Ok(atom_response(feed.build()))
}

/// Catalog sections addressed as `/opds/by-{grouping}`.
pub async fn opds_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Response> {
    let key = section
        .strip_prefix("by-")
        .ok_or_else(|| AppError::NotFound(format!("Catalog section: {}", section)))?;
    let grouping: Grouping = key.parse()?;

    let groups = grouping.list_groups(&state.db).await?;
    tracing::debug!(grouping = grouping.key(), groups = groups.len(), "Listed groups");

    let href = grouping.href();
    let feed = FeedBuilder::new(opds::feed_id(&href), grouping.title())
        .updated(Utc::now())
        .self_link(href, media_types::NAVIGATION_FEED)
        .start_link(ROOT_HREF)
        .search_link(opds::search_spec_href(state.title()));
    let feed = groups
        .iter()
        .fold(feed, |feed, group| feed.group_entry(grouping, group));

    Ok(atom_response(feed.build()))
}

/// Query string of the OpenSearch description.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchSpecParams {
    title: String,
}

/// OpenSearch description document.
pub async fn opds_search_spec(
    State(state): State<AppState>,
    Query(params): Query<SearchSpecParams>,
) -> Response {
    let title = if params.title.trim().is_empty() {
        state.title().to_string()
    } else {
        params.title
    };

    xml_response(OPENSEARCH_RESPONSE_MIME, move |out| {
        opds::write_opensearch(&title, out)
    })
}

// ============================================================================
// FILES
// ============================================================================

/// Book cover image, with conditional GET support.
pub async fn book_cover(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(book) = state.db.run(move |conn| queries::find_book(conn, book_id)).await? else {
        tracing::debug!(book_id, "Cover requested for unknown book");
        return Ok(placeholder_redirect());
    };

    let path = media::cover_path(state.library_root(), &book.path);
    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            tracing::debug!(book_id, path = %path.display(), "No cover on disk");
            return Ok(placeholder_redirect());
        }
    };

    let etag = media::etag_for(&path, &meta);
    let matched = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| media::etag_matches(v, &etag));
    if matched {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let file = tokio::fs::File::open(&path).await?;
    Ok((
        [
            (header::CONTENT_TYPE, media_types::JPEG.to_string()),
            (header::CONTENT_LENGTH, meta.len().to_string()),
            (header::ETAG, etag),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Query string of the acquisition endpoint.
#[derive(Debug, Deserialize)]
pub struct AcquireParams {
    /// Format code to download.
    #[serde(rename = "type", default = "default_acquire_format")]
    pub format: String,
}

fn default_acquire_format() -> String {
    "epub".to_string()
}

/// Download one stored format of a book.
pub async fn book_acquire(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Query(params): Query<AcquireParams>,
) -> Result<Response> {
    let format = params.format.trim().to_string();
    if format.is_empty() {
        return Err(AppError::BadRequest("Missing format".to_string()));
    }

    let wanted = format.clone();
    let (book, file) = state
        .db
        .run(move |conn| {
            let book = queries::find_book(conn, book_id)?
                .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", book_id)))?;
            let file = queries::find_content_file(conn, book_id, &wanted)?;
            Ok((book, file))
        })
        .await?;
    let file = file.ok_or_else(|| {
        AppError::NotFound(format!("Format {} not available for book {}", format, book_id))
    })?;

    let path = media::content_path(state.library_root(), &book.path, &file.name, &file.format);
    let handle = match tokio::fs::File::open(&path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(book_id, path = %path.display(), "Book file missing on disk");
            return Err(AppError::NotFound(format!("File for book {} is missing", book.id)));
        }
        Err(e) => return Err(e.into()),
    };
    let length = handle.metadata().await?.len();

    let filename = format!("{}.{}", file.name, file.format.to_lowercase());
    tracing::debug!(book_id, title = %book.title, filename = %filename, "Serving book file");

    Ok((
        [
            (header::CONTENT_TYPE, formats::mime_for_code(&file.format).to_string()),
            (header::CONTENT_DISPOSITION, media::content_disposition(&filename)),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        Body::from_stream(ReaderStream::new(handle)),
    )
        .into_response())
}

/// Generic cover for books without one.
pub async fn placeholder_cover(State(state): State<AppState>) -> Response {
    (
        [
            (header::CONTENT_TYPE, media_types::JPEG),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        state.placeholder().to_vec(),
    )
        .into_response()
}

// ============================================================================
// JSON API
// ============================================================================

/// Query string of `/api/books`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiBooksParams {
    /// Page size; defaults to the configured limit.
    pub limit: Option<u32>,
    /// Rows to skip.
    pub offset: u64,
    /// Title sort direction.
    pub sort_ascending: bool,
}

impl Default for ApiBooksParams {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            sort_ascending: true,
        }
    }
}

/// One page of results with the total across all pages.
#[derive(Debug, Serialize)]
pub struct ResultPage<T> {
    /// Total matching records.
    pub count: u64,
    /// Records on this page.
    pub records: Vec<T>,
}

/// Book as listed by the JSON API.
#[derive(Debug, Serialize)]
pub struct SimpleBook {
    /// Book id.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Authors in link order.
    pub authors: Vec<AuthorRef>,
}

impl From<BookSummary> for SimpleBook {
    fn from(book: BookSummary) -> Self {
        Self {
            id: book.id,
            title: book.title,
            authors: book.authors,
        }
    }
}

/// Page of books for the web UI.
pub async fn api_books(
    State(state): State<AppState>,
    Query(params): Query<ApiBooksParams>,
) -> Result<Json<ResultPage<SimpleBook>>> {
    let api = &state.config.api;
    let limit = params.limit.unwrap_or(api.default_limit).clamp(1, api.max_limit);
    let order = if params.sort_ascending {
        BookOrder::SortAscending
    } else {
        BookOrder::SortDescending
    };
    let query = BookQuery {
        offset: params.offset,
        ..BookQuery::new(order, u64::from(limit))
    };

    let (count, books) = state
        .db
        .run(move |conn| Ok((queries::count_books(conn, &query)?, queries::find_books(conn, &query)?)))
        .await?;

    Ok(Json(ResultPage {
        count,
        records: books.into_iter().map(SimpleBook::from).collect(),
    }))
}
