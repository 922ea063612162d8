//! OPDS catalog generation.
//!
//! Feeds are assembled in memory with [`FeedBuilder`], given crawlable
//! pagination by [`append_crawl_links`] and written as Atom by
//! [`write_feed`].

mod feed;
mod opensearch;
mod pagination;
mod xml;

pub use feed::{Entry, Feed, FeedBuilder, Link, Person, Text, TextKind};
pub use opensearch::write_opensearch;
pub use pagination::{append_crawl_links, max_page};
pub use xml::write_feed;

/// Content type of Atom feed responses.
pub const ATOM_MIME: &str = "application/atom+xml";

/// Content type of the OpenSearch description response.
pub const OPENSEARCH_RESPONSE_MIME: &str = "text/xml";

/// Media types used in link `type` attributes.
pub mod media_types {
    /// Acquisition feed.
    pub const ACQUISITION_FEED: &str = "application/atom+xml;profile=opds-catalog;kind=acquisition";
    /// Navigation feed.
    pub const NAVIGATION_FEED: &str = "application/atom+xml;profile=opds-catalog;kind=navigation";
    /// OpenSearch description document.
    pub const OPENSEARCH: &str = "application/opensearchdescription+xml";
    /// Cover images.
    pub const JPEG: &str = "image/jpeg";
}

/// Link relations.
pub mod rel {
    /// Root of the catalog.
    pub const START: &str = "start";
    /// Generic subsection.
    pub const SUBSECTION: &str = "subsection";
    /// Subsection sorted newest first.
    pub const SORT_NEW: &str = "http://opds-spec.org/sort/new";
    /// Search description.
    pub const SEARCH: &str = "search";
    /// Full size cover.
    pub const IMAGE: &str = "http://opds-spec.org/image";
    /// Small cover.
    pub const THUMBNAIL: &str = "http://opds-spec.org/image/thumbnail";
    /// Downloadable book file.
    pub const ACQUISITION: &str = "http://opds-spec.org/acquisition";
    /// Current page.
    pub const SELF: &str = "self";
    /// First page.
    pub const FIRST: &str = "first";
    /// Last page.
    pub const LAST: &str = "last";
    /// Following page.
    pub const NEXT: &str = "next";
    /// Preceding page.
    pub const PREVIOUS: &str = "previous";
}

/// Root of the OPDS catalog.
pub const ROOT_HREF: &str = "/opds";

/// Something that can link to any page of itself.
pub trait PageLinks {
    /// Link to `page` (zero-based) with every other parameter unchanged.
    fn page_href(&self, page: u32) -> String;
}

/// Link to a book's cover image.
pub fn cover_href(book_id: i64) -> String {
    format!("/opds/media/{}/cover", book_id)
}

/// Link to download one format of a book.
pub fn acquire_href(book_id: i64, format: &str) -> String {
    format!(
        "/opds/acquire/book/{}?type={}",
        book_id,
        urlencoding::encode(&format.to_lowercase())
    )
}

/// Link to the OpenSearch description, titled after the catalog.
pub fn search_spec_href(title: &str) -> String {
    format!("/opds/search-spec?title={}", urlencoding::encode(title))
}

/// Stable feed id derived from the feed's own link.
pub fn feed_id(href: &str) -> String {
    format!(
        "urn:uuid:{}",
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, href.as_bytes())
    )
}
