use super::{acquire_href, cover_href, media_types, rel};
use crate::catalog::{Grouping, ListingRequest};
use crate::db::{BookSummary, GroupEntry};
use crate::formats;
use chrono::{DateTime, Utc};

/// OPDS feed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Link relation type (e.g., "self", "subsection", acquisition).
    pub rel: String,
    /// URL of the linked resource.
    pub href: String,
    /// MIME type of the linked resource.
    pub link_type: String,
    /// Optional title for the link.
    pub title: Option<String>,
}

impl Link {
    /// Create a link without a title.
    pub fn new(rel: impl Into<String>, href: impl Into<String>, link_type: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            link_type: link_type.into(),
            title: None,
        }
    }

    /// Set the link title.
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Atom person construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Display name.
    pub name: String,
    /// Profile link.
    pub uri: Option<String>,
}

/// How text content is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Plain text.
    Text,
    /// Escaped HTML markup.
    Html,
}

impl TextKind {
    /// Value of the Atom `type` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            TextKind::Text => "text",
            TextKind::Html => "html",
        }
    }
}

/// Atom text construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    /// Interpretation of `value`.
    pub kind: TextKind,
    /// The text itself, unescaped.
    pub value: String,
}

impl Text {
    /// Plain text.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Text,
            value: value.into(),
        }
    }

    /// HTML text.
    pub fn html(value: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Html,
            value: value.into(),
        }
    }
}

/// OPDS feed entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Unique identifier for the entry.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Authors list.
    pub authors: Vec<Person>,
    /// Short summary.
    pub summary: Option<Text>,
    /// Description shown for navigation entries.
    pub content: Option<Text>,
    /// Links associated with this entry.
    pub links: Vec<Link>,
}

impl Entry {
    /// Navigation entry pointing at another feed.
    pub fn navigation(
        id: impl Into<String>,
        title: impl Into<String>,
        updated: DateTime<Utc>,
        link: Link,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            updated,
            authors: Vec::new(),
            summary: None,
            content: None,
            links: vec![link],
        }
    }

    /// Set the entry content.
    pub fn with_content(mut self, content: Text) -> Self {
        self.content = Some(content);
        self
    }

    /// Links with the given relation.
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }
}

/// A complete feed, ready for serialization.
#[derive(Debug, Clone)]
pub struct Feed {
    /// Feed id.
    pub id: String,
    /// Feed title.
    pub title: String,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Feed author.
    pub author: Option<Person>,
    /// Feed-level links.
    pub links: Vec<Link>,
    /// Entries in display order.
    pub entries: Vec<Entry>,
    /// Page size hint (`opds:pageLimit`).
    pub page_limit: Option<u32>,
}

impl Feed {
    /// First feed-level link with the given relation.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }
}

/// OPDS feed builder.
pub struct FeedBuilder {
    feed: Feed,
}

impl FeedBuilder {
    /// Create a new feed builder.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            feed: Feed {
                id: id.into(),
                title: title.into(),
                updated: Utc::now(),
                author: None,
                links: Vec::new(),
                entries: Vec::new(),
                page_limit: None,
            },
        }
    }

    /// Set the feed update time.
    pub fn updated(mut self, updated: DateTime<Utc>) -> Self {
        self.feed.updated = updated;
        self
    }

    /// Set the feed author.
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.feed.author = Some(Person {
            name: name.into(),
            uri: None,
        });
        self
    }

    /// Add a feed-level link.
    pub fn link(mut self, link: Link) -> Self {
        self.feed.links.push(link);
        self
    }

    /// Add a self link for an unpaginated feed.
    pub fn self_link(self, href: impl Into<String>, link_type: &str) -> Self {
        self.link(Link::new(rel::SELF, href, link_type))
    }

    /// Add a start link.
    pub fn start_link(self, href: impl Into<String>) -> Self {
        self.link(Link::new(rel::START, href, media_types::NAVIGATION_FEED))
    }

    /// Add a search link.
    pub fn search_link(self, href: impl Into<String>) -> Self {
        self.link(Link::new(rel::SEARCH, href, media_types::OPENSEARCH))
    }

    /// Advertise the page size of a paginated feed.
    pub fn page_limit(mut self, limit: u32) -> Self {
        self.feed.page_limit = Some(limit);
        self
    }

    /// Add a navigation entry.
    pub fn navigation_entry(mut self, entry: Entry) -> Self {
        self.feed.entries.push(entry);
        self
    }

    /// Add one entry per book, keeping their order.
    pub fn book_entries(self, books: &[BookSummary]) -> Self {
        books.iter().fold(self, |feed, book| feed.book_entry(book))
    }

    /// Add a book entry.
    ///
    /// Links are ordered image, thumbnail, then one acquisition link per
    /// stored file.
    pub fn book_entry(mut self, book: &BookSummary) -> Self {
        let cover = cover_href(book.id);
        let mut links = vec![
            Link::new(rel::IMAGE, cover.clone(), media_types::JPEG),
            Link::new(rel::THUMBNAIL, cover, media_types::JPEG),
        ];
        links.extend(book.files.iter().map(|file| {
            Link::new(
                rel::ACQUISITION,
                acquire_href(book.id, &file.format),
                formats::mime_for_code(&file.format),
            )
            .titled(file.format.to_uppercase())
        }));

        let authors = book
            .authors
            .iter()
            .map(|a| Person {
                name: a.name.clone(),
                uri: Some(ListingRequest::author(a.id).href(None)),
            })
            .collect();

        let summary = book
            .comment
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(Text::html);

        let id = match book.uuid.as_deref().filter(|u| !u.is_empty()) {
            Some(uuid) => format!("urn:uuid:{}", uuid),
            None => format!("urn:calibre:book:{}", book.id),
        };

        self.feed.entries.push(Entry {
            id,
            title: book.title.clone(),
            updated: book.last_modified.unwrap_or(DateTime::UNIX_EPOCH),
            authors,
            summary,
            content: None,
            links,
        });
        self
    }

    /// Add an entry for one group of a grouping feed.
    pub fn group_entry(mut self, grouping: Grouping, group: &GroupEntry) -> Self {
        let href = grouping.filter_params(group).href(None);
        let link = Link::new(rel::SUBSECTION, href, media_types::ACQUISITION_FEED)
            .titled(format!("{} ({} works)", group.name, group.count));

        let updated = self.feed.updated;
        self.feed.entries.push(Entry::navigation(
            format!("urn:calibre:{}:{}", grouping.key(), group.id),
            format!("{} ({})", group.name, group.count),
            updated,
            link,
        ));
        self
    }

    /// Finish the feed.
    pub fn build(self) -> Feed {
        self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AuthorRef, ContentFile};

    fn book(files: &[(&str, &str)]) -> BookSummary {
        BookSummary {
            id: 42,
            uuid: Some("5b1c3f7e-0000-4000-8000-000000000042".to_string()),
            title: "Dune".to_string(),
            path: "Frank Herbert/Dune (42)".to_string(),
            last_modified: None,
            authors: vec![AuthorRef {
                id: 7,
                name: "Frank Herbert".to_string(),
            }],
            comment: Some("<p>Spice.</p>".to_string()),
            files: files
                .iter()
                .map(|(format, name)| ContentFile {
                    format: format.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn book_entry_links_in_fixed_order() {
        let feed = FeedBuilder::new("urn:test", "Test")
            .book_entry(&book(&[("EPUB", "Dune - Frank Herbert"), ("MOBI", "Dune - Frank Herbert")]))
            .build();
        let entry = &feed.entries[0];

        let rels: Vec<&str> = entry.links.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(rels, [rel::IMAGE, rel::THUMBNAIL, rel::ACQUISITION, rel::ACQUISITION]);
        assert_eq!(entry.links[0].href, "/opds/media/42/cover");
        assert_eq!(entry.links[1].href, "/opds/media/42/cover");
        assert_eq!(entry.links[2].href, "/opds/acquire/book/42?type=epub");
        assert_eq!(entry.links[2].link_type, "application/epub+zip");
        assert_eq!(entry.links[3].href, "/opds/acquire/book/42?type=mobi");
        assert_eq!(entry.links[3].link_type, "application/x-mobipocket-ebook");
    }

    #[test]
    fn book_entry_metadata() {
        let feed = FeedBuilder::new("urn:test", "Test").book_entry(&book(&[])).build();
        let entry = &feed.entries[0];

        assert_eq!(entry.id, "urn:uuid:5b1c3f7e-0000-4000-8000-000000000042");
        assert_eq!(entry.updated, DateTime::UNIX_EPOCH);
        assert_eq!(entry.authors[0].name, "Frank Herbert");
        assert_eq!(entry.authors[0].uri.as_deref(), Some("/opds/books?authorId=7"));
        assert_eq!(entry.summary, Some(Text::html("<p>Spice.</p>")));
        assert_eq!(entry.links_with_rel(rel::ACQUISITION).count(), 0);
    }

    #[test]
    fn blank_comment_has_no_summary() {
        let mut b = book(&[]);
        b.comment = Some("  \n ".to_string());
        b.uuid = None;
        let feed = FeedBuilder::new("urn:test", "Test").book_entry(&b).build();

        assert!(feed.entries[0].summary.is_none());
        assert_eq!(feed.entries[0].id, "urn:calibre:book:42");
    }

    #[test]
    fn unknown_format_is_octet_stream() {
        let feed = FeedBuilder::new("urn:test", "Test")
            .book_entry(&book(&[("LRF", "Dune")]))
            .build();
        let link = feed.entries[0].links_with_rel(rel::ACQUISITION).next().unwrap();
        assert_eq!(link.link_type, "application/octet-stream");
    }

    #[test]
    fn feed_level_links() {
        let feed = FeedBuilder::new("urn:test", "Root")
            .self_link("/opds", media_types::NAVIGATION_FEED)
            .start_link("/opds")
            .search_link("/opds/search-spec?title=Root")
            .build();

        assert_eq!(feed.links.len(), 3);
        let search = feed.link(rel::SEARCH).unwrap();
        assert_eq!(search.link_type, "application/opensearchdescription+xml");
        assert_eq!(feed.link(rel::START).unwrap().link_type, media_types::NAVIGATION_FEED);
        assert!(feed.link(rel::NEXT).is_none());
    }

    #[test]
    fn group_entry_title_and_link() {
        let group = GroupEntry {
            id: 3,
            name: "Dune".to_string(),
            count: 6,
        };
        let feed = FeedBuilder::new("urn:test", "Series")
            .group_entry(Grouping::Series, &group)
            .build();
        let entry = &feed.entries[0];

        assert_eq!(entry.title, "Dune (6)");
        assert_eq!(entry.links.len(), 1);
        assert_eq!(entry.links[0].rel, rel::SUBSECTION);
        assert_eq!(entry.links[0].href, "/opds/books?seriesId=3");
        assert_eq!(entry.links[0].title.as_deref(), Some("Dune (6 works)"));
    }
}
