use super::ListingRequest;
use crate::db::{CountFilter, Database, GroupEntry, GroupSource, queries};
use crate::error::AppError;
use std::str::FromStr;

/// Tags with at least this many books are "popular"; the rest are "unique".
pub const POPULAR_TAG_THRESHOLD: i64 = 10;

/// Axes the catalog can be browsed by (`/opds/by-{grouping}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    /// Every author.
    Author,
    /// Tags used by at least [`POPULAR_TAG_THRESHOLD`] books.
    Tag,
    /// Tags used by fewer than [`POPULAR_TAG_THRESHOLD`] books.
    UniqueTag,
    /// Every series.
    Series,
}

impl Grouping {
    /// All groupings, in the order the root feed lists them.
    pub const ALL: [Grouping; 4] = [
        Grouping::Author,
        Grouping::Tag,
        Grouping::UniqueTag,
        Grouping::Series,
    ];

    /// Key as it appears in URLs.
    pub fn key(self) -> &'static str {
        match self {
            Grouping::Author => "author",
            Grouping::Tag => "tag",
            Grouping::UniqueTag => "unique-tag",
            Grouping::Series => "series",
        }
    }

    /// Human readable feed title.
    pub fn title(self) -> &'static str {
        match self {
            Grouping::Author => "Books by Author",
            Grouping::Tag => "Books by Popular Tags",
            Grouping::UniqueTag => "Books by Unique Tags",
            Grouping::Series => "Books by Series",
        }
    }

    /// Link to this grouping's navigation feed.
    pub fn href(self) -> String {
        format!("/opds/by-{}", self.key())
    }

    fn source(self) -> (GroupSource, CountFilter) {
        match self {
            Grouping::Author => (GroupSource::Authors, CountFilter::Any),
            Grouping::Tag => (GroupSource::Tags, CountFilter::AtLeast(POPULAR_TAG_THRESHOLD)),
            Grouping::UniqueTag => (GroupSource::Tags, CountFilter::Below(POPULAR_TAG_THRESHOLD)),
            Grouping::Series => (GroupSource::Series, CountFilter::Any),
        }
    }

    /// Groups of this kind with live book counts.
    pub async fn list_groups(self, db: &Database) -> crate::error::Result<Vec<GroupEntry>> {
        let (source, filter) = self.source();
        db.run(move |conn| queries::group_counts(conn, source, filter))
            .await
    }

    /// Listing that shows the books of one group.
    pub fn filter_params(self, group: &GroupEntry) -> ListingRequest {
        match self {
            Grouping::Author => ListingRequest::author(group.id),
            Grouping::Tag | Grouping::UniqueTag => ListingRequest::tag(group.name.clone()),
            Grouping::Series => ListingRequest::series(group.id),
        }
    }
}

impl FromStr for Grouping {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grouping::ALL
            .into_iter()
            .find(|g| g.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::InvalidGrouping(s.to_string()))
    }
}
