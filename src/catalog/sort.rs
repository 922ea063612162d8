use crate::db::BookOrder;
use crate::error::AppError;
use std::fmt;
use std::str::FromStr;

/// Orderings selectable from `/opds/books/{sort}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Title sort key, ascending (the empty key).
    #[default]
    Title,
    /// Newest additions first (`new`).
    New,
}

impl SortKey {
    /// Key as it appears in URLs.
    pub fn key(self) -> &'static str {
        match self {
            SortKey::Title => "",
            SortKey::New => "new",
        }
    }

    /// Ordering applied to the book query.
    pub fn order(self) -> BookOrder {
        match self {
            SortKey::Title => BookOrder::SortAscending,
            SortKey::New => BookOrder::NewestFirst,
        }
    }
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Ok(SortKey::Title)
        } else if s.eq_ignore_ascii_case("new") {
            Ok(SortKey::New)
        } else {
            Err(AppError::InvalidSort(s.to_string()))
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
