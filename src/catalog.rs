//! Catalog navigation: groupings, sort orders and book listings.

mod grouping;
mod listing;
mod sort;

pub use grouping::{Grouping, POPULAR_TAG_THRESHOLD};
pub use listing::{Listing, ListingParams, ListingRequest, PAGE_SIZE, resolve_listing};
pub use sort::SortKey;
