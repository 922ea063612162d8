use super::{FeedBuilder, Link, PageLinks, media_types, rel};

/// Highest zero-based page number for `total` entries.
///
/// Computed as `total / page_size` rounded down, so an exact multiple of the
/// page size advertises one trailing empty page.
pub fn max_page(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total / u64::from(page_size)).unwrap_or(u32::MAX)
}

/// Add self/first/last and, where they exist, next/previous links.
pub fn append_crawl_links<L: PageLinks>(
    feed: FeedBuilder,
    total: u64,
    current: u32,
    page_size: u32,
    links: &L,
) -> FeedBuilder {
    let last = max_page(total, page_size);
    let link = |rel: &str, page: u32| Link::new(rel, links.page_href(page), media_types::ACQUISITION_FEED);

    let mut feed = feed
        .link(link(rel::SELF, current))
        .link(link(rel::FIRST, 0))
        .link(link(rel::LAST, last));

    if current < last {
        feed = feed.link(link(rel::NEXT, current + 1));
    }
    if current >= 1 {
        feed = feed.link(link(rel::PREVIOUS, current - 1));
    }
    feed
}
