//! crates/shop_core/src/pagination.rs
//!
//! Page requests and the metadata every paginated listing reports.

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Clamps `page` and `per_page` to at least 1.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// Everything a client needs to navigate a listing, derived from the total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total_records: u64,
}

impl PageMeta {
    pub fn new(request: PageRequest, total_records: u64) -> Self {
        Self {
            current_page: request.page,
            per_page: request.per_page,
            total_records,
        }
    }

    /// Never less than 1, so an empty listing still has a valid "last" page.
    pub fn total_pages(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = self.total_records.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn first_page(&self) -> u32 {
        1
    }

    pub fn last_page(&self) -> u32 {
        self.total_pages()
    }

    pub fn prev_page(&self) -> Option<u32> {
        (self.current_page > 1).then(|| (self.current_page - 1).min(self.last_page()))
    }

    pub fn next_page(&self) -> Option<u32> {
        (self.current_page < self.last_page()).then(|| self.current_page + 1)
    }

    /// True when the records do not fit on a single page.
    pub fn spans_multiple_pages(&self) -> bool {
        self.total_records > u64::from(self.per_page)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_records: u64) -> Self {
        Self {
            items,
            meta: PageMeta::new(request, total_records),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_starts_at_zero_for_first_page() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        assert_eq!(PageRequest::new(0, 0), PageRequest::new(1, 1));
    }

    #[test]
    fn meta_derives_navigation_from_total() {
        let meta = PageMeta::new(PageRequest::new(2, 10), 25);
        assert_eq!(meta.total_pages(), 3);
        assert_eq!(meta.first_page(), 1);
        assert_eq!(meta.last_page(), 3);
        assert_eq!(meta.prev_page(), Some(1));
        assert_eq!(meta.next_page(), Some(3));
        assert!(meta.spans_multiple_pages());
    }

    #[test]
    fn meta_for_single_page_has_no_neighbours() {
        let meta = PageMeta::new(PageRequest::new(1, 10), 10);
        assert_eq!(meta.total_pages(), 1);
        assert_eq!(meta.prev_page(), None);
        assert_eq!(meta.next_page(), None);
        assert!(!meta.spans_multiple_pages());
    }

    #[test]
    fn empty_listing_still_reports_one_page() {
        let meta = PageMeta::new(PageRequest::new(1, 10), 0);
        assert_eq!(meta.total_pages(), 1);
        assert_eq!(meta.last_page(), 1);
    }
}
