use serde::Serialize;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 5;
/// Upper bound for client-requested page sizes.
pub const MAX_PAGE_SIZE: u64 = 100;

/// 1-based page request with the page size already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Missing or non-positive values fall back to the defaults, oversized
    /// page sizes are capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page_size = match page_size.and_then(|size| u64::try_from(size).ok()) {
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(size) => size.min(MAX_PAGE_SIZE),
        };
        let page = match page.and_then(|page| u64::try_from(page).ok()) {
            Some(0) | None => 1,
            Some(page) => page,
        };
        Self { page, page_size }
    }

    /// Zero-based index as expected by SeaORM paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to navigate.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
