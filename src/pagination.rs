//! Page-number pagination shared by every listing endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Sanitized page request. Construct through [`PageRequest::new`] so bounds hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Clamp raw query values: page starts at 1, size falls back to the
    /// default when missing or zero and is capped at the maximum.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = match page_size {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(size) => size.min(MAX_PAGE_SIZE),
        };

        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Query-string form of a page request (`?page=2&page_size=50`).
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        Self::new(params.page, params.page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn build(total: i64, request: PageRequest) -> Self {
        let size = i64::from(request.page_size);
        let total = total.max(0);
        // Ceiling division, never less than one page
        let total_pages = ((total + size - 1) / size).max(1);

        Self {
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages,
        }
    }

    pub fn has_next_page(&self) -> bool {
        i64::from(self.page) < self.total_pages
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            meta: PageMeta::build(total, request),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
