//! # Pagination Results
//!
//! - [`Page`] knows the total number of matching rows (from a separate
//!   count statement).
//! - [`Slice`] only knows whether another page follows (from fetching
//!   `size + 1` rows).

use serde::{Deserialize, Serialize};

use crate::query::PageRequest;

/// One page of results plus the total element count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Zero-based page index.
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Page {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        }
    }

    /// Number of pages needed for `total_elements`.
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number) + 1 < self.total_pages()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    /// Converts the content, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

/// One page of results plus whether a next page exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub has_next: bool,
}

impl<T> Slice<T> {
    /// Builds a slice from up to `size + 1` fetched rows, dropping the extra.
    pub fn from_overfetch(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let size = request.size as usize;
        let has_next = rows.len() > size;
        rows.truncate(size);
        Slice {
            content: rows,
            number: request.page,
            size: request.size,
            has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_arithmetic() {
        let first = Page::new(vec![1, 2, 3], &PageRequest::of(0, 3), 7);
        assert_eq!(first.total_pages(), 3);
        assert!(first.is_first());
        assert!(first.has_next());

        let last = Page::new(vec![7], &PageRequest::of(2, 3), 7);
        assert!(last.is_last());

        let empty = Page::<i32>::new(vec![], &PageRequest::of(0, 3), 0);
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_page_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], &PageRequest::of(1, 2), 5).map(|n| n * 10);
        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.number, 1);
    }

    #[test]
    fn test_slice_from_overfetch() {
        let slice = Slice::from_overfetch(vec![1, 2, 3, 4], &PageRequest::of(0, 3));
        assert_eq!(slice.content, vec![1, 2, 3]);
        assert!(slice.has_next);

        let slice = Slice::from_overfetch(vec![7], &PageRequest::of(2, 3));
        assert_eq!(slice.content, vec![7]);
        assert!(!slice.has_next);
    }
}
