use crate::error::TravelError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Result<Self, TravelError> {
        if page < 1 || limit < 1 {
            return Err(TravelError::ValidationError(
                "page and limit must be positive integers".to_string(),
            ));
        }
        Ok(Self { page, limit })
    }

    /// Saturates for pages far past any realistic result set.
    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Cuts one page out of an already ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let items = items.into_iter().skip(self.skip()).take(self.limit).collect();
        Page::new(items, total, *self)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(request.limit),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slicing() {
        let request = PageRequest::new(2, 3).unwrap();
        let page = request.slice((1..=8).collect::<Vec<_>>());
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 8);
        assert_eq!(page.total_pages, 3);

        let last = PageRequest::new(3, 3).unwrap().slice((1..=8).collect::<Vec<_>>());
        assert_eq!(last.items, vec![7, 8]);

        let past_end = PageRequest::new(9, 3).unwrap().slice((1..=8).collect::<Vec<_>>());
        assert!(past_end.items.is_empty());
    }

    #[test]
    fn test_huge_page_request_is_empty_not_a_panic() {
        let request = PageRequest::new(usize::MAX, usize::MAX).unwrap();
        assert_eq!(request.skip(), usize::MAX);
        let page = request.slice(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
    }
}
