//! One page of a larger result.

/// A page of rows plus the total number of rows the unpaged query matches.
///
/// `total` comes from a separate count query, so it is independent of
/// `list().len()` and may be slightly stale under concurrent writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    list: Vec<T>,
    total: u64,
    limit: usize,
    offset: usize,
}

impl<T> Page<T> {
    pub fn new(list: Vec<T>, total: u64, limit: usize, offset: usize) -> Self {
        Self {
            list,
            total,
            limit,
            offset,
        }
    }

    /// Page with no rows and a zero total.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0, 0)
    }

    pub fn list(&self) -> &[T] {
        &self.list
    }

    pub fn into_list(self) -> Vec<T> {
        self.list
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.list.iter()
    }

    /// Number of pages of `limit` rows needed for `total`.
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }

    /// 1-based number of this page.
    pub fn page_number(&self) -> usize {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_independent_of_list() {
        let page = Page::new(vec![1, 2], 25, 2, 4);
        assert_eq!(page.len(), 2);
        assert_eq!(page.total(), 25);
        assert_eq!(page.total_pages(), 13);
        assert_eq!(page.page_number(), 3);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i32> = Page::default();
        assert!(page.is_empty());
        assert_eq!(page.total(), 0);
        assert_eq!(page.total_pages(), 0);
        assert_eq!(page.page_number(), 1);
    }

    #[test]
    fn test_map_keeps_counts() {
        let page = Page::new(vec![1, 2, 3], 3, 10, 0).map(|x| x * 10);
        assert_eq!(page.list(), &[10, 20, 30]);
        assert_eq!(page.limit(), 10);
    }
}
