//! Fetch descriptors: what a query bridge asks its context for.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Row filter.
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Forward,
    Reverse,
}

/// One sort criterion.
pub struct SortDescriptor<E> {
    compare: Comparator<E>,
    order: SortOrder,
}

impl<E> SortDescriptor<E> {
    /// Sort by a key extracted from each row.
    pub fn by_key<K, F>(key: F, order: SortOrder) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(move |a, b| key(a).cmp(&key(b))),
            order,
        }
    }

    /// Sort with an explicit comparator.
    pub fn by<F>(compare: F, order: SortOrder) -> Self
    where
        F: Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
            order,
        }
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    fn compare(&self, a: &E, b: &E) -> Ordering {
        let ordering = (self.compare)(a, b);
        match self.order {
            SortOrder::Forward => ordering,
            SortOrder::Reverse => ordering.reverse(),
        }
    }
}

impl<E> Clone for SortDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
            order: self.order,
        }
    }
}

impl<E> fmt::Debug for SortDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortDescriptor")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Filter, sort order and paging of a query.
pub struct FetchDescriptor<E> {
    filter: Option<Predicate<E>>,
    sort: Vec<SortDescriptor<E>>,
    fetch_limit: Option<usize>,
    fetch_offset: usize,
}

impl<E> FetchDescriptor<E> {
    /// Every row, in the context's order.
    pub fn new() -> Self {
        Self {
            filter: None,
            sort: Vec::new(),
            fetch_limit: None,
            fetch_offset: 0,
        }
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Append a sort criterion. Earlier criteria take precedence.
    pub fn sorted_by(mut self, sort: SortDescriptor<E>) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.fetch_offset = offset;
        self
    }

    pub fn fetch_limit(&self) -> Option<usize> {
        self.fetch_limit
    }

    pub fn fetch_offset(&self) -> usize {
        self.fetch_offset
    }

    pub fn sort_descriptors(&self) -> &[SortDescriptor<E>] {
        &self.sort
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Check a single row against the filter.
    pub fn matches(&self, row: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(row))
    }

    /// Filter, sort (stable), then page `rows`.
    pub fn apply(&self, rows: Vec<E>) -> Vec<E> {
        let mut rows: Vec<E> = rows.into_iter().filter(|row| self.matches(row)).collect();

        if !self.sort.is_empty() {
            rows.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|descriptor| descriptor.compare(a, b))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let limit = self.fetch_limit.unwrap_or(usize::MAX);
        rows.into_iter().skip(self.fetch_offset).take(limit).collect()
    }
}

impl<E> Default for FetchDescriptor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for FetchDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            fetch_limit: self.fetch_limit,
            fetch_offset: self.fetch_offset,
        }
    }
}

impl<E> fmt::Debug for FetchDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDescriptor")
            .field("has_filter", &self.filter.is_some())
            .field("sort", &self.sort)
            .field("fetch_limit", &self.fetch_limit)
            .field("fetch_offset", &self.fetch_offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Task {
        title: &'static str,
        priority: u8,
        done: bool,
    }

    fn tasks() -> Vec<Task> {
        vec![
            Task { title: "b", priority: 2, done: false },
            Task { title: "a", priority: 1, done: true },
            Task { title: "c", priority: 2, done: false },
            Task { title: "d", priority: 3, done: false },
        ]
    }

    fn titles(rows: &[Task]) -> Vec<&'static str> {
        rows.iter().map(|t| t.title).collect()
    }

    #[test]
    fn empty_descriptor_keeps_everything_in_order() {
        let rows = FetchDescriptor::new().apply(tasks());
        assert_eq!(titles(&rows), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn filter_then_sort() {
        let descriptor = FetchDescriptor::new()
            .with_filter(|t: &Task| !t.done)
            .sorted_by(SortDescriptor::by_key(|t: &Task| t.priority, SortOrder::Reverse));

        let rows = descriptor.apply(tasks());
        assert_eq!(titles(&rows), vec!["d", "b", "c"]);
    }

    #[test]
    fn later_criteria_break_ties() {
        let descriptor = FetchDescriptor::new()
            .sorted_by(SortDescriptor::by_key(|t: &Task| t.priority, SortOrder::Forward))
            .sorted_by(SortDescriptor::by_key(|t: &Task| t.title, SortOrder::Reverse));

        let rows = descriptor.apply(tasks());
        assert_eq!(titles(&rows), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn offset_and_limit_page_the_sorted_rows() {
        let descriptor = FetchDescriptor::new()
            .sorted_by(SortDescriptor::by_key(|t: &Task| t.title, SortOrder::Forward))
            .with_offset(1)
            .with_limit(2);

        let rows = descriptor.apply(tasks());
        assert_eq!(titles(&rows), vec!["b", "c"]);
    }
}
