// Paginator - fixed-size, 1-based pages over an ordered sequence
//
// Page numbers never produce an error: missing or non-numeric input means the
// first page, anything past the end means the last page.

use serde::Serialize;
use std::num::{IntErrorKind, NonZeroUsize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: NonZeroUsize,
}

impl Paginator {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.page_size.get())
    }

    /// Page for a raw `page` query value.
    pub fn paginate<T: Clone>(&self, sequence: &[T], raw_page: Option<&str>) -> Page<T> {
        self.page(sequence, parse_page_number(raw_page))
    }

    /// Page for an already-parsed number, clamped into `1..=total_pages`.
    pub fn page<T: Clone>(&self, sequence: &[T], requested: i64) -> Page<T> {
        let total_items = sequence.len();
        let total_pages = self.total_pages(total_items);

        let page_number = if requested < 1 {
            1
        } else {
            usize::try_from(requested)
                .unwrap_or(usize::MAX)
                .min(total_pages)
                .max(1)
        };

        let start = ((page_number - 1) * self.page_size.get()).min(total_items);
        let end = start.saturating_add(self.page_size.get()).min(total_items);

        Page {
            items: sequence[start..end].to_vec(),
            page_number,
            total_pages,
            total_items,
            has_next: page_number < total_pages,
            has_prev: page_number > 1,
        }
    }
}

/// Absent or non-numeric → 1. Out-of-range integers saturate so they clamp
/// to the first or last page instead of being treated as garbage.
pub fn parse_page_number(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return 1;
    };

    match raw.parse::<i64>() {
        Ok(number) => number,
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(size: usize) -> Paginator {
        Paginator::new(NonZeroUsize::new(size).unwrap())
    }

    fn sequence(len: usize) -> Vec<usize> {
        (0..len).collect()
    }

    #[test]
    fn test_seventeen_items_page_size_ten() {
        let p = paginator(10);
        let items = sequence(17);

        let first = p.paginate(&items, None);
        assert_eq!(first.len(), 10);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let second = p.paginate(&items, Some("2"));
        assert_eq!(second.items, (10..17).collect::<Vec<_>>());
        assert_eq!(second.page_number, 2);
        assert!(!second.has_next);
        assert!(second.has_prev);
    }

    #[test]
    fn test_first_page_holds_min_of_size_and_len() {
        for size in 1..=12 {
            for len in 0..=30 {
                let page = paginator(size).paginate(&sequence(len), Some("1"));
                assert_eq!(page.len(), size.min(len), "size={} len={}", size, len);
            }
        }
    }

    #[test]
    fn test_pages_reconstruct_sequence() {
        for size in 1..=7 {
            for len in 0..=25 {
                let p = paginator(size);
                let items = sequence(len);
                let total = p.total_pages(len);

                let rebuilt: Vec<usize> = (1..=total as i64)
                    .flat_map(|n| p.page(&items, n).items)
                    .collect();
                assert_eq!(rebuilt, items, "size={} len={}", size, len);
            }
        }
    }

    #[test]
    fn test_past_the_end_clamps_to_last_page() {
        let p = paginator(10);
        let items = sequence(17);
        let last = p.page(&items, 2);

        assert_eq!(p.page(&items, 3), last);
        assert_eq!(p.page(&items, i64::MAX), last);
        assert_eq!(p.paginate(&items, Some("99999999999999999999999")), last);
    }

    #[test]
    fn test_below_one_and_garbage_clamp_to_first_page() {
        let p = paginator(10);
        let items = sequence(17);
        let first = p.page(&items, 1);

        for raw in [None, Some(""), Some("abc"), Some("0"), Some("-4"), Some("1.5"), Some("-99999999999999999999")] {
            assert_eq!(p.paginate(&items, raw), first, "raw={:?}", raw);
        }
        assert_eq!(p.paginate(&items, Some(" 2 ")).page_number, 2);
    }

    #[test]
    fn test_empty_sequence_has_zero_pages() {
        let p = paginator(10);
        let page = p.paginate::<usize>(&[], Some("3"));

        assert!(page.is_empty());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page_number, 1);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }
}
