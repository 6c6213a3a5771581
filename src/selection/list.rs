//! Multi-range selection over an ordered list of items.

use std::collections::BTreeSet;

/// One selected index range. `head` is the end the next extension moves;
/// `tail` is the anchor. A negated range subtracts instead of adding and
/// only survives until the next [`ListSelection::coalesce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionRange {
    head: usize,
    tail: usize,
    negate: bool,
}

impl SelectionRange {
    fn point(index: usize) -> Self {
        Self {
            head: index,
            tail: index,
            negate: false,
        }
    }

    fn start(&self) -> usize {
        self.head.min(self.tail)
    }

    fn end(&self) -> usize {
        self.head.max(self.tail)
    }
}

/// An immutable multi-range selection over `items`.
///
/// The most recently modified range comes first. Items failing the
/// selectability predicate are never reported as selected and are skipped
/// by the next/previous navigation, but ranges may span across them.
/// Every mutator returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSelection<T> {
    items: Vec<T>,
    selections: Vec<SelectionRange>,
    is_item_selectable: fn(&T) -> bool,
}

impl<T: Clone + PartialEq> ListSelection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self::with_selectable(items, |_| true)
    }

    pub fn with_selectable(items: Vec<T>, is_item_selectable: fn(&T) -> bool) -> Self {
        let mut selection = Self {
            items: Vec::new(),
            selections: Vec::new(),
            is_item_selectable,
        };
        selection.assign_items(items);
        selection
    }

    fn assign_items(&mut self, items: Vec<T>) {
        let index = match self.selections.first() {
            Some(range) if !items.is_empty() => range.start().min(items.len() - 1),
            _ => 0,
        };

        self.items = items;
        self.selections = if self.items.is_empty() {
            Vec::new()
        } else {
            vec![SelectionRange::point(index)]
        };
    }

    /// Remap the selection onto a new item list, collapsing to the nearest
    /// valid index when the list shrank.
    pub fn set_items(&self, items: Vec<T>) -> Self {
        let mut next = self.clone();
        next.assign_items(items);
        next
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn last_item(&self) -> Option<&T> {
        self.items.last()
    }

    fn is_selectable_index(&self, index: usize) -> bool {
        (self.is_item_selectable)(&self.items[index])
    }

    pub fn select_first_item(&self, preserve_tail: bool) -> Self {
        for index in 0..self.items.len() {
            if self.is_selectable_index(index) {
                return self.select_index(index, preserve_tail);
            }
        }
        self.clone()
    }

    pub fn select_last_item(&self, preserve_tail: bool) -> Self {
        for index in (0..self.items.len()).rev() {
            if self.is_selectable_index(index) {
                return self.select_index(index, preserve_tail);
            }
        }
        self.clone()
    }

    pub fn select_all_items(&self) -> Self {
        self.select_first_item(false).select_last_item(true)
    }

    /// Move the head one selectable item forward, collapsing any
    /// multi-range selection to a single range first.
    pub fn select_next_item(&self, preserve_tail: bool) -> Self {
        let Some(first) = self.selections.first() else {
            return self.select_first_item(false);
        };

        let mut index = first.head;
        let mut next_index = index;
        while index + 1 < self.items.len() {
            index += 1;
            if self.is_selectable_index(index) {
                next_index = index;
                break;
            }
        }
        self.select_index(next_index, preserve_tail)
    }

    pub fn select_previous_item(&self, preserve_tail: bool) -> Self {
        let Some(first) = self.selections.first() else {
            return self.select_last_item(false);
        };

        let mut index = first.head;
        let mut previous_index = index;
        while index > 0 {
            index -= 1;
            if self.is_selectable_index(index) {
                previous_index = index;
                break;
            }
        }
        self.select_index(previous_index, preserve_tail)
    }

    /// Select `item`, either replacing the selection or (with
    /// `preserve_tail`) extending the current range's head to it.
    pub fn select_item(&self, item: &T, preserve_tail: bool) -> Self {
        match self.items.iter().position(|candidate| candidate == item) {
            Some(index) => self.select_index(index, preserve_tail),
            None => {
                debug_assert!(false, "selected item is not in the list");
                self.clone()
            }
        }
    }

    pub fn select_index(&self, index: usize, preserve_tail: bool) -> Self {
        debug_assert!(index < self.items.len(), "selection index out of range");

        let mut next = self.clone();
        if preserve_tail && let Some(first) = next.selections.first_mut() {
            first.head = index;
        } else {
            next.selections = vec![SelectionRange::point(index)];
        }
        next
    }

    /// Add a new disjoint range at `item`, or start subtracting if the
    /// item is already selected. The outcome settles at the next
    /// [`coalesce`](Self::coalesce).
    pub fn add_or_subtract_selection(&self, item: &T) -> Self {
        let Some(index) = self.items.iter().position(|candidate| candidate == item) else {
            debug_assert!(false, "selected item is not in the list");
            return self.clone();
        };

        let negate = self.selected_indices().contains(&index);
        let mut next = self.clone();
        next.selections.insert(
            0,
            SelectionRange {
                head: index,
                tail: index,
                negate,
            },
        );
        next
    }

    /// Merge overlapping and adjacent ranges into the most recent one, and
    /// resolve a negated most-recent range by trimming or splitting the
    /// ranges it covers.
    pub fn coalesce(&self) -> Self {
        let mut next = self.clone();
        let Some(most_recent) = next.selections.first().copied() else {
            return next;
        };

        // Grow the coalescing window across unselectable neighbors so two
        // ranges separated only by unselectable items merge.
        let mut start = most_recent.start();
        let mut end = most_recent.end();
        while start > 0 && !next.is_selectable_index(start - 1) {
            start -= 1;
        }
        while end + 1 < next.items.len() && !next.is_selectable_index(end + 1) {
            end += 1;
        }

        let negate = most_recent.negate;
        let mut index = 1;
        while index < next.selections.len() {
            let current = next.selections[index];
            let current_start = current.start();
            let current_end = current.end();

            let touches = start <= current_end + 1 && current_start <= end + 1;
            if !touches {
                index += 1;
                continue;
            }

            if negate {
                // Trim the overlapped range down to the pieces outside the
                // negated window, keeping its head/tail orientation.
                let mut kept = Vec::new();
                if current.head > current.tail {
                    if current_end > end {
                        kept.push(SelectionRange {
                            tail: end + 1,
                            head: current_end,
                            negate: false,
                        });
                    }
                    if current_start < start {
                        kept.push(SelectionRange {
                            tail: current_start,
                            head: start - 1,
                            negate: false,
                        });
                    }
                } else {
                    if current_start < start {
                        kept.push(SelectionRange {
                            head: current_start,
                            tail: start - 1,
                            negate: false,
                        });
                    }
                    if current_end > end {
                        kept.push(SelectionRange {
                            head: end + 1,
                            tail: current_end,
                            negate: false,
                        });
                    }
                }
                let kept_len = kept.len();
                next.selections.splice(index..index + 1, kept);
                index += kept_len;
            } else {
                start = start.min(current_start);
                end = end.max(current_end);
                let first = &mut next.selections[0];
                if first.head >= first.tail {
                    first.head = end;
                    first.tail = start;
                } else {
                    first.head = start;
                    first.tail = end;
                }
                next.selections.remove(index);
            }
        }

        if negate {
            next.selections.remove(0);
        }
        next
    }

    /// Indices of the selected items, in list order. Negated ranges remove
    /// what older ranges added; unselectable items are never included.
    pub fn selected_indices(&self) -> BTreeSet<usize> {
        let mut indices = BTreeSet::new();
        for range in self.selections.iter().rev() {
            for index in range.start()..=range.end() {
                if !self.is_selectable_index(index) {
                    continue;
                }
                if range.negate {
                    indices.remove(&index);
                } else {
                    indices.insert(index);
                }
            }
        }
        indices
    }

    pub fn selected_items(&self) -> Vec<T> {
        self.selected_indices()
            .into_iter()
            .map(|index| self.items[index].clone())
            .collect()
    }

    pub fn head_index(&self) -> Option<usize> {
        self.selections.first().map(|range| range.head)
    }

    pub fn head_item(&self) -> Option<&T> {
        self.head_index().map(|index| &self.items[index])
    }

    pub fn tail_index(&self) -> Option<usize> {
        self.selections.first().map(|range| range.tail)
    }

    /// The lower bound of the most recently modified range.
    pub fn most_recent_start_index(&self) -> Option<usize> {
        self.selections.first().map(SelectionRange::start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn indices<T: Clone + PartialEq>(selection: &ListSelection<T>) -> Vec<usize> {
        selection.selected_indices().into_iter().collect()
    }

    #[test]
    fn starts_with_the_first_item_selected() {
        let selection = ListSelection::new(vec!['a', 'b', 'c']);
        assert_eq!(indices(&selection), vec![0]);
        assert_eq!(selection.head_item(), Some(&'a'));
    }

    #[test]
    fn empty_list_has_no_selection() {
        let selection: ListSelection<char> = ListSelection::new(vec![]);
        assert_eq!(indices(&selection), Vec::<usize>::new());
        assert_eq!(selection.head_item(), None);
        assert_eq!(indices(&selection.select_next_item(false)), Vec::<usize>::new());
    }

    #[test]
    fn select_item_replaces_the_selection() {
        let selection = ListSelection::new(vec!['a', 'b', 'c']).select_item(&'c', false);
        assert_eq!(indices(&selection), vec![2]);
    }

    #[test]
    fn preserve_tail_extends_a_range() {
        let selection = ListSelection::new(vec!['a', 'b', 'c', 'd'])
            .select_item(&'b', false)
            .select_item(&'d', true);
        assert_eq!(indices(&selection), vec![1, 2, 3]);
        assert_eq!(selection.head_index(), Some(3));
        assert_eq!(selection.tail_index(), Some(1));
    }

    #[test]
    fn extension_skips_unselectable_items_in_reporting() {
        // Items 2, 3, 6, 7 are selectable.
        let items = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let selectable: fn(&i32) -> bool = |n| matches!(n, 2 | 3 | 6 | 7);
        let selection = ListSelection::with_selectable(items, selectable)
            .select_item(&2, false)
            .select_item(&7, true);
        assert_eq!(indices(&selection), vec![2, 3, 6, 7]);
    }

    #[test]
    fn next_and_previous_move_between_selectable_items() {
        let items = vec![0, 1, 2, 3, 4];
        let selectable: fn(&i32) -> bool = |n| n % 2 == 0;
        let selection = ListSelection::with_selectable(items, selectable)
            .select_item(&0, false)
            .select_next_item(false);
        assert_eq!(indices(&selection), vec![2]);

        let selection = selection.select_next_item(false);
        assert_eq!(indices(&selection), vec![4]);

        // At the end the head stays put.
        let selection = selection.select_next_item(false);
        assert_eq!(indices(&selection), vec![4]);

        let selection = selection.select_previous_item(false);
        assert_eq!(indices(&selection), vec![2]);
    }

    #[test]
    fn select_last_item_reaches_index_zero() {
        let items = vec![0, 1, 2];
        let selectable: fn(&i32) -> bool = |n| *n == 0;
        let selection = ListSelection::with_selectable(items, selectable).select_last_item(false);
        assert_eq!(indices(&selection), vec![0]);
    }

    #[test]
    fn select_all_spans_first_to_last() {
        let selection = ListSelection::new(vec!['a', 'b', 'c']).select_all_items();
        assert_eq!(indices(&selection), vec![0, 1, 2]);
    }

    #[test]
    fn add_selection_keeps_disjoint_ranges() {
        let selection = ListSelection::new(vec!['a', 'b', 'c', 'd', 'e'])
            .select_item(&'a', false)
            .add_or_subtract_selection(&'d')
            .coalesce();
        assert_eq!(indices(&selection), vec![0, 3]);
    }

    #[test]
    fn coalesce_merges_adjacent_ranges() {
        let selection = ListSelection::new(vec!['a', 'b', 'c', 'd'])
            .select_item(&'a', false)
            .add_or_subtract_selection(&'b')
            .coalesce();
        assert_eq!(indices(&selection), vec![0, 1]);
        // One merged range: extending moves a single head.
        assert_eq!(selection.most_recent_start_index(), Some(0));
    }

    #[test]
    fn subtracting_an_interior_item_splits_the_range() {
        let selection = ListSelection::new(vec!['a', 'b', 'c', 'd', 'e'])
            .select_item(&'a', false)
            .select_item(&'e', true)
            .add_or_subtract_selection(&'c')
            .coalesce();
        assert_eq!(indices(&selection), vec![0, 1, 3, 4]);
    }

    #[test]
    fn subtracting_an_edge_item_trims_the_range() {
        let selection = ListSelection::new(vec!['a', 'b', 'c'])
            .select_item(&'a', false)
            .select_item(&'c', true)
            .add_or_subtract_selection(&'c')
            .coalesce();
        assert_eq!(indices(&selection), vec![0, 1]);
    }

    #[test]
    fn subtracting_an_exact_cover_removes_the_range() {
        let selection = ListSelection::new(vec!['a'])
            .select_item(&'a', false)
            .add_or_subtract_selection(&'a')
            .coalesce();
        assert_eq!(indices(&selection), Vec::<usize>::new());
    }

    #[test]
    fn coalesce_is_idempotent() {
        let selection = ListSelection::new(vec![0, 1, 2, 3, 4, 5])
            .select_index(0, false)
            .add_or_subtract_selection(&2)
            .coalesce()
            .add_or_subtract_selection(&4)
            .add_or_subtract_selection(&2)
            .coalesce();
        assert_eq!(selection.coalesce(), selection);
    }

    #[test]
    fn set_items_clamps_to_the_new_length() {
        let selection = ListSelection::new(vec!['a', 'b', 'c', 'd']).select_item(&'d', false);
        let shrunk = selection.set_items(vec!['a', 'b']);
        assert_eq!(indices(&shrunk), vec![1]);

        let emptied = selection.set_items(vec![]);
        assert_eq!(indices(&emptied), Vec::<usize>::new());
    }
}
