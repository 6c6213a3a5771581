//! Row ranges paired with byte offsets into the shared patch buffer.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// A contiguous span of buffer rows together with the byte offsets that
/// bound its text.
///
/// Rows are 0-based and the end row is inclusive; `end_offset` is exclusive.
/// The byte span always covers exactly the rows' text including their
/// trailing newlines, so `text_in` slices are exact substrings of the
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRowRange {
    start_row: usize,
    end_row: usize,
    start_offset: usize,
    end_offset: usize,
}

/// One maximal run produced by [`IndexedRowRange::intersect_rows_in`]: a
/// sub-range whose rows are either all inside the queried set, or (`gap`)
/// all outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIntersection {
    pub range: IndexedRowRange,
    pub gap: bool,
}

impl IndexedRowRange {
    pub fn new(start_row: usize, end_row: usize, start_offset: usize, end_offset: usize) -> Self {
        debug_assert!(start_row <= end_row, "inverted row range");
        debug_assert!(start_offset <= end_offset, "inverted offset range");
        Self {
            start_row,
            end_row,
            start_offset,
            end_offset,
        }
    }

    pub fn start_row(&self) -> usize {
        self.start_row
    }

    pub fn end_row(&self) -> usize {
        self.end_row
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub fn row_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn byte_count(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn buffer_rows(&self) -> RangeInclusive<usize> {
        self.start_row..=self.end_row
    }

    pub fn includes_row(&self, row: usize) -> bool {
        self.start_row <= row && row <= self.end_row
    }

    /// The exact text this range covers in `buffer`.
    pub fn text_in<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.start_offset..self.end_offset]
    }

    /// Translate the whole range by a row and byte delta. Zero deltas
    /// return the value unchanged.
    pub fn offset_by(&self, byte_delta: isize, row_delta: isize) -> Self {
        if byte_delta == 0 && row_delta == 0 {
            return *self;
        }
        Self {
            start_row: offset(self.start_row, row_delta),
            end_row: offset(self.end_row, row_delta),
            start_offset: offset(self.start_offset, byte_delta),
            end_offset: offset(self.end_offset, byte_delta),
        }
    }

    /// Split this range by membership in `rows`, emitting one maximal
    /// sub-range per membership run. Runs outside the set are emitted only
    /// when `include_gaps` is set, tagged as gaps.
    ///
    /// Offsets are tracked by scanning `buffer` for the newline that ends
    /// each row, so every emitted sub-range slices to an exact substring.
    pub fn intersect_rows_in(
        &self,
        rows: &BTreeSet<usize>,
        buffer: &str,
        include_gaps: bool,
    ) -> Vec<RowIntersection> {
        let mut out = Vec::new();

        let mut run_start_row = self.start_row;
        let mut run_start_offset = self.start_offset;
        let mut run_selected = rows.contains(&self.start_row);
        let mut offset = self.start_offset;

        for row in self.start_row..=self.end_row {
            let selected = rows.contains(&row);
            if selected != run_selected {
                if run_selected || include_gaps {
                    out.push(RowIntersection {
                        range: Self::new(run_start_row, row - 1, run_start_offset, offset),
                        gap: !run_selected,
                    });
                }
                run_start_row = row;
                run_start_offset = offset;
                run_selected = selected;
            }

            offset = match buffer[offset..].find('\n') {
                Some(i) => offset + i + 1,
                None => buffer.len(),
            };
        }

        debug_assert!(
            offset == self.end_offset,
            "offset bookkeeping out of sync with buffer text"
        );

        if run_selected || include_gaps {
            out.push(RowIntersection {
                range: Self::new(run_start_row, self.end_row, run_start_offset, offset),
                gap: !run_selected,
            });
        }

        out
    }
}

fn offset(value: usize, delta: isize) -> usize {
    if delta >= 0 {
        value + delta as usize
    } else {
        value - delta.unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const BUFFER: &str = "0000\n1111\n2222\n3333\n4444\n";

    fn whole() -> IndexedRowRange {
        IndexedRowRange::new(0, 4, 0, BUFFER.len())
    }

    fn rows(values: &[usize]) -> BTreeSet<usize> {
        values.iter().copied().collect()
    }

    #[test]
    fn text_in_slices_exact_rows() {
        let range = IndexedRowRange::new(1, 2, 5, 15);
        assert_eq!(range.text_in(BUFFER), "1111\n2222\n");
        assert_eq!(range.row_count(), 2);
        assert_eq!(range.byte_count(), 10);
    }

    #[test]
    fn offset_by_zero_is_identity() {
        let range = IndexedRowRange::new(1, 2, 5, 15);
        assert_eq!(range.offset_by(0, 0), range);
    }

    #[test]
    fn offset_by_translates_rows_and_offsets() {
        let range = IndexedRowRange::new(1, 2, 5, 15);
        assert_eq!(
            range.offset_by(-5, 2),
            IndexedRowRange::new(3, 4, 0, 10),
        );
    }

    #[test]
    fn intersect_whole_selection_is_single_run() {
        let result = whole().intersect_rows_in(&rows(&[0, 1, 2, 3, 4]), BUFFER, true);
        assert_eq!(
            result,
            vec![RowIntersection {
                range: whole(),
                gap: false
            }],
        );
    }

    #[test]
    fn intersect_empty_selection_is_single_gap() {
        let result = whole().intersect_rows_in(&rows(&[]), BUFFER, true);
        assert_eq!(
            result,
            vec![RowIntersection {
                range: whole(),
                gap: true
            }],
        );
        assert!(whole().intersect_rows_in(&rows(&[]), BUFFER, false).is_empty());
    }

    #[test]
    fn intersect_emits_alternating_runs() {
        let result = whole().intersect_rows_in(&rows(&[1, 2, 4]), BUFFER, true);
        assert_eq!(
            result,
            vec![
                RowIntersection {
                    range: IndexedRowRange::new(0, 0, 0, 5),
                    gap: true
                },
                RowIntersection {
                    range: IndexedRowRange::new(1, 2, 5, 15),
                    gap: false
                },
                RowIntersection {
                    range: IndexedRowRange::new(3, 3, 15, 20),
                    gap: true
                },
                RowIntersection {
                    range: IndexedRowRange::new(4, 4, 20, 25),
                    gap: false
                },
            ],
        );
    }

    #[test]
    fn intersect_without_gaps_drops_unselected_runs() {
        let result = whole().intersect_rows_in(&rows(&[1, 2, 4]), BUFFER, false);
        assert_eq!(
            result,
            vec![
                RowIntersection {
                    range: IndexedRowRange::new(1, 2, 5, 15),
                    gap: false
                },
                RowIntersection {
                    range: IndexedRowRange::new(4, 4, 20, 25),
                    gap: false
                },
            ],
        );
    }

    #[test]
    fn intersect_sub_ranges_slice_to_exact_substrings() {
        for intersection in whole().intersect_rows_in(&rows(&[0, 3]), BUFFER, true) {
            let text = intersection.range.text_in(BUFFER);
            assert_eq!(text.lines().count(), intersection.range.row_count());
            assert!(text.ends_with('\n'));
        }
    }

    #[test]
    fn intersect_ignores_rows_outside_range() {
        let range = IndexedRowRange::new(1, 2, 5, 15);
        let result = range.intersect_rows_in(&rows(&[0, 2, 4]), BUFFER, false);
        assert_eq!(
            result,
            vec![RowIntersection {
                range: IndexedRowRange::new(2, 2, 10, 15),
                gap: false
            }],
        );
    }
}
