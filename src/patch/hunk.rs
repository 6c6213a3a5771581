//! One contiguous change block of a diff.

use std::ops::RangeInclusive;

use crate::patch::region::Region;
use crate::patch::row_range::IndexedRowRange;

/// A hunk: old/new file coordinates plus the regions that cover its rows.
///
/// `changes` stores only the non-context regions (additions, deletions, and
/// the no-newline marker), sorted and non-overlapping within `row_range`.
/// Context is never stored; [`Hunk::regions`] derives it by filling the gaps
/// between changes with synthetic `Unchanged` regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    old_start_row: usize,
    new_start_row: usize,
    old_row_count: usize,
    new_row_count: usize,
    section_heading: String,
    row_range: IndexedRowRange,
    changes: Vec<Region>,
}

impl Hunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        old_start_row: usize,
        old_row_count: usize,
        new_start_row: usize,
        new_row_count: usize,
        section_heading: String,
        row_range: IndexedRowRange,
        changes: Vec<Region>,
    ) -> Self {
        debug_assert!(
            changes
                .windows(2)
                .all(|pair| pair[0].range().end_row() < pair[1].range().start_row()),
            "hunk changes must be sorted and non-overlapping"
        );
        debug_assert!(
            changes.iter().all(|change| {
                row_range.includes_row(change.range().start_row())
                    && row_range.includes_row(change.range().end_row())
            }),
            "hunk changes must be contained in the hunk row range"
        );
        debug_assert!(
            changes.iter().all(|change| !change.is_unchanged()),
            "context regions are derived, never stored"
        );

        Self {
            old_start_row,
            new_start_row,
            old_row_count,
            new_row_count,
            section_heading,
            row_range,
            changes,
        }
    }

    pub fn old_start_row(&self) -> usize {
        self.old_start_row
    }

    pub fn new_start_row(&self) -> usize {
        self.new_start_row
    }

    pub fn old_row_count(&self) -> usize {
        self.old_row_count
    }

    pub fn new_row_count(&self) -> usize {
        self.new_row_count
    }

    pub fn section_heading(&self) -> &str {
        &self.section_heading
    }

    pub fn row_range(&self) -> IndexedRowRange {
        self.row_range
    }

    pub fn buffer_rows(&self) -> RangeInclusive<usize> {
        self.row_range.buffer_rows()
    }

    pub fn buffer_row_count(&self) -> usize {
        self.row_range.row_count()
    }

    pub fn includes_buffer_row(&self, row: usize) -> bool {
        self.row_range.includes_row(row)
    }

    /// The stored non-context regions.
    pub fn changes(&self) -> &[Region] {
        &self.changes
    }

    pub fn additions(&self) -> impl Iterator<Item = &Region> {
        self.changes.iter().filter(|change| change.is_addition())
    }

    pub fn deletions(&self) -> impl Iterator<Item = &Region> {
        self.changes.iter().filter(|change| change.is_deletion())
    }

    /// The trailing no-newline marker, if this hunk carries one.
    pub fn no_newline(&self) -> Option<&Region> {
        self.changes.last().filter(|change| change.is_no_newline())
    }

    /// Full region coverage of the hunk: the stored changes with synthetic
    /// `Unchanged` regions filling every gap.
    pub fn regions(&self) -> Vec<Region> {
        let mut regions = Vec::with_capacity(self.changes.len() * 2 + 1);
        let mut row = self.row_range.start_row();
        let mut offset = self.row_range.start_offset();

        for change in &self.changes {
            let range = change.range();
            if range.start_row() > row {
                regions.push(Region::Unchanged(IndexedRowRange::new(
                    row,
                    range.start_row() - 1,
                    offset,
                    range.start_offset(),
                )));
            }
            regions.push(*change);
            row = range.end_row() + 1;
            offset = range.end_offset();
        }

        if row <= self.row_range.end_row() {
            regions.push(Region::Unchanged(IndexedRowRange::new(
                row,
                self.row_range.end_row(),
                offset,
                self.row_range.end_offset(),
            )));
        }

        regions
    }

    /// The old-file row displayed at `row`, or `None` when the row has no
    /// old-side counterpart (an added line or the no-newline marker).
    pub fn old_row_at(&self, row: usize) -> Option<usize> {
        let mut current = self.old_start_row;

        for region in self.regions() {
            if region.includes_buffer_row(row) {
                let offset = row - region.range().start_row();
                return match region {
                    Region::Unchanged(_) | Region::Deletion(_) => Some(current + offset),
                    Region::Addition(_) | Region::NoNewline(_) => None,
                };
            }

            current += match region {
                Region::Unchanged(_) | Region::Deletion(_) => region.buffer_row_count(),
                Region::Addition(_) | Region::NoNewline(_) => 0,
            };
        }

        None
    }

    /// The new-file row displayed at `row`, or `None` when the row has no
    /// new-side counterpart (a deleted line or the no-newline marker).
    pub fn new_row_at(&self, row: usize) -> Option<usize> {
        let mut current = self.new_start_row;

        for region in self.regions() {
            if region.includes_buffer_row(row) {
                let offset = row - region.range().start_row();
                return match region {
                    Region::Unchanged(_) | Region::Addition(_) => Some(current + offset),
                    Region::Deletion(_) | Region::NoNewline(_) => None,
                };
            }

            current += match region {
                Region::Unchanged(_) | Region::Addition(_) => region.buffer_row_count(),
                Region::Deletion(_) | Region::NoNewline(_) => 0,
            };
        }

        None
    }

    /// Buffer rows holding added or deleted lines, excluding the no-newline
    /// marker.
    pub fn changed_line_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|change| change.is_change())
            .map(|change| change.buffer_row_count())
            .sum()
    }

    /// Digits needed to render the widest line number in this hunk.
    pub fn max_line_number_width(&self) -> usize {
        let old_max = self.old_start_row + self.old_row_count;
        let new_max = self.new_start_row + self.new_row_count;
        old_max.max(new_max).to_string().len()
    }

    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start_row, self.old_row_count, self.new_start_row, self.new_row_count
        )
    }

    /// Swap the old and new sides: coordinates exchange and every change
    /// region inverts. The buffer locations are untouched.
    pub fn invert(&self) -> Hunk {
        Hunk {
            old_start_row: self.new_start_row,
            new_start_row: self.old_start_row,
            old_row_count: self.new_row_count,
            new_row_count: self.old_row_count,
            section_heading: self.section_heading.clone(),
            row_range: self.row_range,
            changes: self.changes.iter().map(Region::invert).collect(),
        }
    }

    pub fn to_string_in(&self, buffer: &str) -> String {
        let mut out = self.header();
        out.push('\n');
        for region in self.regions() {
            out.push_str(&region.to_string_in(buffer));
        }
        out
    }
}
