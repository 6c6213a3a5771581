//! A file's diff content and the sub-patch derivations over it.

use std::collections::BTreeSet;

use tracing::trace;

use crate::buffer::BufferBuilder;
use crate::patch::hunk::Hunk;
use crate::patch::region::Region;
use crate::patch::row_range::IndexedRowRange;

/// Whole-file status of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Added,
    Deleted,
    Modified,
}

impl PatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::Added => "added",
            PatchStatus::Deleted => "deleted",
            PatchStatus::Modified => "modified",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "added" => Some(PatchStatus::Added),
            "deleted" => Some(PatchStatus::Deleted),
            "modified" => Some(PatchStatus::Modified),
            _ => None,
        }
    }

    /// The status of the patch that undoes this one.
    pub fn invert(&self) -> Self {
        match self {
            PatchStatus::Added => PatchStatus::Deleted,
            PatchStatus::Deleted => PatchStatus::Added,
            PatchStatus::Modified => PatchStatus::Modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchData {
    status: PatchStatus,
    hunks: Vec<Hunk>,
    changed_line_count: usize,
}

/// The diff content of one file: its status and ordered hunks, or `Absent`
/// when the file has no content diff (mode-only changes, empty diffs).
///
/// `Absent` is idempotent under every operation: queries return empty
/// values and derivations return `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    Present(PatchData),
    Absent,
}

impl Patch {
    pub fn new(status: PatchStatus, hunks: Vec<Hunk>) -> Self {
        let changed_line_count = hunks.iter().map(Hunk::changed_line_count).sum();
        Patch::Present(PatchData {
            status,
            hunks,
            changed_line_count,
        })
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Patch::Present(_))
    }

    pub fn status(&self) -> Option<PatchStatus> {
        match self {
            Patch::Present(data) => Some(data.status),
            Patch::Absent => None,
        }
    }

    pub fn hunks(&self) -> &[Hunk] {
        match self {
            Patch::Present(data) => &data.hunks,
            Patch::Absent => &[],
        }
    }

    /// Cached count of added and deleted buffer rows across all hunks.
    pub fn changed_line_count(&self) -> usize {
        match self {
            Patch::Present(data) => data.changed_line_count,
            Patch::Absent => 0,
        }
    }

    pub fn max_line_number_width(&self) -> usize {
        self.hunks()
            .iter()
            .map(Hunk::max_line_number_width)
            .max()
            .unwrap_or(0)
    }

    /// How many of `rows` land on changed rows of this patch.
    pub fn selected_change_count(&self, rows: &BTreeSet<usize>) -> usize {
        self.hunks()
            .iter()
            .flat_map(|hunk| hunk.changes().iter())
            .filter(|change| change.is_change())
            .map(|change| selected_rows_in(rows, change.range()))
            .sum()
    }

    /// Derive the patch that stages exactly the changed rows in `rows`.
    ///
    /// Selected additions are kept, unselected additions are dropped
    /// outright; selected deletions are kept, unselected deletions become
    /// context (the line is still present in the index). The derived text
    /// is appended to `out`, and each emitted hunk's new-file coordinates
    /// are recomputed from what was actually emitted.
    pub fn stage_patch_for_lines(
        &self,
        rows: &BTreeSet<usize>,
        src: &str,
        out: &mut BufferBuilder,
    ) -> Patch {
        let Patch::Present(data) = self else {
            return Patch::Absent;
        };

        let whole_file = self.selected_change_count(rows) == data.changed_line_count;

        let mut hunks = Vec::new();
        // Net row delta of the hunks emitted so far; the new-file start of
        // each emitted hunk is recomputed from its old-file start plus this.
        let mut delta: isize = 0;

        for hunk in &data.hunks {
            if hunk_selected_count(hunk, rows) == 0 {
                continue;
            }

            let start_row = out.current_row();
            let start_offset = out.current_offset();
            let mut changes = Vec::new();
            let mut old_rows = 0usize;
            let mut new_rows = 0usize;

            for region in hunk.regions() {
                match region {
                    Region::Unchanged(range) => {
                        out.append(src, range);
                        old_rows += range.row_count();
                        new_rows += range.row_count();
                    }
                    Region::NoNewline(range) => {
                        let moved = out.append(src, range);
                        changes.push(Region::NoNewline(moved));
                    }
                    Region::Addition(range) => {
                        for intersection in range.intersect_rows_in(rows, src, false) {
                            let moved = out.append(src, intersection.range);
                            new_rows += moved.row_count();
                            changes.push(Region::Addition(moved));
                        }
                    }
                    Region::Deletion(range) => {
                        for intersection in range.intersect_rows_in(rows, src, true) {
                            let moved = out.append(src, intersection.range);
                            old_rows += moved.row_count();
                            if intersection.gap {
                                new_rows += moved.row_count();
                            } else {
                                changes.push(Region::Deletion(moved));
                            }
                        }
                    }
                }
            }

            let row_range = IndexedRowRange::new(
                start_row,
                out.current_row() - 1,
                start_offset,
                out.current_offset(),
            );
            let new_start = derived_new_start(hunk.old_start_row(), old_rows, new_rows, delta);
            trace!(
                old_start = hunk.old_start_row(),
                new_start,
                old_rows,
                new_rows,
                "emitted stage hunk"
            );

            hunks.push(Hunk::new(
                hunk.old_start_row(),
                old_rows,
                new_start,
                new_rows,
                hunk.section_heading().to_string(),
                row_range,
                changes,
            ));
            delta += new_rows as isize - old_rows as isize;
        }

        let status = if data.status == PatchStatus::Deleted && !whole_file {
            PatchStatus::Modified
        } else {
            data.status
        };
        Patch::new(status, hunks)
    }

    /// Derive the patch that unstages exactly the changed rows in `rows`.
    ///
    /// The result is already inverted: selected additions come back as
    /// deletions, selected deletions as additions. Unselected additions
    /// stay staged and become context; unselected deletions stay deleted
    /// and are dropped. The old side is numbered from this patch's new
    /// side, since that is what the index currently holds.
    pub fn unstage_patch_for_lines(
        &self,
        rows: &BTreeSet<usize>,
        src: &str,
        out: &mut BufferBuilder,
    ) -> Patch {
        let Patch::Present(data) = self else {
            return Patch::Absent;
        };

        let whole_file = self.selected_change_count(rows) == data.changed_line_count;

        let mut hunks = Vec::new();
        // Net row delta of the unstage hunks emitted so far; later hunks'
        // new-file starts shift by this amount.
        let mut delta: isize = 0;

        for hunk in &data.hunks {
            if hunk_selected_count(hunk, rows) == 0 {
                continue;
            }

            let start_row = out.current_row();
            let start_offset = out.current_offset();
            let mut changes = Vec::new();
            let mut old_rows = 0usize;
            let mut new_rows = 0usize;

            for region in hunk.regions() {
                match region {
                    Region::Unchanged(range) => {
                        out.append(src, range);
                        old_rows += range.row_count();
                        new_rows += range.row_count();
                    }
                    Region::NoNewline(range) => {
                        let moved = out.append(src, range);
                        changes.push(Region::NoNewline(moved));
                    }
                    Region::Addition(range) => {
                        for intersection in range.intersect_rows_in(rows, src, true) {
                            let moved = out.append(src, intersection.range);
                            old_rows += moved.row_count();
                            if intersection.gap {
                                new_rows += moved.row_count();
                            } else {
                                changes.push(Region::Deletion(moved));
                            }
                        }
                    }
                    Region::Deletion(range) => {
                        for intersection in range.intersect_rows_in(rows, src, false) {
                            let moved = out.append(src, intersection.range);
                            new_rows += moved.row_count();
                            changes.push(Region::Addition(moved));
                        }
                    }
                }
            }

            let row_range = IndexedRowRange::new(
                start_row,
                out.current_row() - 1,
                start_offset,
                out.current_offset(),
            );
            let old_start = hunk.new_start_row();
            let new_start = derived_new_start(old_start, old_rows, new_rows, delta);
            trace!(old_start, new_start, old_rows, new_rows, "emitted unstage hunk");

            hunks.push(Hunk::new(
                old_start,
                old_rows,
                new_start,
                new_rows,
                hunk.section_heading().to_string(),
                row_range,
                changes,
            ));
            delta += new_rows as isize - old_rows as isize;
        }

        let status = match data.status {
            PatchStatus::Modified => PatchStatus::Modified,
            PatchStatus::Added => {
                if whole_file {
                    PatchStatus::Deleted
                } else {
                    PatchStatus::Modified
                }
            }
            PatchStatus::Deleted => PatchStatus::Added,
        };
        Patch::new(status, hunks)
    }

    /// Derive the full inversion of this patch, unstaging every change at
    /// once without a row set.
    pub fn full_unstage_patch(&self, src: &str, out: &mut BufferBuilder) -> Patch {
        let Patch::Present(data) = self else {
            return Patch::Absent;
        };

        let mut hunks = Vec::new();
        for hunk in &data.hunks {
            let src_range = hunk.row_range();
            let moved = out.append(src, src_range);
            let row_delta = moved.start_row() as isize - src_range.start_row() as isize;
            let byte_delta = moved.start_offset() as isize - src_range.start_offset() as isize;

            let changes = hunk
                .changes()
                .iter()
                .map(|change| {
                    change
                        .invert()
                        .with_range(change.range().offset_by(byte_delta, row_delta))
                })
                .collect();

            hunks.push(Hunk::new(
                hunk.new_start_row(),
                hunk.new_row_count(),
                hunk.old_start_row(),
                hunk.old_row_count(),
                hunk.section_heading().to_string(),
                moved,
                changes,
            ));
        }

        Patch::new(data.status.invert(), hunks)
    }

    pub fn to_string_in(&self, buffer: &str) -> String {
        self.hunks()
            .iter()
            .map(|hunk| hunk.to_string_in(buffer))
            .collect()
    }
}

/// The new-file start of a derived hunk, honoring the unified diff
/// convention that a zero-count side names the line before the change.
/// `delta` is the net row delta of the previously emitted hunks.
fn derived_new_start(old_start: usize, old_rows: usize, new_rows: usize, delta: isize) -> usize {
    let base = old_start as isize + delta;
    let adjusted = if new_rows == 0 {
        base - 1
    } else if old_rows == 0 {
        // The old start already names the line before a pure insertion.
        base + 1
    } else {
        base
    };
    adjusted.max(0) as usize
}

fn selected_rows_in(rows: &BTreeSet<usize>, range: IndexedRowRange) -> usize {
    rows.range(range.start_row()..=range.end_row()).count()
}

fn hunk_selected_count(hunk: &Hunk, rows: &BTreeSet<usize>) -> usize {
    hunk.changes()
        .iter()
        .filter(|change| change.is_change())
        .map(|change| selected_rows_in(rows, change.range()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    // Rows: 0 " 0000" / 1 "+0001" / 2 "-0002" / 3 "-0003" / 4 " 0004"
    const BUFFER: &str = "0000\n0001\n0002\n0003\n0004\n";

    fn fixture() -> Patch {
        Patch::new(
            PatchStatus::Modified,
            vec![Hunk::new(
                10,
                4,
                10,
                3,
                String::new(),
                IndexedRowRange::new(0, 4, 0, BUFFER.len()),
                vec![
                    Region::Addition(IndexedRowRange::new(1, 1, 5, 10)),
                    Region::Deletion(IndexedRowRange::new(2, 3, 10, 20)),
                ],
            )],
        )
    }

    fn rows(values: &[usize]) -> BTreeSet<usize> {
        values.iter().copied().collect()
    }

    #[test]
    fn absent_patch_is_idempotent() {
        let mut out = BufferBuilder::new();
        assert_eq!(
            Patch::Absent.stage_patch_for_lines(&rows(&[1]), "", &mut out),
            Patch::Absent
        );
        assert_eq!(
            Patch::Absent.unstage_patch_for_lines(&rows(&[1]), "", &mut out),
            Patch::Absent
        );
        assert_eq!(Patch::Absent.full_unstage_patch("", &mut out), Patch::Absent);
        assert_eq!(Patch::Absent.changed_line_count(), 0);
        assert_eq!(Patch::Absent.to_string_in(""), "");
        assert_eq!(out.into_text(), "");
    }

    #[test]
    fn staging_all_changed_rows_reproduces_the_patch() {
        let mut out = BufferBuilder::new();
        let staged = fixture().stage_patch_for_lines(&rows(&[1, 2, 3]), BUFFER, &mut out);
        let text = out.into_text();

        assert_eq!(text, BUFFER);
        assert_eq!(staged, fixture());
        assert_eq!(
            staged.to_string_in(&text),
            "@@ -10,4 +10,3 @@\n 0000\n+0001\n-0002\n-0003\n 0004\n",
        );
    }

    #[test]
    fn staging_one_deletion_keeps_the_rest_as_context() {
        let mut out = BufferBuilder::new();
        let staged = fixture().stage_patch_for_lines(&rows(&[2]), BUFFER, &mut out);
        let text = out.into_text();

        // The unselected addition row is dropped from the buffer entirely;
        // the unselected deletion stays behind as context.
        assert_eq!(text, "0000\n0002\n0003\n0004\n");
        assert_eq!(
            staged.to_string_in(&text),
            "@@ -10,4 +10,3 @@\n 0000\n-0002\n 0003\n 0004\n",
        );
    }

    #[test]
    fn staging_one_addition_keeps_unselected_deletions_as_context() {
        let mut out = BufferBuilder::new();
        let staged = fixture().stage_patch_for_lines(&rows(&[1]), BUFFER, &mut out);
        let text = out.into_text();

        assert_eq!(text, "0000\n0001\n0002\n0003\n0004\n");
        assert_eq!(
            staged.to_string_in(&text),
            "@@ -10,4 +10,5 @@\n 0000\n+0001\n 0002\n 0003\n 0004\n",
        );
    }

    #[test]
    fn staging_shifts_later_hunks_by_the_shortfall() {
        // Two hunks; the first adds two rows, the second adds one.
        let buffer = "aaaa\nbbbb\ncccc\ndddd\n";
        let patch = Patch::new(
            PatchStatus::Modified,
            vec![
                Hunk::new(
                    5,
                    0,
                    6,
                    2,
                    String::new(),
                    IndexedRowRange::new(0, 1, 0, 10),
                    vec![Region::Addition(IndexedRowRange::new(0, 1, 0, 10))],
                ),
                Hunk::new(
                    20,
                    1,
                    22,
                    2,
                    String::new(),
                    IndexedRowRange::new(2, 3, 10, 20),
                    vec![Region::Addition(IndexedRowRange::new(2, 2, 10, 15))],
                ),
            ],
        );

        // Stage only the second hunk; its new start must fall back by the
        // first hunk's unstaged net delta of two rows.
        let mut out = BufferBuilder::new();
        let staged = patch.stage_patch_for_lines(&rows(&[2]), buffer, &mut out);
        let text = out.into_text();

        assert_eq!(text, "cccc\ndddd\n");
        assert_eq!(
            staged.to_string_in(&text),
            "@@ -20,1 +20,2 @@\n+cccc\n dddd\n",
        );
    }

    #[test]
    fn staging_partial_deleted_file_becomes_modified() {
        let buffer = "aaaa\nbbbb\n";
        let patch = Patch::new(
            PatchStatus::Deleted,
            vec![Hunk::new(
                1,
                2,
                0,
                0,
                String::new(),
                IndexedRowRange::new(0, 1, 0, 10),
                vec![Region::Deletion(IndexedRowRange::new(0, 1, 0, 10))],
            )],
        );

        let mut out = BufferBuilder::new();
        let partial = patch.stage_patch_for_lines(&rows(&[0]), buffer, &mut out);
        assert_eq!(partial.status(), Some(PatchStatus::Modified));
        assert_eq!(
            partial.to_string_in(&out.into_text()),
            "@@ -1,2 +1,1 @@\n-aaaa\n bbbb\n",
        );

        let mut out = BufferBuilder::new();
        let whole = patch.stage_patch_for_lines(&rows(&[0, 1]), buffer, &mut out);
        assert_eq!(whole.status(), Some(PatchStatus::Deleted));
    }

    #[test]
    fn unstaging_all_changed_rows_matches_full_inversion() {
        let mut out = BufferBuilder::new();
        let unstaged = fixture().unstage_patch_for_lines(&rows(&[1, 2, 3]), BUFFER, &mut out);
        let text = out.into_text();

        let mut full_out = BufferBuilder::new();
        let full = fixture().full_unstage_patch(BUFFER, &mut full_out);

        assert_eq!(text, full_out.into_text());
        assert_eq!(unstaged, full);
        assert_eq!(
            unstaged.to_string_in(&text),
            "@@ -10,3 +10,4 @@\n 0000\n-0001\n+0002\n+0003\n 0004\n",
        );
    }

    #[test]
    fn unstaging_an_addition_restores_nothing_else() {
        let mut out = BufferBuilder::new();
        let unstaged = fixture().unstage_patch_for_lines(&rows(&[1]), BUFFER, &mut out);
        let text = out.into_text();

        // Unselected deletions stay deleted and vanish from the buffer.
        assert_eq!(text, "0000\n0001\n0004\n");
        assert_eq!(
            unstaged.to_string_in(&text),
            "@@ -10,3 +10,2 @@\n 0000\n-0001\n 0004\n",
        );
    }

    #[test]
    fn unstaging_a_deletion_keeps_additions_as_context() {
        let mut out = BufferBuilder::new();
        let unstaged = fixture().unstage_patch_for_lines(&rows(&[2]), BUFFER, &mut out);
        let text = out.into_text();

        assert_eq!(text, "0000\n0001\n0002\n0004\n");
        assert_eq!(
            unstaged.to_string_in(&text),
            "@@ -10,3 +10,4 @@\n 0000\n 0001\n+0002\n 0004\n",
        );
    }

    #[test]
    fn unstage_status_transitions() {
        let buffer = "aaaa\nbbbb\n";
        let added = Patch::new(
            PatchStatus::Added,
            vec![Hunk::new(
                0,
                0,
                1,
                2,
                String::new(),
                IndexedRowRange::new(0, 1, 0, 10),
                vec![Region::Addition(IndexedRowRange::new(0, 1, 0, 10))],
            )],
        );

        let mut out = BufferBuilder::new();
        let whole = added.unstage_patch_for_lines(&rows(&[0, 1]), buffer, &mut out);
        assert_eq!(whole.status(), Some(PatchStatus::Deleted));

        let mut out = BufferBuilder::new();
        let partial = added.unstage_patch_for_lines(&rows(&[0]), buffer, &mut out);
        assert_eq!(partial.status(), Some(PatchStatus::Modified));

        let deleted = Patch::new(
            PatchStatus::Deleted,
            vec![Hunk::new(
                1,
                2,
                0,
                0,
                String::new(),
                IndexedRowRange::new(0, 1, 0, 10),
                vec![Region::Deletion(IndexedRowRange::new(0, 1, 0, 10))],
            )],
        );
        let mut out = BufferBuilder::new();
        let partial = deleted.unstage_patch_for_lines(&rows(&[0]), buffer, &mut out);
        assert_eq!(partial.status(), Some(PatchStatus::Added));
    }

    #[test]
    fn derived_buffer_is_exactly_the_emitted_region_texts() {
        let mut out = BufferBuilder::new();
        let staged = fixture().stage_patch_for_lines(&rows(&[2, 3]), BUFFER, &mut out);
        let text = out.into_text();

        let concatenated: String = staged
            .hunks()
            .iter()
            .flat_map(|hunk| hunk.regions())
            .map(|region| region.range().text_in(&text).to_string())
            .collect();
        assert_eq!(concatenated, text);
    }
}
