//! Many file patches anchored on one shared buffer.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::buffer::{BufferBuilder, LayerKind, MarkerId, PatchBuffer, RangeTracker};
use crate::patch::file_patch::FilePatch;
use crate::patch::hunk::Hunk;
use crate::patch::region::RegionKind;

/// An inclusive row span returned to the selection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start_row: usize,
    pub end_row: usize,
}

impl RowSpan {
    pub fn new(start_row: usize, end_row: usize) -> Self {
        Self { start_row, end_row }
    }
}

/// A set of file patches sharing one buffer, with marker layers resolving
/// buffer rows back to the file patch and hunk that cover them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFilePatch {
    buffer: PatchBuffer,
    file_patches: Vec<FilePatch>,
    marker_to_file_patch: HashMap<MarkerId, usize>,
    marker_to_hunk: HashMap<MarkerId, (usize, usize)>,
}

impl MultiFilePatch {
    pub fn new(text: String, file_patches: Vec<FilePatch>) -> Self {
        let mut buffer = PatchBuffer::new(text);
        let (marker_to_file_patch, marker_to_hunk) = mark_layers(&mut buffer, &file_patches);
        debug!(
            file_patches = file_patches.len(),
            bytes = buffer.text().len(),
            "assembled multi-file patch"
        );
        Self {
            buffer,
            file_patches,
            marker_to_file_patch,
            marker_to_hunk,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), vec![])
    }

    pub fn buffer(&self) -> &PatchBuffer {
        &self.buffer
    }

    pub fn file_patches(&self) -> &[FilePatch] {
        &self.file_patches
    }

    pub fn is_empty(&self) -> bool {
        self.file_patches.is_empty()
    }

    pub fn changed_line_count(&self) -> usize {
        self.file_patches
            .iter()
            .map(FilePatch::changed_line_count)
            .sum()
    }

    /// The file patch whose hunks cover `row`.
    pub fn file_patch_at(&self, row: usize) -> Option<&FilePatch> {
        let marker = self.buffer.layer(LayerKind::Patch).range_at(row)?;
        let index = self.marker_to_file_patch.get(&marker.id)?;
        self.file_patches.get(*index)
    }

    /// The hunk covering `row`.
    pub fn hunk_at(&self, row: usize) -> Option<&Hunk> {
        let marker = self.buffer.layer(LayerKind::Hunk).range_at(row)?;
        let (patch_index, hunk_index) = self.marker_to_hunk.get(&marker.id)?;
        self.file_patches
            .get(*patch_index)
            .and_then(|fp| fp.hunks().get(*hunk_index))
    }

    /// The file patches covering any row in `rows`, in patch order.
    ///
    /// Rows are visited in descending order and consecutive rows falling in
    /// the most recently found patch skip the layer query.
    pub fn file_patches_containing(
        &self,
        rows: impl IntoIterator<Item = usize>,
    ) -> Vec<&FilePatch> {
        let mut sorted: Vec<usize> = rows.into_iter().collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));

        let mut indices: Vec<usize> = Vec::new();
        let mut last: Option<(usize, RowSpan)> = None;
        for row in sorted {
            if let Some((_, span)) = last
                && span.start_row <= row
                && row <= span.end_row
            {
                continue;
            }
            let Some(marker) = self.buffer.layer(LayerKind::Patch).range_at(row) else {
                continue;
            };
            let Some(&index) = self.marker_to_file_patch.get(&marker.id) else {
                continue;
            };
            indices.push(index);
            last = Some((index, RowSpan::new(marker.start_row, marker.end_row)));
        }

        indices.reverse();
        indices
            .into_iter()
            .filter_map(|index| self.file_patches.get(index))
            .collect()
    }

    /// Fan staging out across every file patch containing a selected row,
    /// assembling the results on a freshly built shared buffer.
    pub fn stage_patch_for_lines(&self, rows: &BTreeSet<usize>) -> MultiFilePatch {
        self.derive(rows, |fp, fp_rows, src, out| {
            fp.stage_patch_for_lines(fp_rows, src, out)
        })
    }

    pub fn stage_patch_for_hunk(&self, hunk: &Hunk) -> MultiFilePatch {
        self.stage_patch_for_lines(&hunk.buffer_rows().collect())
    }

    /// Fan unstaging out across every file patch containing a selected row.
    pub fn unstage_patch_for_lines(&self, rows: &BTreeSet<usize>) -> MultiFilePatch {
        self.derive(rows, |fp, fp_rows, src, out| {
            fp.unstage_patch_for_lines(fp_rows, src, out)
        })
    }

    pub fn unstage_patch_for_hunk(&self, hunk: &Hunk) -> MultiFilePatch {
        self.unstage_patch_for_lines(&hunk.buffer_rows().collect())
    }

    /// Invert every file patch, unstaging all of them at once.
    pub fn full_unstage_patch(&self) -> MultiFilePatch {
        let mut out = BufferBuilder::new();
        let file_patches = self
            .file_patches
            .iter()
            .map(|fp| fp.full_unstage_patch(self.buffer.text(), &mut out))
            .collect();
        MultiFilePatch::new(out.into_text(), file_patches)
    }

    fn derive(
        &self,
        rows: &BTreeSet<usize>,
        derive_one: impl Fn(&FilePatch, &BTreeSet<usize>, &str, &mut BufferBuilder) -> FilePatch,
    ) -> MultiFilePatch {
        let mut out = BufferBuilder::new();
        let mut file_patches = Vec::new();

        for fp in &self.file_patches {
            let Some(span) = file_patch_span(fp) else {
                continue;
            };
            let fp_rows: BTreeSet<usize> = rows
                .range(span.start_row..=span.end_row)
                .copied()
                .collect();
            if fp_rows.is_empty() {
                continue;
            }
            file_patches.push(derive_one(fp, &fp_rows, self.buffer.text(), &mut out));
        }

        MultiFilePatch::new(out.into_text(), file_patches)
    }

    /// Re-anchor this patch set onto `previous`, the buffer of the patch
    /// set it replaces, so host state tied to that buffer survives the
    /// refresh. The donor's layers are cleared and rewritten; afterwards
    /// `previous` holds the discarded buffer.
    pub fn adopt_buffer_from(&mut self, previous: &mut PatchBuffer) {
        previous.set_text(self.buffer.text());
        let (marker_to_file_patch, marker_to_hunk) = mark_layers(previous, &self.file_patches);
        std::mem::swap(&mut self.buffer, previous);
        previous.clear_layers();
        self.marker_to_file_patch = marker_to_file_patch;
        self.marker_to_hunk = marker_to_hunk;
    }

    /// Where the selection should land after this patch set replaced
    /// `last`: the changed row whose position among still-unselected
    /// changed rows matches the count of unselected changed rows that
    /// preceded the highest previously selected row.
    pub fn next_selection_range(
        &self,
        last: &MultiFilePatch,
        last_selected_rows: &BTreeSet<usize>,
    ) -> RowSpan {
        let Some(&last_max) = last_selected_rows.iter().next_back() else {
            // Nothing was selected: land on the first change of the first
            // hunk.
            let first_change = self
                .file_patches
                .iter()
                .flat_map(|fp| fp.hunks())
                .flat_map(|hunk| hunk.changes().iter())
                .find(|change| change.is_change());
            return match first_change {
                Some(change) => {
                    RowSpan::new(change.range().start_row(), change.range().end_row())
                }
                None => RowSpan::new(0, 0),
            };
        };

        let mut index = 0usize;
        'walk: for fp in last.file_patches() {
            for hunk in fp.hunks() {
                for change in hunk.changes().iter().filter(|change| change.is_change()) {
                    for intersection in
                        change.intersect_rows_in(last_selected_rows, last.buffer.text(), true)
                    {
                        let includes_max = intersection.range.includes_row(last_max);
                        let delta = if includes_max {
                            last_max - intersection.range.start_row() + 1
                        } else {
                            intersection.range.row_count()
                        };
                        if intersection.gap {
                            index += delta;
                        }
                        if includes_max {
                            break 'walk;
                        }
                    }
                }
            }
        }

        let mut remaining = index;
        let mut last_changed_row = None;
        for fp in &self.file_patches {
            for hunk in fp.hunks() {
                for change in hunk.changes().iter().filter(|change| change.is_change()) {
                    let count = change.buffer_row_count();
                    if remaining < count {
                        let row = change.range().start_row() + remaining;
                        return RowSpan::new(row, row);
                    }
                    remaining -= count;
                    last_changed_row = Some(change.range().end_row());
                }
            }
        }

        match last_changed_row {
            Some(row) => RowSpan::new(row, row),
            None => RowSpan::new(0, 0),
        }
    }

    pub fn max_line_number_width(&self) -> usize {
        self.file_patches
            .iter()
            .map(FilePatch::max_line_number_width)
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for MultiFilePatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for fp in &self.file_patches {
            write!(f, "{}", fp.to_string_in(self.buffer.text()))?;
        }
        Ok(())
    }
}

fn file_patch_span(fp: &FilePatch) -> Option<RowSpan> {
    let hunks = fp.hunks();
    match (hunks.first(), hunks.last()) {
        (Some(first), Some(last)) => Some(RowSpan::new(
            first.row_range().start_row(),
            last.row_range().end_row(),
        )),
        _ => None,
    }
}

fn mark_layers(
    buffer: &mut PatchBuffer,
    file_patches: &[FilePatch],
) -> (HashMap<MarkerId, usize>, HashMap<MarkerId, (usize, usize)>) {
    buffer.clear_layers();
    let mut marker_to_file_patch = HashMap::new();
    let mut marker_to_hunk = HashMap::new();

    for (patch_index, fp) in file_patches.iter().enumerate() {
        if let Some(span) = file_patch_span(fp) {
            let id = buffer
                .layer_mut(LayerKind::Patch)
                .mark_range(span.start_row, span.end_row);
            marker_to_file_patch.insert(id, patch_index);
        }

        for (hunk_index, hunk) in fp.hunks().iter().enumerate() {
            let range = hunk.row_range();
            let id = buffer
                .layer_mut(LayerKind::Hunk)
                .mark_range(range.start_row(), range.end_row());
            marker_to_hunk.insert(id, (patch_index, hunk_index));

            for region in hunk.regions() {
                let kind = match region.kind() {
                    RegionKind::Unchanged => LayerKind::Unchanged,
                    RegionKind::Addition => LayerKind::Addition,
                    RegionKind::Deletion => LayerKind::Deletion,
                    RegionKind::NoNewline => LayerKind::NoNewline,
                };
                buffer
                    .layer_mut(kind)
                    .mark_range(region.range().start_row(), region.range().end_row());
            }
        }
    }

    (marker_to_file_patch, marker_to_hunk)
}
