//! Shared patch text buffer and range-tracking marker layers.
//!
//! Every patch model type stores row spans into one flat text buffer instead
//! of owning line strings. The buffer carries one [`MarkerLayer`] per span
//! kind so that a buffer row can be resolved back to the patch, hunk, or
//! region that covers it without scanning the whole model.

use crate::patch::IndexedRowRange;

/// Handle for a range registered with a [`RangeTracker`].
pub type MarkerId = usize;

/// A row span registered on a marker layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedRange {
    pub id: MarkerId,
    pub start_row: usize,
    pub end_row: usize,
}

impl TrackedRange {
    pub fn intersects_row(&self, row: usize) -> bool {
        self.start_row <= row && row <= self.end_row
    }
}

/// Range tracking capability consumed by the patch model.
///
/// The model only ever marks ranges in ascending row order and queries them
/// by single row, so an ordered array with binary search is sufficient.
pub trait RangeTracker {
    /// Register a row span and return its handle.
    fn mark_range(&mut self, start_row: usize, end_row: usize) -> MarkerId;

    /// All tracked ranges covering `row`.
    fn find_intersecting(&self, row: usize) -> Vec<TrackedRange>;

    /// Drop every tracked range.
    fn clear(&mut self);
}

/// Ordered-array [`RangeTracker`].
///
/// Ranges are kept sorted by start row. The layers built by the patch
/// builder never overlap, so lookups resolve to at most one range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerLayer {
    next_id: MarkerId,
    ranges: Vec<TrackedRange>,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedRange> {
        self.ranges.iter()
    }

    /// The single tracked range covering `row`, if any.
    pub fn range_at(&self, row: usize) -> Option<TrackedRange> {
        let idx = self.ranges.partition_point(|r| r.end_row < row);
        self.ranges
            .get(idx)
            .filter(|r| r.start_row <= row)
            .copied()
    }
}

impl RangeTracker for MarkerLayer {
    fn mark_range(&mut self, start_row: usize, end_row: usize) -> MarkerId {
        debug_assert!(start_row <= end_row, "inverted marker range");
        debug_assert!(
            self.ranges.last().is_none_or(|last| last.end_row < start_row),
            "marker ranges must be registered in ascending row order"
        );

        let id = self.next_id;
        self.next_id += 1;
        self.ranges.push(TrackedRange {
            id,
            start_row,
            end_row,
        });
        id
    }

    fn find_intersecting(&self, row: usize) -> Vec<TrackedRange> {
        self.range_at(row).into_iter().collect()
    }

    fn clear(&mut self) {
        self.ranges.clear();
        self.next_id = 0;
    }
}

/// Named marker layers carried by a [`PatchBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Patch,
    Hunk,
    Unchanged,
    Addition,
    Deletion,
    NoNewline,
}

const LAYER_COUNT: usize = 6;

impl LayerKind {
    fn index(self) -> usize {
        match self {
            LayerKind::Patch => 0,
            LayerKind::Hunk => 1,
            LayerKind::Unchanged => 2,
            LayerKind::Addition => 3,
            LayerKind::Deletion => 4,
            LayerKind::NoNewline => 5,
        }
    }
}

/// The flat text buffer shared by every hunk of a patch set, plus its
/// marker layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchBuffer {
    text: String,
    layers: [MarkerLayer; LAYER_COUNT],
}

impl PatchBuffer {
    pub fn new(text: String) -> Self {
        Self {
            text,
            layers: Default::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the buffer contents in place, keeping the allocation.
    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }

    pub fn layer(&self, kind: LayerKind) -> &MarkerLayer {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut MarkerLayer {
        &mut self.layers[kind.index()]
    }

    /// Clear every marker layer. Used when another patch set adopts this
    /// buffer and re-marks its own spans onto it.
    pub fn clear_layers(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }
}

/// Accumulates the text of a derived patch, tracking the row and byte
/// position that the next appended span will land on.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    text: String,
    row: usize,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_row(&self) -> usize {
        self.row
    }

    pub fn current_offset(&self) -> usize {
        self.text.len()
    }

    /// Append one line of text, newline-terminated, advancing the row
    /// position.
    pub fn append_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.row += 1;
    }

    /// Copy `range`'s text out of `src` and return the equivalent range
    /// positioned at the end of the buffer under construction.
    pub fn append(&mut self, src: &str, range: IndexedRowRange) -> IndexedRowRange {
        let start_row = self.row;
        let start_offset = self.text.len();

        self.text.push_str(range.text_in(src));
        self.row += range.row_count();

        IndexedRowRange::new(start_row, self.row - 1, start_offset, self.text.len())
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
