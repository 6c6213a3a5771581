//! Patch model and selection engine for line-level git staging.
//!
//! The crate turns unified diff text into an immutable patch model — file
//! patches made of hunks of typed regions, all anchored on one shared
//! buffer — and derives new, syntactically valid diffs that stage or
//! unstage an arbitrary set of selected lines. A selection engine over the
//! same model keeps a user's hunk or line selection stable while the diff
//! is regenerated underneath it.
//!
//! The crate performs no I/O and never invokes git: diff text comes in,
//! patch text and selection state come out. Applying the derived patches
//! to an index is the caller's business.
//!
//! ```no_run
//! use diff_carve::{parse_diffs, build_multi_file_patch, parse_file_refs, resolve_rows};
//!
//! # fn main() -> Result<(), diff_carve::CarveError> {
//! let diff_text = "...output of git diff...";
//! let patches = build_multi_file_patch(&parse_diffs(diff_text)?)?;
//!
//! let refs = parse_file_refs("src/main.rs:10..15,-20")?;
//! let rows = resolve_rows(&patches, &refs)?;
//! let staged = patches.stage_patch_for_lines(&rows);
//! print!("{staged}");
//! # Ok(())
//! # }
//! ```

use error_set::error_set;

pub mod buffer;
pub mod display;
pub mod parse;
pub mod patch;
pub mod selection;
pub mod selector;

pub use buffer::{BufferBuilder, LayerKind, MarkerId, MarkerLayer, PatchBuffer, RangeTracker};
pub use display::format_patches;
pub use parse::{ParseError, parse_diffs};
pub use patch::{
    BuildError, DiffRecord, File, FileMode, FilePatch, Hunk, HunkRecord, IndexedRowRange,
    MultiFilePatch, Patch, PatchStatus, Region, RegionKind, RowSpan, build_multi_file_patch,
};
pub use selection::{DiffRow, FilePatchSelection, ListSelection, SelectionMode};
pub use selector::{FileLineRefs, LineRef, SelectorError, parse_file_refs, resolve_rows};

error_set! {
    /// Top-level error for diff-carve operations
    CarveError := {
        Parse(ParseError),
        Selector(SelectorError),
        Build(BuildError),
    }
}
