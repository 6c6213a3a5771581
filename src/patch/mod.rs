//! The patch data model: row ranges, regions, hunks, and the file patch
//! aggregates built on the shared buffer.

pub mod builder;
pub mod file;
pub mod file_patch;
pub mod hunk;
#[allow(clippy::module_inception)]
pub mod patch;
pub mod region;
pub mod row_range;

mod multi;

pub use builder::{BuildError, DiffRecord, HunkRecord, build_file_patch_in, build_multi_file_patch};
pub use file::{File, FileMode};
pub use file_patch::FilePatch;
pub use hunk::Hunk;
pub use multi::{MultiFilePatch, RowSpan};
pub use patch::{Patch, PatchStatus};
pub use region::{Region, RegionKind};
pub use row_range::{IndexedRowRange, RowIntersection};
