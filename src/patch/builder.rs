//! Construction of patch models from raw parsed-diff records.

use error_set::error_set;
use tracing::debug;

use crate::buffer::BufferBuilder;
use crate::patch::file::{File, FileMode};
use crate::patch::file_patch::FilePatch;
use crate::patch::hunk::Hunk;
use crate::patch::multi::MultiFilePatch;
use crate::patch::patch::{Patch, PatchStatus};
use crate::patch::region::{Region, RegionKind};
use crate::patch::row_range::IndexedRowRange;

error_set! {
    /// Errors from assembling patch models out of raw diff records
    BuildError := {
        /// A file produced more raw diffs than the one content diff plus
        /// one mode-change diff that combined changes are allowed
        #[display("Unexpected number of diffs for one file: {count}")]
        UnexpectedDiffCount { count: usize },
        /// A hunk line began with something other than '+', '-', ' ', '\\'
        #[display("Unknown diff line origin: {origin}")]
        UnknownLineOrigin { origin: char },
        /// A hunk line was empty and carried no origin character
        #[display("Diff line is missing its origin character")]
        MissingLineOrigin,
        /// The record's status string was not added/deleted/modified
        #[display("Unrecognized patch status: {status}")]
        UnrecognizedStatus { status: String },
        /// A combined diff's mode-change half had a status other than
        /// added or deleted
        #[display("Invalid mode change diff status: {status}")]
        InvalidModeChangeStatus { status: String },
    }
}

/// One raw diff as produced by the external diff parser: file facts plus
/// hunks of origin-prefixed lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub old_mode: Option<FileMode>,
    pub new_mode: Option<FileMode>,
    pub status: String,
    pub hunks: Vec<HunkRecord>,
}

impl DiffRecord {
    pub fn path(&self) -> Option<&str> {
        self.old_path.as_deref().or(self.new_path.as_deref())
    }
}

/// One raw hunk: header coordinates plus lines still carrying their origin
/// character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkRecord {
    pub old_start_line: usize,
    pub old_line_count: usize,
    pub new_start_line: usize,
    pub new_line_count: usize,
    pub heading: String,
    pub lines: Vec<String>,
}

/// Assemble a [`MultiFilePatch`] from raw records, grouping consecutive
/// records for the same path into one file patch. Two records for a path
/// describe a combined mode-change plus content-change diff; more is an
/// error.
pub fn build_multi_file_patch(records: &[DiffRecord]) -> Result<MultiFilePatch, BuildError> {
    let mut out = BufferBuilder::new();
    let mut file_patches = Vec::new();

    let mut index = 0;
    while index < records.len() {
        let mut group_end = index + 1;
        while group_end < records.len() && records[group_end].path() == records[index].path() {
            group_end += 1;
        }

        let group = &records[index..group_end];
        file_patches.push(build_file_patch_in(group, &mut out)?);
        index = group_end;
    }

    debug!(records = records.len(), file_patches = file_patches.len(), "built patch models");
    Ok(MultiFilePatch::new(out.into_text(), file_patches))
}

/// Assemble a single [`FilePatch`] onto `out`. Zero records produce the
/// absent file patch.
pub fn build_file_patch_in(
    records: &[DiffRecord],
    out: &mut BufferBuilder,
) -> Result<FilePatch, BuildError> {
    match records {
        [] => Ok(FilePatch::absent()),
        [single] => single_diff_file_patch(single, out),
        [first, second] => dual_diff_file_patch(first, second, out),
        _ => Err(BuildError::UnexpectedDiffCount {
            count: records.len(),
        }),
    }
}

fn parse_status(status: &str) -> Result<PatchStatus, BuildError> {
    PatchStatus::parse(status).ok_or_else(|| BuildError::UnrecognizedStatus {
        status: status.to_string(),
    })
}

fn single_diff_file_patch(
    record: &DiffRecord,
    out: &mut BufferBuilder,
) -> Result<FilePatch, BuildError> {
    let status = parse_status(&record.status)?;
    let was_symlink = record.old_mode.as_ref().is_some_and(FileMode::is_symlink);
    let is_symlink = record.new_mode.as_ref().is_some_and(FileMode::is_symlink);
    let hunks = build_hunks(&record.hunks, out)?;

    // A symlink diff's hunk body is the link target itself.
    let target_line = |hunk: usize, line: usize| -> Option<String> {
        record
            .hunks
            .get(hunk)
            .and_then(|h| h.lines.get(line))
            .map(|l| l.get(1..).unwrap_or("").to_string())
    };
    let (old_symlink, new_symlink) = match (was_symlink, is_symlink) {
        (true, false) => (target_line(0, 0), None),
        (false, true) => (None, target_line(0, 0)),
        (true, true) => (target_line(0, 0), target_line(0, 2)),
        (false, false) => (None, None),
    };

    let old_file = match &record.old_path {
        Some(path) => File::new(
            path.clone(),
            record.old_mode.clone().unwrap_or_else(FileMode::normal),
            old_symlink,
        ),
        None => File::Absent,
    };
    let new_file = match &record.new_path {
        Some(path) => File::new(
            path.clone(),
            record.new_mode.clone().unwrap_or_else(FileMode::normal),
            new_symlink,
        ),
        None => File::Absent,
    };

    Ok(FilePatch::new(old_file, new_file, Patch::new(status, hunks)))
}

fn dual_diff_file_patch(
    first: &DiffRecord,
    second: &DiffRecord,
    out: &mut BufferBuilder,
) -> Result<FilePatch, BuildError> {
    let first_is_mode_change = first.old_mode.as_ref().is_some_and(FileMode::is_symlink)
        || first.new_mode.as_ref().is_some_and(FileMode::is_symlink);
    let (mode_change, content_change) = if first_is_mode_change {
        (first, second)
    } else {
        (second, first)
    };

    let hunks = build_hunks(&content_change.hunks, out)?;
    let path = content_change
        .path()
        .unwrap_or_default()
        .to_string();
    let symlink = mode_change
        .hunks
        .first()
        .and_then(|h| h.lines.first())
        .map(|l| l.get(1..).unwrap_or("").to_string());

    let (status, old_mode, new_mode, old_symlink, new_symlink) =
        match parse_status(&mode_change.status)? {
            // The file's contents were deleted and replaced with a symlink.
            PatchStatus::Added => (
                PatchStatus::Deleted,
                content_change.old_mode.clone(),
                mode_change.new_mode.clone(),
                None,
                symlink,
            ),
            // The file's contents were added after a symlink was deleted.
            PatchStatus::Deleted => (
                PatchStatus::Added,
                mode_change.old_mode.clone(),
                content_change.new_mode.clone(),
                symlink,
                None,
            ),
            PatchStatus::Modified => {
                return Err(BuildError::InvalidModeChangeStatus {
                    status: mode_change.status.clone(),
                });
            }
        };

    let old_file = File::new(
        path.clone(),
        old_mode.unwrap_or_else(FileMode::normal),
        old_symlink,
    );
    let new_file = File::new(path, new_mode.unwrap_or_else(FileMode::normal), new_symlink);

    Ok(FilePatch::new(old_file, new_file, Patch::new(status, hunks)))
}

fn region_kind_for(origin: char) -> Result<Option<RegionKind>, BuildError> {
    match origin {
        '+' => Ok(Some(RegionKind::Addition)),
        '-' => Ok(Some(RegionKind::Deletion)),
        ' ' => Ok(None),
        '\\' => Ok(Some(RegionKind::NoNewline)),
        other => Err(BuildError::UnknownLineOrigin { origin: other }),
    }
}

/// Accumulate one hunk's lines onto the buffer, coalescing consecutive
/// lines of the same origin into single regions. Context runs are not
/// stored; they are re-derived from the gaps.
fn build_hunks(
    records: &[HunkRecord],
    out: &mut BufferBuilder,
) -> Result<Vec<Hunk>, BuildError> {
    let mut hunks = Vec::new();

    for record in records {
        if record.lines.is_empty() {
            continue;
        }

        let hunk_start_row = out.current_row();
        let hunk_start_offset = out.current_offset();

        let mut changes: Vec<Region> = Vec::new();
        let mut run_kind: Option<RegionKind> = None;
        let mut run_start_row = hunk_start_row;
        let mut run_start_offset = hunk_start_offset;
        let mut run_open = false;

        for line in &record.lines {
            let origin = line.chars().next().ok_or(BuildError::MissingLineOrigin)?;
            let kind = region_kind_for(origin)?;

            if !run_open || kind != run_kind {
                if run_open && let Some(kind) = run_kind {
                    changes.push(Region::new(
                        kind,
                        IndexedRowRange::new(
                            run_start_row,
                            out.current_row() - 1,
                            run_start_offset,
                            out.current_offset(),
                        ),
                    ));
                }
                run_kind = kind;
                run_start_row = out.current_row();
                run_start_offset = out.current_offset();
                run_open = true;
            }

            out.append_line(&line[1..]);
        }

        if run_open && let Some(kind) = run_kind {
            changes.push(Region::new(
                kind,
                IndexedRowRange::new(
                    run_start_row,
                    out.current_row() - 1,
                    run_start_offset,
                    out.current_offset(),
                ),
            ));
        }

        hunks.push(Hunk::new(
            record.old_start_line,
            record.old_line_count,
            record.new_start_line,
            record.new_line_count,
            record.heading.clone(),
            IndexedRowRange::new(
                hunk_start_row,
                out.current_row() - 1,
                hunk_start_offset,
                out.current_offset(),
            ),
            changes,
        ));
    }

    Ok(hunks)
}
