//! `FILE:REFS` selectors naming diff lines to stage or unstage.
//!
//! The selector format is `FILE:REFS` where `REFS` is a comma-separated
//! list of line references:
//!
//! - `N` — addition at new-file line N
//! - `N..M` — additions in the inclusive range
//! - `-N` — deletion at old-file line N
//! - `-N..-M` — deletions in the inclusive range
//!
//! Additions are addressed by new-file line numbers and deletions by
//! old-file line numbers, matching what the numbered diff display prints.
//! Resolution turns the references into buffer rows of a built
//! [`MultiFilePatch`], which the stage and unstage derivations consume.

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use error_set::error_set;

use crate::patch::MultiFilePatch;

error_set! {
    /// Errors from parsing or resolving FILE:REFS selectors
    SelectorError := {
        /// Input string does not contain a colon separator
        #[display("Invalid selector '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid selector '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// No line references provided after the colon
        #[display("No line references provided")]
        EmptyRefs,
        /// Line number could not be parsed as a valid non-zero u32
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// Deletion reference does not start with '-' prefix
        #[display("Delete reference must start with '-', got '{value}'")]
        InvalidDeleteRef { value: String },
        /// The named file has no hunks in the diff
        #[display("No changes found in {file}")]
        FileNotInDiff { file: String },
        /// None of the references matched a changed line
        #[display("No lines matched the selection in {file}")]
        NoMatchingLines { file: String },
    }
}

/// A reference to changed lines within one file's diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRef {
    /// Addition at a new-file line number
    Add(NonZeroU32),
    /// Addition range (inclusive start and end)
    AddRange(NonZeroU32, NonZeroU32),
    /// Deletion at an old-file line number
    Delete(NonZeroU32),
    /// Deletion range (inclusive start and end)
    DeleteRange(NonZeroU32, NonZeroU32),
}

impl LineRef {
    fn matches_addition(&self, new_row: usize) -> bool {
        match self {
            LineRef::Add(n) => new_row == n.get() as usize,
            LineRef::AddRange(start, end) => {
                (start.get() as usize..=end.get() as usize).contains(&new_row)
            }
            _ => false,
        }
    }

    fn matches_deletion(&self, old_row: usize) -> bool {
        match self {
            LineRef::Delete(n) => old_row == n.get() as usize,
            LineRef::DeleteRange(start, end) => {
                (start.get() as usize..=end.get() as usize).contains(&old_row)
            }
            _ => false,
        }
    }
}

/// A parsed selector: one file plus the line references to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLineRefs {
    pub file: String,
    pub refs: Vec<LineRef>,
}

/// Parse a `file:refs` selector string.
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, SelectorError> {
    let Some((file, refs)) = input.split_once(':') else {
        return Err(SelectorError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let file = file.trim();
    if file.is_empty() {
        return Err(SelectorError::EmptyFileName {
            input: input.to_string(),
        });
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs: parse_line_refs(refs)?,
    })
}

fn parse_line_refs(input: &str) -> Result<Vec<LineRef>, SelectorError> {
    let refs: Vec<LineRef> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single_ref)
        .collect::<Result<Vec<_>, _>>()?;

    if refs.is_empty() {
        return Err(SelectorError::EmptyRefs);
    }

    Ok(refs)
}

fn parse_single_ref(input: &str) -> Result<LineRef, SelectorError> {
    if let Some((start, end)) = input.split_once("..") {
        if start.starts_with('-') {
            let start = parse_delete_number(start)?;
            let end = parse_delete_number(end)?;
            if start > end {
                return Err(SelectorError::InvalidRange {
                    start: start.get(),
                    end: end.get(),
                });
            }
            Ok(LineRef::DeleteRange(start, end))
        } else {
            let start = parse_add_number(start)?;
            let end = parse_add_number(end)?;
            if start > end {
                return Err(SelectorError::InvalidRange {
                    start: start.get(),
                    end: end.get(),
                });
            }
            Ok(LineRef::AddRange(start, end))
        }
    } else if input.starts_with('-') {
        Ok(LineRef::Delete(parse_delete_number(input)?))
    } else {
        Ok(LineRef::Add(parse_add_number(input)?))
    }
}

fn parse_add_number(input: &str) -> Result<NonZeroU32, SelectorError> {
    input
        .parse::<NonZeroU32>()
        .map_err(|_| SelectorError::InvalidLineNumber {
            value: input.to_string(),
        })
}

fn parse_delete_number(input: &str) -> Result<NonZeroU32, SelectorError> {
    let Some(number) = input.strip_prefix('-') else {
        return Err(SelectorError::InvalidDeleteRef {
            value: input.to_string(),
        });
    };
    number
        .parse::<NonZeroU32>()
        .map_err(|_| SelectorError::InvalidLineNumber {
            value: input.to_string(),
        })
}

/// Resolve a selector to the buffer rows it names within `patches`.
///
/// Additions match on the new-file line number of their row, deletions on
/// the old-file line number. Selecting no rows at all is an error so a
/// typo'd line number cannot silently derive an empty patch.
pub fn resolve_rows(
    patches: &MultiFilePatch,
    refs: &FileLineRefs,
) -> Result<BTreeSet<usize>, SelectorError> {
    let file_patch = patches
        .file_patches()
        .iter()
        .find(|fp| fp.path() == Some(refs.file.as_str()))
        .ok_or_else(|| SelectorError::FileNotInDiff {
            file: refs.file.clone(),
        })?;

    let mut rows = BTreeSet::new();
    for hunk in file_patch.hunks() {
        for change in hunk.changes() {
            if change.is_addition() {
                for row in change.range().buffer_rows() {
                    if let Some(new_row) = hunk.new_row_at(row)
                        && refs.refs.iter().any(|r| r.matches_addition(new_row))
                    {
                        rows.insert(row);
                    }
                }
            } else if change.is_deletion() {
                for row in change.range().buffer_rows() {
                    if let Some(old_row) = hunk.old_row_at(row)
                        && refs.refs.iter().any(|r| r.matches_deletion(old_row))
                    {
                        rows.insert(row);
                    }
                }
            }
        }
    }

    if rows.is_empty() {
        return Err(SelectorError::NoMatchingLines {
            file: refs.file.clone(),
        });
    }

    Ok(rows)
}
