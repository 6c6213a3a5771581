//! Parsing of unified diff text into raw records for the patch builder.
//!
//! This is the inverse of the model's rendering: `git diff` output (or the
//! crate's own `to_string` output) becomes a list of [`DiffRecord`]s that
//! [`crate::patch::build_multi_file_patch`] consumes.

use error_set::error_set;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    sequence::preceded,
};

use crate::patch::{DiffRecord, FileMode, HunkRecord};

error_set! {
    /// Errors from parsing unified diff text
    ParseError := {
        /// A `diff --git` line did not carry `a/<path> b/<path>`
        #[display("Invalid diff header: {line}")]
        InvalidDiffHeader { line: String },
        /// Diff content appeared before any `diff --git` header
        #[display("Diff content before any file header: {line}")]
        ContentBeforeHeader { line: String },
        /// A `@@` line did not parse as a hunk header
        #[display("Invalid hunk header: {line}")]
        InvalidHunkHeader { line: String },
        /// A hunk body line carried no recognized origin character
        #[display("Malformed hunk line: {line}")]
        MalformedHunkLine { line: String },
    }
}

/// Parse complete `git diff` output into one record per `diff --git`
/// section. Empty input yields no records.
pub fn parse_diffs(text: &str) -> Result<Vec<DiffRecord>, ParseError> {
    let mut records: Vec<DiffRecord> = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            let (old_path, new_path) =
                parse_git_header_paths(rest).ok_or_else(|| ParseError::InvalidDiffHeader {
                    line: line.to_string(),
                })?;
            records.push(DiffRecord {
                old_path: Some(old_path),
                new_path: Some(new_path),
                old_mode: None,
                new_mode: None,
                status: "modified".to_string(),
                hunks: Vec::new(),
            });
            continue;
        }

        let Some(record) = records.last_mut() else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ParseError::ContentBeforeHeader {
                line: line.to_string(),
            });
        };

        if line.starts_with("@@ ") {
            let header = parse_hunk_header(line).ok_or_else(|| ParseError::InvalidHunkHeader {
                line: line.to_string(),
            })?;
            record.hunks.push(header);
            continue;
        }

        if record.hunks.is_empty() {
            // Still in the file header section.
            if let Some(mode) = line.strip_prefix("new file mode ") {
                record.status = "added".to_string();
                record.new_mode = Some(FileMode::new(mode.trim()));
            } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
                record.status = "deleted".to_string();
                record.old_mode = Some(FileMode::new(mode.trim()));
            } else if let Some(mode) = line.strip_prefix("old mode ") {
                record.old_mode = Some(FileMode::new(mode.trim()));
            } else if let Some(mode) = line.strip_prefix("new mode ") {
                record.new_mode = Some(FileMode::new(mode.trim()));
            } else if let Some(rest) = line.strip_prefix("index ") {
                if let Some((_, mode)) = rest.rsplit_once(' ')
                    && mode.len() == 6
                    && mode.bytes().all(|b| b.is_ascii_digit())
                {
                    record.old_mode.get_or_insert_with(|| FileMode::new(mode));
                    record.new_mode.get_or_insert_with(|| FileMode::new(mode));
                }
            } else if let Some(path) = line.strip_prefix("--- ") {
                record.old_path = parse_side_path(path, "a/");
            } else if let Some(path) = line.strip_prefix("+++ ") {
                record.new_path = parse_side_path(path, "b/");
            }
            // Anything else in the header section (similarity, rename,
            // binary markers) carries no information the model needs.
        } else if matches!(line.as_bytes().first(), Some(b'+' | b'-' | b' ' | b'\\')) {
            if let Some(hunk) = record.hunks.last_mut() {
                hunk.lines.push(line.to_string());
            }
        } else {
            return Err(ParseError::MalformedHunkLine {
                line: line.to_string(),
            });
        }
    }

    for record in &mut records {
        // Absent sides win over the a/ b/ fallback paths, even when the
        // `---`/`+++` lines were missing (empty added or deleted files).
        if record.status == "added" {
            record.old_path = None;
        } else if record.status == "deleted" {
            record.new_path = None;
        }
    }

    Ok(records)
}

fn parse_git_header_paths(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_prefix("a/")?;
    let split = rest.find(" b/")?;
    let old_path = &rest[..split];
    let new_path = &rest[split + 3..];
    if old_path.is_empty() || new_path.is_empty() {
        return None;
    }
    Some((old_path.to_string(), new_path.to_string()))
}

fn parse_side_path(raw: &str, prefix: &str) -> Option<String> {
    if raw == "/dev/null" {
        return None;
    }
    Some(raw.strip_prefix(prefix).unwrap_or(raw).to_string())
}

/// `start[,count]`; the count defaults to 1 when omitted.
fn line_range(input: &str) -> IResult<&str, (usize, usize)> {
    let (input, start) = map_res(digit1, str::parse::<usize>).parse(input)?;
    let (input, count) =
        opt(preceded(char(','), map_res(digit1, str::parse::<usize>))).parse(input)?;
    Ok((input, (start, count.unwrap_or(1))))
}

fn parse_hunk_header(line: &str) -> Option<HunkRecord> {
    let (rest, (_, (old_start_line, old_line_count), _, (new_start_line, new_line_count), _)) =
        (tag("@@ -"), line_range, tag(" +"), line_range, tag(" @@"))
            .parse(line)
            .ok()?;

    Some(HunkRecord {
        old_start_line,
        old_line_count,
        new_start_line,
        new_line_count,
        heading: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        lines: Vec::new(),
    })
}
