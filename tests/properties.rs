//! Property tests over randomly generated diffs and selections.

use std::collections::BTreeSet;

use diff_carve::{
    DiffRecord, HunkRecord, ListSelection, MultiFilePatch, build_multi_file_patch,
};
use proptest::prelude::*;

/// One run of same-origin lines inside a generated hunk.
#[derive(Debug, Clone)]
enum Segment {
    Context(Vec<String>),
    Addition(Vec<String>),
    Deletion(Vec<String>),
}

fn line_strategy() -> impl Strategy<Value = String> {
    // Printable ASCII, no newlines; the origin character is prepended later.
    proptest::string::string_regex("[ -~]{0,12}").expect("valid regex")
}

fn segment_strategy() -> impl Strategy<Value = Segment> {
    let lines = || proptest::collection::vec(line_strategy(), 1..4);
    prop_oneof![
        lines().prop_map(Segment::Context),
        lines().prop_map(Segment::Addition),
        lines().prop_map(Segment::Deletion),
    ]
}

fn hunk_strategy() -> impl Strategy<Value = Vec<Segment>> {
    proptest::collection::vec(segment_strategy(), 1..5).prop_filter(
        "hunk needs at least one change",
        |segments| {
            segments
                .iter()
                .any(|segment| !matches!(segment, Segment::Context(_)))
        },
    )
}

fn records_strategy() -> impl Strategy<Value = Vec<DiffRecord>> {
    proptest::collection::vec(hunk_strategy(), 1..4).prop_map(|hunk_segments| {
        let mut old_line = 1usize;
        let mut new_line = 1usize;
        let mut hunks = Vec::new();

        for segments in &hunk_segments {
            // Leave a gap so hunks do not collide.
            old_line += 2;
            new_line += 2;

            let mut lines = Vec::new();
            let mut old_count = 0usize;
            let mut new_count = 0usize;
            for segment in segments {
                match segment {
                    Segment::Context(texts) => {
                        for text in texts {
                            lines.push(format!(" {text}"));
                        }
                        old_count += texts.len();
                        new_count += texts.len();
                    }
                    Segment::Addition(texts) => {
                        for text in texts {
                            lines.push(format!("+{text}"));
                        }
                        new_count += texts.len();
                    }
                    Segment::Deletion(texts) => {
                        for text in texts {
                            lines.push(format!("-{text}"));
                        }
                        old_count += texts.len();
                    }
                }
            }

            // A zero-count side names the line before the change.
            hunks.push(HunkRecord {
                old_start_line: if old_count == 0 { old_line - 1 } else { old_line },
                old_line_count: old_count,
                new_start_line: if new_count == 0 { new_line - 1 } else { new_line },
                new_line_count: new_count,
                heading: String::new(),
                lines,
            });
            old_line += old_count;
            new_line += new_count;
        }

        vec![DiffRecord {
            old_path: Some("file.txt".to_string()),
            new_path: Some("file.txt".to_string()),
            old_mode: None,
            new_mode: None,
            status: "modified".to_string(),
            hunks,
        }]
    })
}

fn changed_rows(patches: &MultiFilePatch) -> Vec<usize> {
    patches
        .file_patches()
        .iter()
        .flat_map(|fp| fp.hunks())
        .flat_map(|hunk| hunk.changes().iter())
        .filter(|change| change.is_change())
        .flat_map(|change| change.range().buffer_rows())
        .collect()
}

/// The changed lines of a patch set as (origin, text) pairs in buffer
/// order, optionally restricted to a row set.
fn changed_lines(patches: &MultiFilePatch, only: Option<&BTreeSet<usize>>) -> Vec<(char, String)> {
    let buffer = patches.buffer().text();
    let mut lines = Vec::new();
    for fp in patches.file_patches() {
        for hunk in fp.hunks() {
            for change in hunk.changes().iter().filter(|change| change.is_change()) {
                let text = change.range().text_in(buffer);
                for (offset, line) in text.lines().enumerate() {
                    let row = change.range().start_row() + offset;
                    if only.is_none_or(|rows| rows.contains(&row)) {
                        lines.push((change.origin(), line.to_string()));
                    }
                }
            }
        }
    }
    lines
}

fn subset_from_seed(rows: &[usize], seed: u64) -> BTreeSet<usize> {
    rows.iter()
        .enumerate()
        .filter(|(i, _)| seed >> (i % 64) & 1 == 1)
        .map(|(_, row)| *row)
        .collect()
}

proptest! {
    /// Rendering, reparsing, and rendering again is a fixed point.
    #[test]
    fn render_parse_render_round_trips(records in records_strategy()) {
        let patches = build_multi_file_patch(&records).expect("build");
        let first = patches.to_string();

        let reparsed = diff_carve::parse_diffs(&first).expect("parse");
        let rebuilt = build_multi_file_patch(&reparsed).expect("rebuild");
        prop_assert_eq!(first, rebuilt.to_string());
    }

    /// Staging every changed row reproduces the patch set verbatim.
    #[test]
    fn staging_everything_is_identity(records in records_strategy()) {
        let patches = build_multi_file_patch(&records).expect("build");
        let rows: BTreeSet<usize> = changed_rows(&patches).into_iter().collect();
        let staged = patches.stage_patch_for_lines(&rows);
        prop_assert_eq!(patches.to_string(), staged.to_string());
    }

    /// A derived stage patch carries exactly the selected changed lines:
    /// selected additions stay additions, selected deletions stay
    /// deletions, in buffer order, and nothing else changes.
    #[test]
    fn staging_carves_exactly_the_selection(
        records in records_strategy(),
        seed in any::<u64>(),
    ) {
        let patches = build_multi_file_patch(&records).expect("build");
        let all = changed_rows(&patches);
        let selected = subset_from_seed(&all, seed);
        prop_assume!(!selected.is_empty());

        let staged = patches.stage_patch_for_lines(&selected);
        let expected = changed_lines(&patches, Some(&selected));
        let actual = changed_lines(&staged, None);
        prop_assert_eq!(expected, actual);
    }

    /// Unstaging everything a stage patch staged restores the original
    /// changed lines with their origins flipped.
    #[test]
    fn unstaging_a_stage_patch_is_complementary(
        records in records_strategy(),
        seed in any::<u64>(),
    ) {
        let patches = build_multi_file_patch(&records).expect("build");
        let all = changed_rows(&patches);
        let selected = subset_from_seed(&all, seed);
        prop_assume!(!selected.is_empty());

        let staged = patches.stage_patch_for_lines(&selected);
        let staged_rows: BTreeSet<usize> = changed_rows(&staged).into_iter().collect();
        let unstaged = staged.unstage_patch_for_lines(&staged_rows);

        let flipped: Vec<(char, String)> = changed_lines(&staged, None)
            .into_iter()
            .map(|(origin, text)| (if origin == '+' { '-' } else { '+' }, text))
            .collect();
        prop_assert_eq!(flipped, changed_lines(&unstaged, None));
    }

    /// Coalescing is idempotent under arbitrary add/subtract sequences.
    #[test]
    fn coalesce_is_idempotent(
        ops in proptest::collection::vec((any::<bool>(), 0usize..12), 0..12),
    ) {
        let mut selection = ListSelection::new((0..12usize).collect::<Vec<_>>());
        for (add_or_subtract, index) in ops {
            selection = if add_or_subtract {
                selection.add_or_subtract_selection(&index)
            } else {
                selection.select_index(index, false)
            };
            selection = selection.coalesce();
        }
        prop_assert_eq!(selection.coalesce(), selection);
    }

    /// Coalesced selections report the same selected set.
    #[test]
    fn coalesce_preserves_the_selected_set(
        ops in proptest::collection::vec(0usize..12, 0..12),
    ) {
        let mut selection = ListSelection::new((0..12usize).collect::<Vec<_>>());
        for index in ops {
            selection = selection.add_or_subtract_selection(&index).coalesce();
        }
        prop_assert_eq!(
            selection.selected_indices(),
            selection.coalesce().selected_indices()
        );
    }
}
