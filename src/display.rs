//! Human-readable diff display with explicit line numbers.

use std::fmt::Write as _;

use crate::patch::{MultiFilePatch, Region};

/// Render a patch set as `path:` blocks where every changed line carries
/// the line number a selector would use: new-file numbers for additions,
/// old-file numbers for deletions.
///
/// ```text
/// flake.nix:
///   +137:       debug = true;
///
///   -12:        obsolete = false;
/// ```
pub fn format_patches(patches: &MultiFilePatch) -> String {
    let mut result = String::new();
    let buffer = patches.buffer().text();

    for file_patch in patches.file_patches() {
        let Some(path) = file_patch.path() else {
            continue;
        };
        result.push_str(path);
        result.push_str(":\n");

        for hunk in file_patch.hunks() {
            for change in hunk.changes() {
                match change {
                    Region::Deletion(range) => {
                        for row in range.buffer_rows() {
                            if let Some(old_row) = hunk.old_row_at(row) {
                                let _ =
                                    writeln!(result, "  -{}:\t{}", old_row, row_text(buffer, row, range));
                            }
                        }
                    }
                    Region::Addition(range) => {
                        for row in range.buffer_rows() {
                            if let Some(new_row) = hunk.new_row_at(row) {
                                let _ =
                                    writeln!(result, "  +{}:\t{}", new_row, row_text(buffer, row, range));
                            }
                        }
                    }
                    _ => {}
                }
            }
            result.push('\n');
        }
    }

    // Drop the final blank separator.
    if result.ends_with("\n\n") {
        result.pop();
    }

    result
}

fn row_text<'a>(
    buffer: &'a str,
    row: usize,
    range: &crate::patch::IndexedRowRange,
) -> &'a str {
    let text = range.text_in(buffer);
    text.lines().nth(row - range.start_row()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_diffs;
    use crate::patch::build_multi_file_patch;

    fn render(diff: &str) -> String {
        format_patches(&build_multi_file_patch(&parse_diffs(diff).unwrap()).unwrap())
    }

    #[test]
    fn format_single_addition() {
        let diff = "\
diff --git a/flake.nix b/flake.nix
index abc1234..def5678 100644
--- a/flake.nix
+++ b/flake.nix
@@ -136,0 +137 @@
+      debug = true;
";
        insta::assert_snapshot!(render(diff));
    }

    #[test]
    fn format_mixed_operations() {
        let diff = "\
diff --git a/gtk.nix b/gtk.nix
index 2ce966d..93d8dbc 100644
--- a/gtk.nix
+++ b/gtk.nix
@@ -10,2 +10,3 @@ line 9
-    gtk.theme.name = \"Adwaita\";
-    gtk.iconTheme.name = \"Papirus\";
+    # Theme managed elsewhere
+    gtk.iconTheme.name = \"Papirus-Dark\";
+    gtk.cursorTheme.size = 24;
";
        insta::assert_snapshot!(render(diff));
    }

    #[test]
    fn format_multiple_files_and_hunks() {
        let diff = "\
diff --git a/flake.nix b/flake.nix
index abc1234..def5678 100644
--- a/flake.nix
+++ b/flake.nix
@@ -136,0 +137 @@
+      debug = true;
@@ -140,0 +142 @@
+        ./flake-modules/home-manager.nix
diff --git a/zsh.nix b/zsh.nix
index 6f2e06d..110fff0 100644
--- a/zsh.nix
+++ b/zsh.nix
@@ -15 +14,0 @@ line 14
-      enableAutosuggestions = true;
";
        insta::assert_snapshot!(render(diff));
    }

    #[test]
    fn format_empty_patch_set() {
        assert_eq!(render(""), "");
    }
}
