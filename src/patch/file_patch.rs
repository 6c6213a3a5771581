//! An old file, a new file, and the patch between them.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::buffer::BufferBuilder;
use crate::patch::file::File;
use crate::patch::hunk::Hunk;
use crate::patch::patch::{Patch, PatchStatus};

/// One file's entry in a diff: the descriptors for both sides plus the
/// content patch. Mode-only and symlink changes carry an absent or empty
/// patch; pure content changes carry present files on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    old_file: File,
    new_file: File,
    patch: Patch,
}

impl FilePatch {
    pub fn new(old_file: File, new_file: File, patch: Patch) -> Self {
        Self {
            old_file,
            new_file,
            patch,
        }
    }

    /// The null entry produced for an empty record set.
    pub fn absent() -> Self {
        Self::new(File::Absent, File::Absent, Patch::Absent)
    }

    pub fn is_present(&self) -> bool {
        self.old_file.is_present() || self.new_file.is_present() || self.patch.is_present()
    }

    pub fn old_file(&self) -> &File {
        &self.old_file
    }

    pub fn new_file(&self) -> &File {
        &self.new_file
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn old_path(&self) -> Option<&str> {
        self.old_file.path()
    }

    pub fn new_path(&self) -> Option<&str> {
        self.new_file.path()
    }

    pub fn path(&self) -> Option<&str> {
        self.old_path().or_else(|| self.new_path())
    }

    pub fn status(&self) -> Option<PatchStatus> {
        self.patch.status()
    }

    pub fn hunks(&self) -> &[Hunk] {
        self.patch.hunks()
    }

    pub fn changed_line_count(&self) -> usize {
        self.patch.changed_line_count()
    }

    /// Exactly one side is executable.
    pub fn did_change_executable_mode(&self) -> bool {
        self.old_file.is_executable() != self.new_file.is_executable()
    }

    /// Exactly one side has the symlink mode.
    pub fn did_change_symlink_mode(&self) -> bool {
        self.old_file.is_symlink() != self.new_file.is_symlink()
    }

    pub fn has_symlink(&self) -> bool {
        self.old_file.symlink().is_some() || self.new_file.symlink().is_some()
    }

    /// A symlink replaced a regular file or vice versa.
    pub fn has_typechange(&self) -> bool {
        (self.old_file.is_symlink() && self.new_file.is_regular_file())
            || (self.new_file.is_symlink() && self.old_file.is_regular_file())
    }

    /// Derive the file patch staging the changed rows in `rows`.
    pub fn stage_patch_for_lines(
        &self,
        rows: &BTreeSet<usize>,
        src: &str,
        out: &mut BufferBuilder,
    ) -> FilePatch {
        let whole_file =
            self.patch.selected_change_count(rows) == self.patch.changed_line_count();
        let staged = self.patch.stage_patch_for_lines(rows, src, out);

        if whole_file && self.has_typechange() && self.status() == Some(PatchStatus::Deleted) {
            // Staging the deletion half of a file-to-symlink change: the
            // staged patch must not resurrect the new side.
            return FilePatch::new(self.old_file.clone(), File::Absent, staged);
        }

        if !whole_file && self.status() == Some(PatchStatus::Deleted) {
            // A partially staged deletion leaves the file in the index.
            return FilePatch::new(self.old_file.clone(), self.old_file.clone(), staged);
        }

        FilePatch::new(self.old_file.clone(), self.new_file.clone(), staged)
    }

    pub fn stage_patch_for_hunk(
        &self,
        hunk: &Hunk,
        src: &str,
        out: &mut BufferBuilder,
    ) -> FilePatch {
        self.stage_patch_for_lines(&hunk.buffer_rows().collect(), src, out)
    }

    /// Derive the file patch unstaging the changed rows in `rows`. The
    /// result is inverted and ready to apply to the index.
    pub fn unstage_patch_for_lines(
        &self,
        rows: &BTreeSet<usize>,
        src: &str,
        out: &mut BufferBuilder,
    ) -> FilePatch {
        let whole_file =
            self.patch.selected_change_count(rows) == self.patch.changed_line_count();

        if whole_file {
            if self.has_typechange() && self.status() == Some(PatchStatus::Added) {
                // Unstaging the creation half of a symlink-to-file change:
                // dropping the old side makes the applied patch remove the
                // file from the index instead of restoring the symlink.
                let without_old =
                    FilePatch::new(File::Absent, self.new_file.clone(), self.patch.clone());
                return without_old.full_unstage_patch(src, out);
            }
            return self.full_unstage_patch(src, out);
        }

        let unstaged = self.patch.unstage_patch_for_lines(rows, src, out);
        match self.status() {
            // The file keeps existing in the index with fewer lines.
            Some(PatchStatus::Added) => {
                FilePatch::new(self.new_file.clone(), self.new_file.clone(), unstaged)
            }
            _ => FilePatch::new(self.new_file.clone(), self.old_file.clone(), unstaged),
        }
    }

    pub fn unstage_patch_for_hunk(
        &self,
        hunk: &Hunk,
        src: &str,
        out: &mut BufferBuilder,
    ) -> FilePatch {
        self.unstage_patch_for_lines(&hunk.buffer_rows().collect(), src, out)
    }

    /// Invert the whole file patch, unstaging every change at once.
    pub fn full_unstage_patch(&self, src: &str, out: &mut BufferBuilder) -> FilePatch {
        FilePatch::new(
            self.new_file.clone(),
            self.old_file.clone(),
            self.patch.full_unstage_patch(src, out),
        )
    }

    pub fn max_line_number_width(&self) -> usize {
        self.patch.max_line_number_width()
    }

    pub fn header_string(&self) -> String {
        let from_path = self.old_path().or_else(|| self.new_path()).unwrap_or("");
        let to_path = self.new_path().or_else(|| self.old_path()).unwrap_or("");

        let mut header = format!("diff --git a/{from_path} b/{to_path}\n");
        match self.status() {
            Some(PatchStatus::Added) => {
                if let Some(mode) = self.new_file.mode() {
                    let _ = writeln!(header, "new file mode {}", mode.as_str());
                }
            }
            Some(PatchStatus::Deleted) => {
                if let Some(mode) = self.old_file.mode() {
                    let _ = writeln!(header, "deleted file mode {}", mode.as_str());
                }
            }
            _ => {}
        }
        match self.old_path() {
            Some(path) => {
                let _ = writeln!(header, "--- a/{path}");
            }
            None => header.push_str("--- /dev/null\n"),
        }
        match self.new_path() {
            Some(path) => {
                let _ = writeln!(header, "+++ b/{path}");
            }
            None => header.push_str("+++ /dev/null\n"),
        }
        header
    }

    pub fn to_string_in(&self, buffer: &str) -> String {
        if !self.is_present() {
            return String::new();
        }

        if self.has_typechange() {
            // Render the typechange as a deletion of one side followed by
            // a creation of the other.
            let left = FilePatch::new(
                self.old_file.clone(),
                File::Absent,
                if self.old_file.is_symlink() {
                    Patch::new(PatchStatus::Deleted, vec![])
                } else {
                    self.patch.clone()
                },
            );
            let right = FilePatch::new(
                File::Absent,
                self.new_file.clone(),
                if self.new_file.is_symlink() {
                    Patch::new(PatchStatus::Added, vec![])
                } else {
                    self.patch.clone()
                },
            );
            return left.to_string_in(buffer) + &right.to_string_in(buffer);
        }

        if self.status() == Some(PatchStatus::Added) && self.new_file.is_symlink() {
            let target = self.new_file.symlink().unwrap_or("");
            return format!(
                "{}@@ -0,0 +1,1 @@\n+{target}\n\\ No newline at end of file\n",
                self.header_string()
            );
        }
        if self.status() == Some(PatchStatus::Deleted) && self.old_file.is_symlink() {
            let target = self.old_file.symlink().unwrap_or("");
            return format!(
                "{}@@ -1,1 +0,0 @@\n-{target}\n\\ No newline at end of file\n",
                self.header_string()
            );
        }

        self.header_string() + &self.patch.to_string_in(buffer)
    }
}
