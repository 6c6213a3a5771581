//! The hunk/line selection state machine over one file patch's hunks.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender, channel};

use crate::patch::{Hunk, Region};
use crate::selection::list::ListSelection;

/// Which granularity the user is selecting at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Hunk,
    Line,
}

/// One buffer row as a selectable line item: its row, whether it is a
/// changed row, and its new-file line number when it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRow {
    row: usize,
    changed: bool,
    new_row: Option<usize>,
}

impl DiffRow {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn new_row(&self) -> Option<usize> {
        self.new_row
    }
}

fn row_is_changed(row: &DiffRow) -> bool {
    row.changed
}

/// Selection state over a file patch's hunks: one [`ListSelection`] per
/// granularity plus the mode flag saying which one is authoritative.
///
/// Every mutator returns a new value. The only shared state between
/// clones is the one-shot update signal armed by
/// [`next_update`](Self::next_update).
#[derive(Debug, Clone)]
pub struct FilePatchSelection {
    mode: SelectionMode,
    hunks_selection: ListSelection<Hunk>,
    lines_selection: ListSelection<DiffRow>,
    hunks_by_line: Rc<HashMap<usize, usize>>,
    update_resolver: Rc<RefCell<Option<Sender<()>>>>,
}

impl PartialEq for FilePatchSelection {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.hunks_selection == other.hunks_selection
            && self.lines_selection == other.lines_selection
    }
}

impl FilePatchSelection {
    pub fn new(hunks: Vec<Hunk>) -> Self {
        let (lines, hunks_by_line) = build_lines(&hunks);
        Self {
            mode: SelectionMode::Hunk,
            hunks_selection: ListSelection::new(hunks),
            lines_selection: ListSelection::with_selectable(lines, row_is_changed),
            hunks_by_line: Rc::new(hunks_by_line),
            update_resolver: Rc::new(RefCell::new(None)),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.hunks_selection.items().is_empty()
    }

    pub fn hunks(&self) -> &[Hunk] {
        self.hunks_selection.items()
    }

    /// The hunk owning `row`, if the row belongs to any hunk.
    pub fn hunk_for_row(&self, row: usize) -> Option<&Hunk> {
        self.hunks_by_line
            .get(&row)
            .and_then(|index| self.hunks_selection.items().get(*index))
    }

    fn with_hunks_selection(&self, hunks_selection: ListSelection<Hunk>) -> Self {
        Self {
            mode: SelectionMode::Hunk,
            hunks_selection,
            lines_selection: self.lines_selection.clone(),
            hunks_by_line: Rc::clone(&self.hunks_by_line),
            update_resolver: Rc::clone(&self.update_resolver),
        }
    }

    fn with_lines_selection(&self, lines_selection: ListSelection<DiffRow>) -> Self {
        Self {
            mode: SelectionMode::Line,
            hunks_selection: self.hunks_selection.clone(),
            lines_selection,
            hunks_by_line: Rc::clone(&self.hunks_by_line),
            update_resolver: Rc::clone(&self.update_resolver),
        }
    }

    /// Switch granularity. Entering line mode selects the first row of the
    /// current head hunk, advancing once if that row is context; entering
    /// hunk mode selects the hunk owning the current head line.
    pub fn toggle_mode(&self) -> Self {
        match self.mode {
            SelectionMode::Hunk => {
                let Some(head_index) = self.hunks_selection.head_index() else {
                    return self.clone();
                };
                let Some(position) = self
                    .lines_selection
                    .items()
                    .iter()
                    .position(|line| self.hunks_by_line.get(&line.row) == Some(&head_index))
                else {
                    return self.clone();
                };

                let first_row = self.lines_selection.items()[position];
                let selected =
                    self.with_lines_selection(self.lines_selection.select_index(position, false));
                if first_row.changed {
                    selected
                } else {
                    selected.select_next_line(false)
                }
            }
            SelectionMode::Line => {
                let Some(head_line) = self.lines_selection.head_item() else {
                    return self.clone();
                };
                let Some(&hunk_index) = self.hunks_by_line.get(&head_line.row()) else {
                    return self.clone();
                };
                self.with_hunks_selection(self.hunks_selection.select_index(hunk_index, false))
            }
        }
    }

    pub fn select_next(&self, preserve_tail: bool) -> Self {
        match self.mode {
            SelectionMode::Hunk => self.select_next_hunk(preserve_tail),
            SelectionMode::Line => self.select_next_line(preserve_tail),
        }
    }

    pub fn select_previous(&self, preserve_tail: bool) -> Self {
        match self.mode {
            SelectionMode::Hunk => self.select_previous_hunk(preserve_tail),
            SelectionMode::Line => self.select_previous_line(preserve_tail),
        }
    }

    pub fn select_first(&self, preserve_tail: bool) -> Self {
        match self.mode {
            SelectionMode::Hunk => {
                self.with_hunks_selection(self.hunks_selection.select_first_item(preserve_tail))
            }
            SelectionMode::Line => {
                self.with_lines_selection(self.lines_selection.select_first_item(preserve_tail))
            }
        }
    }

    pub fn select_last(&self, preserve_tail: bool) -> Self {
        match self.mode {
            SelectionMode::Hunk => {
                self.with_hunks_selection(self.hunks_selection.select_last_item(preserve_tail))
            }
            SelectionMode::Line => {
                self.with_lines_selection(self.lines_selection.select_last_item(preserve_tail))
            }
        }
    }

    pub fn select_all(&self) -> Self {
        match self.mode {
            SelectionMode::Hunk => {
                self.with_hunks_selection(self.hunks_selection.select_all_items())
            }
            SelectionMode::Line => {
                self.with_lines_selection(self.lines_selection.select_all_items())
            }
        }
    }

    pub fn select_hunk(&self, hunk: &Hunk, preserve_tail: bool) -> Self {
        self.with_hunks_selection(self.hunks_selection.select_item(hunk, preserve_tail))
    }

    pub fn add_or_subtract_hunk_selection(&self, hunk: &Hunk) -> Self {
        self.with_hunks_selection(self.hunks_selection.add_or_subtract_selection(hunk))
    }

    pub fn select_next_hunk(&self, preserve_tail: bool) -> Self {
        self.with_hunks_selection(self.hunks_selection.select_next_item(preserve_tail))
    }

    pub fn select_previous_hunk(&self, preserve_tail: bool) -> Self {
        self.with_hunks_selection(self.hunks_selection.select_previous_item(preserve_tail))
    }

    /// Select the adjacent hunk, keeping line-granularity semantics when
    /// the selection was in line mode.
    pub fn jump_to_next_hunk(&self) -> Self {
        let next = self.select_next_hunk(false);
        if next.mode != self.mode {
            next.toggle_mode()
        } else {
            next
        }
    }

    pub fn jump_to_previous_hunk(&self) -> Self {
        let next = self.select_previous_hunk(false);
        if next.mode != self.mode {
            next.toggle_mode()
        } else {
            next
        }
    }

    /// The selected hunks. In line mode these are the hunks owning any
    /// selected line.
    pub fn selected_hunks(&self) -> Vec<Hunk> {
        match self.mode {
            SelectionMode::Hunk => self.hunks_selection.selected_items(),
            SelectionMode::Line => {
                let mut hunk_indices = BTreeSet::new();
                for row in self.selected_lines() {
                    if let Some(&index) = self.hunks_by_line.get(&row) {
                        hunk_indices.insert(index);
                    }
                }
                hunk_indices
                    .into_iter()
                    .filter_map(|index| self.hunks_selection.items().get(index).cloned())
                    .collect()
            }
        }
    }

    pub fn head_hunk(&self) -> Option<&Hunk> {
        match self.mode {
            SelectionMode::Hunk => self.hunks_selection.head_item(),
            SelectionMode::Line => None,
        }
    }

    pub fn select_line(&self, row: usize, preserve_tail: bool) -> Self {
        let Some(position) = self.line_position(row) else {
            return self.clone();
        };
        self.with_lines_selection(self.lines_selection.select_index(position, preserve_tail))
    }

    pub fn add_or_subtract_line_selection(&self, row: usize) -> Self {
        let Some(position) = self.line_position(row) else {
            return self.clone();
        };
        let line = self.lines_selection.items()[position];
        self.with_lines_selection(self.lines_selection.add_or_subtract_selection(&line))
    }

    pub fn select_next_line(&self, preserve_tail: bool) -> Self {
        self.with_lines_selection(self.lines_selection.select_next_item(preserve_tail))
    }

    pub fn select_previous_line(&self, preserve_tail: bool) -> Self {
        self.with_lines_selection(self.lines_selection.select_previous_item(preserve_tail))
    }

    /// The selected changed rows. In hunk mode these are every changed row
    /// of the selected hunks.
    pub fn selected_lines(&self) -> BTreeSet<usize> {
        match self.mode {
            SelectionMode::Hunk => {
                let mut rows = BTreeSet::new();
                for hunk in self.hunks_selection.selected_items() {
                    for change in hunk.changes().iter().filter(|change| change.is_change()) {
                        rows.extend(change.range().buffer_rows());
                    }
                }
                rows
            }
            SelectionMode::Line => self
                .lines_selection
                .selected_items()
                .into_iter()
                .map(|line| line.row)
                .collect(),
        }
    }

    pub fn head_line(&self) -> Option<DiffRow> {
        match self.mode {
            SelectionMode::Line => self.lines_selection.head_item().copied(),
            SelectionMode::Hunk => None,
        }
    }

    pub fn line_selection_tail_index(&self) -> Option<usize> {
        self.lines_selection.tail_index()
    }

    pub fn coalesce(&self) -> Self {
        Self {
            mode: self.mode,
            hunks_selection: self.hunks_selection.coalesce(),
            lines_selection: self.lines_selection.coalesce(),
            hunks_by_line: Rc::clone(&self.hunks_by_line),
            update_resolver: Rc::clone(&self.update_resolver),
        }
    }

    /// Replace the hunk list after an external refresh, keeping the
    /// selection position stable: the hunk selection is remapped by index
    /// and the line selection lands on the changed row whose position
    /// among changed rows matches the old selection's.
    pub fn update_hunks(&self, new_hunks: Vec<Hunk>) -> Self {
        let old_hunks = self.hunks_selection.items();
        let was_changed = new_hunks.len() != old_hunks.len()
            || old_hunks
                .iter()
                .zip(new_hunks.iter())
                .any(|(old, new)| old != new);

        let hunks_selection = self.hunks_selection.set_items(new_hunks.clone());
        let (new_lines, hunks_by_line) = build_lines(&new_hunks);

        let old_lines = self.lines_selection.items();
        let mut selected_position = None;
        if !old_lines.is_empty()
            && !new_lines.is_empty()
            && let Some(old_start) = self.lines_selection.most_recent_start_index()
        {
            let mut preceding_changed = old_lines[..old_start]
                .iter()
                .filter(|line| line.changed)
                .count();
            for (position, line) in new_lines.iter().enumerate() {
                if line.changed {
                    selected_position = Some(position);
                    if preceding_changed == 0 {
                        break;
                    }
                    preceding_changed -= 1;
                }
            }
        }

        let mut lines_selection = self.lines_selection.set_items(new_lines);
        if let Some(position) = selected_position {
            lines_selection = lines_selection.select_index(position, false);
        }

        if was_changed && let Some(resolver) = self.update_resolver.borrow_mut().take() {
            let _ = resolver.send(());
        }

        Self {
            mode: self.mode,
            hunks_selection,
            lines_selection,
            hunks_by_line: Rc::new(hunks_by_line),
            update_resolver: Rc::clone(&self.update_resolver),
        }
    }

    /// Arm a one-shot signal that fires the next time
    /// [`update_hunks`](Self::update_hunks) observes a structural change.
    /// Arming again replaces the previous pending signal.
    pub fn next_update(&self) -> Receiver<()> {
        let (sender, receiver) = channel();
        *self.update_resolver.borrow_mut() = Some(sender);
        receiver
    }

    /// Select the changed line displayed at new-file line `line_number`,
    /// or the nearest one: rows are visited in order, so the first row
    /// whose distance stops improving ends the scan.
    pub fn go_to_diff_line(&self, line_number: usize) -> Self {
        let mut closest: Option<(usize, usize)> = None;

        for (position, line) in self.lines_selection.items().iter().enumerate() {
            if !line.changed {
                continue;
            }
            let Some(new_row) = line.new_row else {
                continue;
            };

            if new_row == line_number {
                return self
                    .with_lines_selection(self.lines_selection.select_index(position, false));
            }

            let distance = new_row.abs_diff(line_number);
            match closest {
                Some((closest_position, closest_distance)) => {
                    if distance < closest_distance {
                        closest = Some((position, distance));
                    } else {
                        return self.with_lines_selection(
                            self.lines_selection.select_index(closest_position, false),
                        );
                    }
                }
                None => closest = Some((position, distance)),
            }
        }

        match closest {
            Some((position, _)) => {
                self.with_lines_selection(self.lines_selection.select_index(position, false))
            }
            None => self.clone(),
        }
    }

    fn line_position(&self, row: usize) -> Option<usize> {
        self.lines_selection
            .items()
            .iter()
            .position(|line| line.row == row)
    }
}

fn build_lines(hunks: &[Hunk]) -> (Vec<DiffRow>, HashMap<usize, usize>) {
    let mut lines = Vec::new();
    let mut hunks_by_line = HashMap::new();

    for (hunk_index, hunk) in hunks.iter().enumerate() {
        let mut new_row = hunk.new_start_row();
        for region in hunk.regions() {
            for (offset, row) in region.range().buffer_rows().enumerate() {
                let line_new_row = match region {
                    Region::Unchanged(_) | Region::Addition(_) => Some(new_row + offset),
                    Region::Deletion(_) | Region::NoNewline(_) => None,
                };
                lines.push(DiffRow {
                    row,
                    changed: region.is_change(),
                    new_row: line_new_row,
                });
                hunks_by_line.insert(row, hunk_index);
            }
            if matches!(region, Region::Unchanged(_) | Region::Addition(_)) {
                new_row += region.buffer_row_count();
            }
        }
    }

    (lines, hunks_by_line)
}
