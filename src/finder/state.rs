//! Finder UI state and the transitions applied by the controller.

use std::collections::HashMap;
use std::sync::Arc;

use unicode_width::UnicodeWidthChar;

use super::input::Intent;
use super::matcher::{Match, identity};

/// Rows below the item area: the prompt and the counter.
const FIXED_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Editing,
    /// Confirm arrived before the filter pass for the current query finished.
    ConfirmPending,
    AwaitingConfirm(Vec<usize>),
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u16,
    pub height: u16,
    /// Columns available to the prompt and item list.
    pub list_width: u16,
    pub item_area_height: usize,
    pub has_preview: bool,
    pub has_header: bool,
}

impl Layout {
    pub fn new(width: u16, height: u16, has_preview: bool, has_header: bool) -> Self {
        let list_width = if has_preview { width / 2 } else { width };
        let reserved = FIXED_ROWS + usize::from(has_header);
        Self {
            width,
            height,
            list_width,
            item_area_height: usize::from(height).saturating_sub(reserved),
            has_preview,
            has_header,
        }
    }

    pub fn resized(self, width: u16, height: u16) -> Self {
        Self::new(width, height, self.has_preview, self.has_header)
    }
}

/// Consistent copy of everything the renderer reads.
#[derive(Debug, Clone)]
pub struct View {
    pub items: Arc<Vec<Vec<char>>>,
    pub matches: Arc<Vec<Match>>,
    pub query: Vec<char>,
    pub caret: usize,
    pub y: usize,
    pub cursor_y: usize,
    pub selections: Option<HashMap<usize, usize>>,
}

impl View {
    pub fn highlighted(&self) -> Option<&Match> {
        self.matches.get(self.y)
    }
}

pub struct UiState {
    items: Arc<Vec<Vec<char>>>,
    all_matches: Arc<Vec<Match>>,
    matches: Arc<Vec<Match>>,
    query: Vec<char>,
    caret: usize,
    y: usize,
    cursor_y: usize,
    selections: Option<HashMap<usize, usize>>,
    selection_counter: usize,
    layout: Layout,
    prompt_width: usize,
    phase: Phase,
    /// Bumped on every query change.
    generation: u64,
    /// Generation of the query that produced `matches`.
    filtered: u64,
}

impl UiState {
    pub fn new(labels: Vec<String>, multi: bool, layout: Layout, prompt: &str) -> Self {
        let mut state = Self {
            items: Arc::new(Vec::new()),
            all_matches: Arc::new(Vec::new()),
            matches: Arc::new(Vec::new()),
            query: Vec::new(),
            caret: 0,
            y: 0,
            cursor_y: 0,
            selections: multi.then(HashMap::new),
            selection_counter: 0,
            layout,
            prompt_width: prompt.chars().map(char_width).sum(),
            phase: Phase::Editing,
            generation: 0,
            filtered: 0,
        };
        state.replace_items(labels);
        state.matches = state.all_matches.clone();
        state
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn query(&self) -> &[char] {
        &self.query
    }

    pub fn query_text(&self) -> String {
        self.query.iter().collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.y, self.cursor_y)
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn items(&self) -> Arc<Vec<Vec<char>>> {
        self.items.clone()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn all_matches(&self) -> Arc<Vec<Match>> {
        self.all_matches.clone()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn view(&self) -> View {
        View {
            items: self.items.clone(),
            matches: self.matches.clone(),
            query: self.query.clone(),
            caret: self.caret,
            y: self.y,
            cursor_y: self.cursor_y,
            selections: self.selections.clone(),
        }
    }

    /// Swaps in a new candidate list. Current matches are kept until the next filter pass.
    pub fn replace_items(&mut self, labels: Vec<String>) {
        let items = labels
            .into_iter()
            .map(|label| label.chars().collect::<Vec<_>>())
            .collect::<Vec<_>>();
        self.all_matches = Arc::new(identity(items.len()));
        self.items = Arc::new(items);
    }

    /// Installs the result of a filter pass run for `generation`. A pending
    /// confirm resolves once the result belongs to the current query.
    pub fn apply_matches(&mut self, matches: Arc<Vec<Match>>, generation: u64) {
        self.matches = matches;
        self.filtered = self.filtered.max(generation);
        if self.y >= self.matches.len() {
            self.y = self.matches.len().saturating_sub(1);
            self.cursor_y = self.cursor_y.min(self.y);
        }
        if self.phase == Phase::ConfirmPending && self.filtered == self.generation {
            self.phase = Phase::Editing;
            self.confirm();
        }
    }

    /// Applies one intent. Returns true when the query changed and a filter
    /// pass is due.
    pub fn apply(&mut self, intent: Intent) -> bool {
        match self.phase {
            Phase::Editing => {}
            Phase::ConfirmPending if intent == Intent::Abort => {
                self.phase = Phase::Aborted;
                return false;
            }
            _ => return false,
        }

        let before = self.query.len();
        let mut changed = false;
        match intent {
            Intent::Abort => self.phase = Phase::Aborted,
            Intent::Confirm => self.confirm(),
            Intent::Insert(ch) => {
                self.query.insert(self.caret, ch);
                self.caret += 1;
                changed = true;
            }
            Intent::DeleteLeft => {
                if self.caret > 0 {
                    self.caret -= 1;
                    self.query.remove(self.caret);
                }
            }
            Intent::DeleteRight => {
                if self.caret < self.query.len() {
                    self.query.remove(self.caret);
                }
            }
            Intent::CaretLeft => self.caret = self.caret.saturating_sub(1),
            Intent::CaretRight => self.caret = (self.caret + 1).min(self.query.len()),
            Intent::CaretHome => self.caret = 0,
            Intent::CaretEnd => self.caret = self.query.len(),
            Intent::DeletePrevWord => self.delete_prev_word(),
            Intent::DeleteToStart => {
                self.query.drain(..self.caret);
                self.caret = 0;
            }
            Intent::CursorUp => self.cursor_up(),
            Intent::CursorDown => self.cursor_down(),
            Intent::ToggleSelection => self.toggle_selection(),
            Intent::Resize(width, height) => changed = self.resize(width, height),
        }
        let changed = changed || self.query.len() != before;
        if changed {
            self.generation += 1;
        }
        changed
    }

    fn confirm(&mut self) {
        if self.filtered != self.generation {
            self.phase = Phase::ConfirmPending;
            return;
        }
        let Some(highlighted) = self.matches.get(self.y).map(|entry| entry.index) else {
            self.phase = Phase::Aborted;
            return;
        };

        let picked = match &self.selections {
            Some(selections) if !selections.is_empty() => {
                let mut ordered = selections
                    .iter()
                    .map(|(&index, &ordinal)| (ordinal, index))
                    .collect::<Vec<_>>();
                ordered.sort_unstable();
                ordered.into_iter().map(|(_, index)| index).collect()
            }
            _ => vec![highlighted],
        };
        self.phase = Phase::AwaitingConfirm(picked);
    }

    fn delete_prev_word(&mut self) {
        let head = &self.query[..self.caret];
        let trimmed_len = head
            .iter()
            .rposition(|ch| !ch.is_whitespace())
            .map_or(0, |pos| pos + 1);
        let start = head[..trimmed_len]
            .iter()
            .rposition(|&ch| ch == ' ')
            .map_or(0, |pos| pos + 1);
        self.query.drain(start..self.caret);
        self.caret = start;
    }

    fn cursor_up(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.y = (self.y + 1).min(self.matches.len() - 1);
        if self.cursor_y + 1 < self.layout.item_area_height
            && self.cursor_y + 1 < self.matches.len()
        {
            self.cursor_y += 1;
        }
    }

    fn cursor_down(&mut self) {
        self.y = self.y.saturating_sub(1);
        self.cursor_y = self.cursor_y.saturating_sub(1);
    }

    fn toggle_selection(&mut self) {
        let Some(index) = self.matches.get(self.y).map(|entry| entry.index) else {
            return;
        };
        let Some(selections) = self.selections.as_mut() else {
            return;
        };
        if selections.remove(&index).is_none() {
            selections.insert(index, self.selection_counter);
            self.selection_counter += 1;
        }
        self.cursor_down();
    }

    fn resize(&mut self, width: u16, height: u16) -> bool {
        self.layout = self.layout.resized(width, height);
        self.cursor_y = self
            .cursor_y
            .min(self.layout.item_area_height.saturating_sub(1));

        // one cell is kept for the terminal caret
        let budget = usize::from(self.layout.list_width).saturating_sub(self.prompt_width + 1);
        let mut used = 0;
        let mut keep = 0;
        for &ch in &self.query {
            used += char_width(ch);
            if used > budget {
                break;
            }
            keep += 1;
        }
        if keep == self.query.len() {
            return false;
        }
        self.query.truncate(keep);
        self.caret = self.caret.min(keep);
        true
    }
}

pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Intent, Layout, Phase, UiState};
    use crate::finder::matcher::{Match, Mode, find_all};

    fn state(labels: &[&str], multi: bool) -> UiState {
        UiState::new(
            labels.iter().map(|label| label.to_string()).collect(),
            multi,
            Layout::new(80, 24, false, false),
            "> ",
        )
    }

    fn refilter(state: &mut UiState) {
        let matches = find_all(state.query(), &state.items(), Mode::Smart).expect("filter");
        let generation = state.generation();
        state.apply_matches(Arc::new(matches), generation);
    }

    fn type_text(state: &mut UiState, text: &str) {
        for ch in text.chars() {
            if state.apply(Intent::Insert(ch)) {
                refilter(state);
            }
        }
    }

    #[test]
    fn editing_then_backspace_refilters() {
        let mut state = state(&["foo", "bar"], false);
        type_text(&mut state, "fob");
        assert!(state.matches().is_empty());
        assert!(state.apply(Intent::DeleteLeft));
        refilter(&mut state);
        type_text(&mut state, "o");

        assert_eq!(state.query_text(), "foo");
        assert_eq!(state.caret(), 3);
        assert_eq!(
            state.matches()[0],
            Match {
                index: 0,
                score: state.matches()[0].score,
                highlight: Some(0..3),
            }
        );
    }

    #[test]
    fn caret_moves_within_bounds() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "ab");
        assert!(!state.apply(Intent::CaretRight));
        assert_eq!(state.caret(), 2);
        state.apply(Intent::CaretHome);
        state.apply(Intent::CaretLeft);
        assert_eq!(state.caret(), 0);
        assert!(state.apply(Intent::DeleteRight));
        assert_eq!(state.query_text(), "b");
        state.apply(Intent::CaretEnd);
        assert_eq!(state.caret(), 1);
    }

    #[test]
    fn insert_in_the_middle_advances_caret() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "ac");
        state.apply(Intent::CaretLeft);
        type_text(&mut state, "b");
        assert_eq!(state.query_text(), "abc");
        assert_eq!(state.caret(), 2);
    }

    #[test]
    fn delete_prev_word_treats_trailing_space_as_word() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "prod eu  ");
        assert!(state.apply(Intent::DeletePrevWord));
        assert_eq!(state.query_text(), "prod ");
        assert_eq!(state.caret(), 5);
        state.apply(Intent::DeletePrevWord);
        assert_eq!(state.query_text(), "");
        assert_eq!(state.caret(), 0);
    }

    #[test]
    fn delete_prev_word_keeps_text_after_caret() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "one two");
        state.apply(Intent::CaretLeft);
        state.apply(Intent::DeletePrevWord);
        assert_eq!(state.query_text(), "one o");
        assert_eq!(state.caret(), 4);
    }

    #[test]
    fn delete_to_start_keeps_tail() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "abcd");
        state.apply(Intent::CaretLeft);
        assert!(state.apply(Intent::DeleteToStart));
        assert_eq!(state.query_text(), "d");
        assert_eq!(state.caret(), 0);
    }

    #[test]
    fn cursor_moves_and_clamps() {
        let mut state = state(&["a", "b", "c"], false);
        for _ in 0..5 {
            state.apply(Intent::CursorUp);
        }
        assert_eq!(state.cursor(), (2, 2));
        state.apply(Intent::CursorDown);
        assert_eq!(state.cursor(), (1, 1));
        for _ in 0..5 {
            state.apply(Intent::CursorDown);
        }
        assert_eq!(state.cursor(), (0, 0));
    }

    #[test]
    fn cursor_row_stays_inside_item_area() {
        let labels = (0..50).map(|i| format!("item-{i}")).collect::<Vec<_>>();
        let mut state = UiState::new(labels, false, Layout::new(40, 7, false, false), "> ");
        for _ in 0..20 {
            state.apply(Intent::CursorUp);
        }
        let (y, cursor_y) = state.cursor();
        assert_eq!(y, 20);
        assert_eq!(cursor_y, 4);
        state.apply(Intent::Resize(40, 4));
        assert_eq!(state.cursor(), (20, 1));
    }

    #[test]
    fn filter_result_clamps_cursor() {
        let mut state = state(&["alpha", "beta", "gamma", "delta"], false);
        for _ in 0..3 {
            state.apply(Intent::CursorUp);
        }
        type_text(&mut state, "ta");
        assert_eq!(state.matches().len(), 2);
        assert_eq!(state.cursor(), (1, 1));
        type_text(&mut state, "zz");
        assert_eq!(state.cursor(), (0, 0));
    }

    #[test]
    fn confirm_single_returns_highlighted() {
        let mut state = state(&["a", "b"], false);
        state.apply(Intent::CursorUp);
        state.apply(Intent::Confirm);
        assert_eq!(state.phase(), &Phase::AwaitingConfirm(vec![1]));
    }

    #[test]
    fn confirm_without_matches_aborts() {
        let mut state = state(&["a"], false);
        type_text(&mut state, "zzz");
        state.apply(Intent::Confirm);
        assert_eq!(state.phase(), &Phase::Aborted);
    }

    #[test]
    fn multi_select_returns_selection_order() {
        let mut state = state(&["a", "b", "c", "d"], true);
        state.apply(Intent::CursorUp);
        state.apply(Intent::CursorUp);
        state.apply(Intent::ToggleSelection);
        assert_eq!(state.cursor(), (1, 1));
        state.apply(Intent::CursorDown);
        state.apply(Intent::ToggleSelection);
        state.apply(Intent::Confirm);
        assert_eq!(state.phase(), &Phase::AwaitingConfirm(vec![2, 0]));
    }

    #[test]
    fn toggling_twice_deselects() {
        let mut state = state(&["a", "b"], true);
        state.apply(Intent::ToggleSelection);
        state.apply(Intent::ToggleSelection);
        state.apply(Intent::CursorUp);
        state.apply(Intent::Confirm);
        assert_eq!(state.phase(), &Phase::AwaitingConfirm(vec![1]));
    }

    #[test]
    fn toggle_is_ignored_in_single_select() {
        let mut state = state(&["a", "b"], false);
        state.apply(Intent::CursorUp);
        state.apply(Intent::ToggleSelection);
        assert_eq!(state.cursor(), (1, 1));
    }

    #[test]
    fn resize_truncates_query_that_no_longer_fits() {
        let mut state = state(&["x"], false);
        type_text(&mut state, "abcdefghij");
        assert!(state.apply(Intent::Resize(8, 10)));
        // "> " plus one caret cell leaves five cells
        assert_eq!(state.query_text(), "abcde");
        assert_eq!(state.caret(), 5);
        assert!(!state.apply(Intent::Resize(80, 10)));
    }

    #[test]
    fn replacing_items_resets_identity() {
        let mut state = state(&["x"], false);
        state.replace_items(vec!["x".to_string(), "xy".to_string()]);
        assert_eq!(state.item_count(), 2);
        assert_eq!(state.all_matches().len(), 2);
        assert_eq!(state.all_matches()[1].index, 1);
    }

    #[test]
    fn confirm_waits_for_filter_of_current_query() {
        let mut state = state(&["banana", "grape", "apple"], false);
        state.apply(Intent::Insert('a'));
        let stale = state.generation();
        state.apply(Intent::Insert('p'));
        state.apply(Intent::Confirm);
        assert_eq!(state.phase(), &Phase::ConfirmPending);
        assert!(!state.apply(Intent::Insert('x')));
        assert_eq!(state.query_text(), "ap");

        let partial = find_all(&['a'], &state.items(), Mode::Smart).expect("filter");
        state.apply_matches(Arc::new(partial), stale);
        assert_eq!(state.phase(), &Phase::ConfirmPending);

        refilter(&mut state);
        assert_eq!(state.phase(), &Phase::AwaitingConfirm(vec![2]));
    }

    #[test]
    fn abort_while_confirm_pending() {
        let mut state = state(&["a", "b"], false);
        state.apply(Intent::Insert('b'));
        state.apply(Intent::Confirm);
        state.apply(Intent::Abort);
        assert_eq!(state.phase(), &Phase::Aborted);
        refilter(&mut state);
        assert_eq!(state.phase(), &Phase::Aborted);
    }

    #[test]
    fn intents_after_completion_are_ignored() {
        let mut state = state(&["a"], false);
        state.apply(Intent::Abort);
        assert!(!state.apply(Intent::Insert('a')));
        assert_eq!(state.phase(), &Phase::Aborted);
    }
}
