//! Thread-safe filterable list with a selection cursor.
//!
//! Every panel (workflows, runs, jobs) is a `FilteredList<T>`. Background
//! completions replace its contents while the render path reads it, so all
//! state sits behind one `RwLock` and readers get owned copies.

use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Predicate deciding whether an item passes the current filter text.
pub type MatchFn<T> = Box<dyn Fn(&T, &str) -> bool + Send + Sync>;

struct ListState<T> {
    all: Vec<T>,
    filtered: Vec<T>,
    filter: String,
    selected: usize,
}

impl<T: Clone> ListState<T> {
    fn apply_filter(&mut self, matches: &MatchFn<T>) {
        self.filtered = if self.filter.is_empty() {
            self.all.clone()
        } else {
            self.all
                .iter()
                .filter(|item| matches(item, &self.filter))
                .cloned()
                .collect()
        };
        self.clamp_selected();
    }

    fn clamp_selected(&mut self) {
        match self.filtered.len() {
            0 => self.selected = 0,
            len if self.selected >= len => self.selected = len - 1,
            _ => {}
        }
    }
}

/// Ordered items, the subset passing the filter, and a cursor into that subset.
///
/// Invariants: `filtered` is `all` restricted to matching items in original
/// order; `selected < filtered.len()` whenever `filtered` is non-empty and
/// `selected == 0` otherwise.
pub struct FilteredList<T> {
    state: RwLock<ListState<T>>,
    matches: MatchFn<T>,
}

impl<T> fmt::Debug for FilteredList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f.debug_struct("FilteredList")
            .field("len", &state.filtered.len())
            .field("total", &state.all.len())
            .field("filter", &state.filter)
            .field("selected", &state.selected)
            .finish()
    }
}

impl<T: Clone> FilteredList<T> {
    /// Create an empty list filtered by `matches`.
    pub fn new<F>(matches: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            state: RwLock::new(ListState {
                all: Vec::new(),
                filtered: Vec::new(),
                filter: String::new(),
                selected: 0,
            }),
            matches: Box::new(matches),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ListState<T>> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListState<T>> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace all items, re-apply the current filter and clamp the cursor.
    pub fn replace(&self, items: Vec<T>) {
        let mut state = self.write();
        state.all = items;
        state.apply_filter(&self.matches);
    }

    /// Replace the filter text. Empty text lets every item through.
    pub fn set_filter(&self, text: &str) {
        let mut state = self.write();
        state.filter = text.to_string();
        state.apply_filter(&self.matches);
    }

    pub fn select_next(&self) {
        let mut state = self.write();
        if state.selected + 1 < state.filtered.len() {
            state.selected += 1;
        }
    }

    pub fn select_previous(&self) {
        let mut state = self.write();
        state.selected = state.selected.saturating_sub(1);
    }

    /// Move the cursor back to the first item.
    pub fn select_first(&self) {
        self.write().selected = 0;
    }

    /// The item under the cursor, or `None` when nothing passes the filter.
    pub fn selected(&self) -> Option<T> {
        let state = self.read();
        state.filtered.get(state.selected).cloned()
    }

    /// Copy of the filtered items.
    pub fn items(&self) -> Vec<T> {
        self.read().filtered.clone()
    }

    /// Number of filtered items.
    pub fn len(&self) -> usize {
        self.read().filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().filtered.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.read().selected
    }

    pub fn filter_text(&self) -> String {
        self.read().filter.clone()
    }

    /// Number of items before filtering.
    pub fn total_len(&self) -> usize {
        self.read().all.len()
    }
}

/// Case-insensitive substring test used by every panel's predicate.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn words() -> FilteredList<String> {
        FilteredList::new(|item: &String, filter: &str| contains_ignore_case(item, filter))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_has_no_selection() {
        let list = words();
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert_eq!(list.selected_index(), 0);
        assert!(list.selected().is_none());
        list.select_next();
        list.select_previous();
        assert_eq!(list.selected_index(), 0);
    }

    #[test]
    fn navigation_saturates_at_both_ends() {
        let list = words();
        list.replace(strings(&["a", "b", "c"]));

        list.select_previous();
        assert_eq!(list.selected_index(), 0);

        list.select_next();
        list.select_next();
        list.select_next();
        list.select_next();
        assert_eq!(list.selected_index(), 2);
        assert_eq!(list.selected().unwrap(), "c");

        list.select_first();
        assert_eq!(list.selected().unwrap(), "a");
    }

    #[test]
    fn replace_clamps_cursor_into_new_range() {
        let list = words();
        list.replace(strings(&["a", "b", "c", "d"]));
        list.select_next();
        list.select_next();
        list.select_next();
        assert_eq!(list.selected_index(), 3);

        list.replace(strings(&["x", "y"]));
        assert_eq!(list.selected_index(), 1);
        assert_eq!(list.selected().unwrap(), "y");

        list.replace(Vec::new());
        assert_eq!(list.selected_index(), 0);
        assert!(list.selected().is_none());
    }

    #[test]
    fn replace_keeps_cursor_when_still_in_range() {
        let list = words();
        list.replace(strings(&["a", "b", "c"]));
        list.select_next();
        list.replace(strings(&["d", "e", "f"]));
        assert_eq!(list.selected().unwrap(), "e");
    }

    #[test]
    fn filter_keeps_original_order_and_is_case_insensitive() {
        let list = words();
        list.replace(strings(&["Build", "lint", "BUILD-docs", "test", "rebuild"]));

        list.set_filter("build");
        assert_eq!(list.items(), strings(&["Build", "BUILD-docs", "rebuild"]));
        assert_eq!(list.total_len(), 5);
        assert_eq!(list.filter_text(), "build");

        list.set_filter("");
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn filter_applies_to_later_replacements() {
        let list = words();
        list.set_filter("api");
        list.replace(strings(&["api-tests", "web", "API docs"]));
        assert_eq!(list.items(), strings(&["api-tests", "API docs"]));
    }

    #[test]
    fn filter_with_no_matches_resets_cursor() {
        let list = words();
        list.replace(strings(&["a", "b", "c"]));
        list.select_next();
        list.select_next();
        list.set_filter("zzz");
        assert_eq!(list.len(), 0);
        assert_eq!(list.selected_index(), 0);
        assert!(list.selected().is_none());
    }

    #[test]
    fn setting_same_filter_twice_is_idempotent() {
        let list = words();
        list.replace(strings(&["alpha", "beta", "alphabet", "gamma"]));
        list.set_filter("alp");
        let once = list.items();
        list.set_filter("alp");
        assert_eq!(list.items(), once);
    }

    #[test]
    fn custom_predicates_are_honoured() {
        let list = FilteredList::new(|n: &u32, filter: &str| {
            filter.parse::<u32>().map(|m| n % m == 0).unwrap_or(false)
        });
        list.replace((1..=10).collect());
        list.set_filter("3");
        assert_eq!(list.items(), vec![3, 6, 9]);
    }

    #[test]
    fn items_returns_a_detached_copy() {
        let list = words();
        list.replace(strings(&["a", "b"]));
        let mut copy = list.items();
        copy.push("c".into());
        copy[0] = "mutated".into();
        assert_eq!(list.items(), strings(&["a", "b"]));
    }

    // Deterministic xorshift so the operation sequence is reproducible.
    fn next_rand(seed: &mut u64) -> u64 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed
    }

    #[test]
    fn cursor_stays_in_range_over_random_operation_sequences() {
        let pool = ["deploy", "Deploy-prod", "lint", "test", "e2e", "docs", "release"];
        for mut seed in 1..=40u64 {
            let list = words();
            for _ in 0..200 {
                match next_rand(&mut seed) % 4 {
                    0 => {
                        let n = (next_rand(&mut seed) % (pool.len() as u64 + 1)) as usize;
                        let items = (0..n)
                            .map(|_| {
                                pool[(next_rand(&mut seed) % pool.len() as u64) as usize]
                                    .to_string()
                            })
                            .collect::<Vec<_>>();
                        list.replace(items.clone());
                        let filter = list.filter_text();
                        let expected: Vec<String> = items
                            .into_iter()
                            .filter(|item| filter.is_empty() || contains_ignore_case(item, &filter))
                            .collect();
                        assert_eq!(list.items(), expected);
                    }
                    1 => {
                        let filters = ["", "de", "E", "x", "lint"];
                        let f = filters[(next_rand(&mut seed) % filters.len() as u64) as usize];
                        list.set_filter(f);
                    }
                    2 => list.select_next(),
                    _ => list.select_previous(),
                }
                let len = list.len();
                let idx = list.selected_index();
                assert!(idx <= len.saturating_sub(1), "idx {idx} len {len}");
                assert_eq!(list.selected().is_some(), len > 0);
            }
        }
    }

    #[test]
    fn concurrent_writers_and_readers_keep_invariants() {
        let list = Arc::new(words());
        let mut handles = Vec::new();

        for t in 0..4 {
            let list = Arc::clone(&list);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    match (t + i) % 4 {
                        0 => list.replace((0..(i % 7)).map(|n| format!("item-{n}")).collect()),
                        1 => list.set_filter(if i % 2 == 0 { "" } else { "1" }),
                        2 => list.select_next(),
                        _ => list.select_previous(),
                    }
                }
            }));
        }
        for _ in 0..2 {
            let list = Arc::clone(&list);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let _ = list.selected();
                    let items = list.items();
                    assert!(items.len() <= 6);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let len = list.len();
        assert!(list.selected_index() <= len.saturating_sub(1));
    }
}
