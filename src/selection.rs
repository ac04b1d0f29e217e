//! Advisory set of identities chosen as batch targets.
//!
//! Selection never filters the discovered set. It only decides which of the
//! displayed records a batch job targets when it is non-empty.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    selected: HashSet<String>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of an identity. Unknown identities are accepted.
    pub fn toggle(&mut self, identity: &str) {
        if !self.selected.remove(identity) {
            self.selected.insert(identity.to_string());
        }
    }

    /// Replaces the selection with exactly the given identities
    pub fn select_all<I, S>(&mut self, identities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = identities.into_iter().map(Into::into).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.selected.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut selection = SelectionStore::new();
        selection.toggle("https://a.test/1.png");
        assert!(selection.contains("https://a.test/1.png"));
        selection.toggle("https://a.test/1.png");
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_replaces_previous_selection() {
        let mut selection = SelectionStore::new();
        selection.toggle("https://a.test/old.png");
        selection.select_all(["https://a.test/1.png", "https://a.test/2.png"]);

        assert_eq!(selection.len(), 2);
        assert!(!selection.contains("https://a.test/old.png"));
    }

    #[test]
    fn test_clear_and_unknown_identities() {
        let mut selection = SelectionStore::new();
        selection.toggle("not-discovered-yet");
        assert_eq!(selection.len(), 1);
        selection.clear();
        assert!(selection.is_empty());
        assert_eq!(selection.iter().count(), 0);
    }
}
