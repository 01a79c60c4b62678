use serde::{Deserialize, Serialize};

use crate::spinner::SpinnerError;

/// Ordered, duplicate-free wheel labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WedgeSet {
    labels: Vec<String>,
}

impl WedgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from arbitrary input, keeping the first occurrence of each label.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, SpinnerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::new();
        for label in labels {
            match out.push(label.as_ref()) {
                Ok(_) | Err(SpinnerError::DuplicateLabel(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Trims and appends `input`. Returns the stored label.
    pub fn push(&mut self, input: &str) -> Result<&str, SpinnerError> {
        let label = input.trim();
        if label.is_empty() {
            return Err(SpinnerError::EmptyLabel);
        }
        if self.contains(label) {
            return Err(SpinnerError::DuplicateLabel(label.to_string()));
        }
        self.labels.push(label.to_string());
        Ok(self.labels[self.labels.len() - 1].as_str())
    }

    /// Removes `label` if present.
    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| l != label);
        self.labels.len() != before
    }

    /// Moves the label at `from` so that it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), SpinnerError> {
        let len = self.labels.len();
        if from >= len || to >= len {
            return Err(SpinnerError::IndexOutOfRange { from, to, len });
        }
        let label = self.labels.remove(from);
        self.labels.insert(to, label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_trims_and_rejects_blank_or_duplicate() {
        let mut set = WedgeSet::new();
        assert_eq!(set.push("  pizza ").unwrap(), "pizza");
        assert_eq!(set.push("   "), Err(SpinnerError::EmptyLabel));
        assert_eq!(
            set.push("pizza"),
            Err(SpinnerError::DuplicateLabel("pizza".to_string()))
        );
        assert_eq!(set.labels(), ["pizza"]);
    }

    #[test]
    fn reorder_moves_one_label() {
        let mut set = WedgeSet::from_labels(["a", "b", "c", "d"]).unwrap();
        set.reorder(0, 2).unwrap();
        assert_eq!(set.labels(), ["b", "c", "a", "d"]);
        set.reorder(3, 0).unwrap();
        assert_eq!(set.labels(), ["d", "b", "c", "a"]);
        assert!(matches!(
            set.reorder(4, 0),
            Err(SpinnerError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn from_labels_skips_duplicates_but_not_blanks() {
        let set = WedgeSet::from_labels(["x", "y", "x"]).unwrap();
        assert_eq!(set.labels(), ["x", "y"]);
        assert_eq!(
            WedgeSet::from_labels(["x", " "]),
            Err(SpinnerError::EmptyLabel)
        );
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let mut set = WedgeSet::from_labels(["x", "y"]).unwrap();
        assert!(set.remove("x"));
        assert!(!set.remove("x"));
        assert_eq!(set.len(), 1);
    }
}
