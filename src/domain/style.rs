// ============================================================
// Layer 3 — Style Ids and Fine-Tune Sets
// ============================================================
// A style id indexes one row of the generator's embedding table
// (one target font or handwriting style). A FineTuneSet names
// the rows that may change while fine-tuning; every other row
// is held fixed.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{GanError, GanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StyleId(pub usize);

impl StyleId {
    /// Fails if the id does not index into a table of `embedding_num` rows.
    pub fn checked(id: usize, embedding_num: usize) -> GanResult<Self> {
        if id < embedding_num {
            Ok(Self(id))
        } else {
            Err(GanError::config(format!(
                "style id {id} is outside [0, {embedding_num})"
            )))
        }
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which parameters a fine-tune restriction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FineTuneScope {
    /// Only the generator's embedding rows are restricted
    #[default]
    Embedding,
    /// Embedding rows and the matching discriminator classifier columns
    EmbeddingAndClassifier,
}

/// Non-empty set of style ids allowed to change during fine-tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineTuneSet {
    ids: BTreeSet<usize>,
}

impl FineTuneSet {
    /// Parse a comma-separated list such as "1,4,7".
    /// Blank entries are ignored; an all-blank list yields None.
    pub fn parse(list: &str) -> GanResult<Option<Self>> {
        let mut ids = BTreeSet::new();
        for part in list.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id = part.parse::<usize>().map_err(|_| {
                GanError::config(format!("fine_tune entry '{part}' is not a style id"))
            })?;
            ids.insert(id);
        }
        Ok(if ids.is_empty() { None } else { Some(Self { ids }) })
    }

    pub fn from_ids(ids: impl IntoIterator<Item = usize>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    pub fn contains(&self, id: StyleId) -> bool {
        self.ids.contains(&id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }

    pub fn max_id(&self) -> Option<usize> {
        self.ids.iter().next_back().copied()
    }

    /// 1.0 for rows in the set, 0.0 otherwise — the update mask
    /// applied to a table of `rows` style rows.
    pub fn row_mask(&self, rows: usize) -> Vec<f32> {
        (0..rows)
            .map(|r| if self.ids.contains(&r) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let set = FineTuneSet::parse("3, 1,,7").unwrap().unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![1, 3, 7]);
        assert_eq!(set.max_id(), Some(7));
    }

    #[test]
    fn test_blank_list_is_none() {
        assert!(FineTuneSet::parse(" , ").unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_integer() {
        assert!(matches!(FineTuneSet::parse("1,x"), Err(GanError::Config(_))));
    }

    #[test]
    fn test_row_mask() {
        let set = FineTuneSet::from_ids([0, 2]);
        assert_eq!(set.row_mask(4), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_checked_style_id() {
        assert_eq!(StyleId::checked(1, 2).unwrap(), StyleId(1));
        assert!(StyleId::checked(2, 2).is_err());
    }
}
