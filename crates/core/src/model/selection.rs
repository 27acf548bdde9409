use std::collections::HashMap;

use crate::model::ids::{OptionId, QuestionId};

/// Chosen option per question. At most one entry per question; entries are
/// overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    chosen: HashMap<QuestionId, OptionId>,
}

impl Selections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `option` for `question`, returning the previous choice if any.
    pub fn select(&mut self, question: QuestionId, option: OptionId) -> Option<OptionId> {
        self.chosen.insert(question, option)
    }

    #[must_use]
    pub fn get(&self, question: QuestionId) -> Option<&OptionId> {
        self.chosen.get(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &OptionId)> {
        self.chosen.iter().map(|(q, o)| (*q, o))
    }
}

impl FromIterator<(QuestionId, OptionId)> for Selections {
    fn from_iter<T: IntoIterator<Item = (QuestionId, OptionId)>>(iter: T) -> Self {
        Self {
            chosen: iter.into_iter().collect(),
        }
    }
}
