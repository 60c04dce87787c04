use std::collections::HashMap;
use std::sync::Arc;

use crate::model::assessment::{Assessment, Question};
use crate::model::ids::QuestionId;

/// Immutable, shareable view of an assessment's questions with id lookup.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    assessment: Arc<Assessment>,
    index: HashMap<QuestionId, usize>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(assessment: Arc<Assessment>) -> Self {
        let index = assessment
            .questions()
            .iter()
            .enumerate()
            .map(|(position, q)| (q.id().clone(), position))
            .collect();
        Self { assessment, index }
    }

    #[must_use]
    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    #[must_use]
    pub fn shared_assessment(&self) -> Arc<Assessment> {
        Arc::clone(&self.assessment)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assessment.questions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Question at a 0-based position.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<&Question> {
        self.assessment.questions().get(position)
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&Question> {
        self.index.get(id).and_then(|&position| self.at(position))
    }

    #[must_use]
    pub fn position_of(&self, id: &QuestionId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.assessment.questions().iter()
    }

    /// Sum of every question's points.
    #[must_use]
    pub fn total_points(&self) -> u64 {
        self.iter().map(|q| u64::from(q.points())).sum()
    }
}
