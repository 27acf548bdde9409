use thiserror::Error;

use crate::model::ids::SubjectId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("at least one subject must be selected")]
    NoSubjects,

    #[error("question count must be positive")]
    ZeroQuestions,

    #[error("exam duration must be at least one minute")]
    ZeroDuration,
}

/// Parameters of one exam attempt, fixed before the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    subject_ids: Vec<SubjectId>,
    question_count: u32,
    duration_minutes: u32,
    guest: bool,
}

impl SessionConfig {
    /// Validate and build a session configuration.
    ///
    /// Repeated subject ids are collapsed; first-seen order is kept.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when no subject is given or the count or
    /// duration is zero.
    pub fn new(
        subject_ids: impl IntoIterator<Item = SubjectId>,
        question_count: u32,
        duration_minutes: u32,
        guest: bool,
    ) -> Result<Self, ConfigError> {
        let mut subjects: Vec<SubjectId> = Vec::new();
        for id in subject_ids {
            if !subjects.contains(&id) {
                subjects.push(id);
            }
        }

        if subjects.is_empty() {
            return Err(ConfigError::NoSubjects);
        }
        if question_count == 0 {
            return Err(ConfigError::ZeroQuestions);
        }
        if duration_minutes == 0 {
            return Err(ConfigError::ZeroDuration);
        }

        Ok(Self {
            subject_ids: subjects,
            question_count,
            duration_minutes,
            guest,
        })
    }

    #[must_use]
    pub fn subject_ids(&self) -> &[SubjectId] {
        &self.subject_ids
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Requested duration in whole seconds.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.guest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_repeated_subjects() {
        let cfg = SessionConfig::new(
            [SubjectId::new(3), SubjectId::new(1), SubjectId::new(3)],
            10,
            5,
            false,
        )
        .unwrap();
        assert_eq!(cfg.subject_ids(), &[SubjectId::new(3), SubjectId::new(1)]);
        assert_eq!(cfg.duration_secs(), 300);
        assert!(!cfg.is_guest());
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            SessionConfig::new([], 1, 1, false).unwrap_err(),
            ConfigError::NoSubjects
        );
        assert_eq!(
            SessionConfig::new([SubjectId::new(1)], 0, 1, false).unwrap_err(),
            ConfigError::ZeroQuestions
        );
        assert_eq!(
            SessionConfig::new([SubjectId::new(1)], 1, 0, true).unwrap_err(),
            ConfigError::ZeroDuration
        );
    }
}
