use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("percentage out of range: {0}")]
    PercentageOutOfRange(String),

    #[error("stored percentage {stored} does not match counts ({expected})")]
    PercentageMismatch {
        stored: Percentage,
        expected: Percentage,
    },
}

//
// ─── PERCENTAGE ───────────────────────────────────────────────────────────────
//

/// A 0–100 score kept as exact hundredths, so `66.67` is stored as `6667`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Percentage(u32);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(10_000);

    /// `part / total * 100`, rounded half-up to two decimals. A zero total
    /// yields zero.
    #[must_use]
    pub fn from_ratio(part: u32, total: u32) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        let part = u64::from(part.min(total));
        let total = u64::from(total);
        let hundredths = (part * 20_000 + total) / (2 * total);
        // part <= total keeps this within 0..=10_000
        Self(u32::try_from(hundredths).unwrap_or(10_000))
    }

    /// Rebuild from a stored decimal value such as `66.67`.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::PercentageOutOfRange` for non-finite values or
    /// values outside 0..=100.
    pub fn from_f64(value: f64) -> Result<Self, ScoreError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ScoreError::PercentageOutOfRange(value.to_string()));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let hundredths = (value * 100.0).round() as u32;
        Ok(Self(hundredths))
    }

    #[must_use]
    pub fn hundredths(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl fmt::Debug for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Percentage({self})")
    }
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Correct / incorrect / unanswered tally of one finished exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    correct: u32,
    incorrect: u32,
    unanswered: u32,
    percentage: Percentage,
}

impl Score {
    /// Build a score from counts; the percentage is derived against the sum.
    #[must_use]
    pub fn from_counts(correct: u32, incorrect: u32, unanswered: u32) -> Self {
        let total = correct
            .saturating_add(incorrect)
            .saturating_add(unanswered);
        Self {
            correct,
            incorrect,
            unanswered,
            percentage: Percentage::from_ratio(correct, total),
        }
    }

    /// Rehydrate a score from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::PercentageMismatch` if the stored percentage
    /// disagrees with the stored counts.
    pub fn from_persisted(
        correct: u32,
        incorrect: u32,
        unanswered: u32,
        percentage: Percentage,
    ) -> Result<Self, ScoreError> {
        let score = Self::from_counts(correct, incorrect, unanswered);
        if score.percentage != percentage {
            return Err(ScoreError::PercentageMismatch {
                stored: percentage,
                expected: score.percentage,
            });
        }
        Ok(score)
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.correct.saturating_add(self.incorrect)
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.answered().saturating_add(self.unanswered)
    }

    #[must_use]
    pub fn percentage(&self) -> Percentage {
        self.percentage
    }
}

//
// ─── EXAM OUTCOME ─────────────────────────────────────────────────────────────
//

/// Final, immutable result of a session: the score plus the time actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamOutcome {
    score: Score,
    elapsed_secs: u32,
}

impl ExamOutcome {
    #[must_use]
    pub fn new(score: Score, elapsed_secs: u32) -> Self {
        Self {
            score,
            elapsed_secs,
        }
    }

    #[must_use]
    pub fn score(&self) -> &Score {
        &self.score
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.score.correct()
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.score.incorrect()
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.score.unanswered()
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.score.total()
    }

    #[must_use]
    pub fn percentage(&self) -> Percentage {
        self.score.percentage()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }
}
