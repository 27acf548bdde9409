mod config;
mod exam;
mod ids;
mod outcome;
mod question;
mod selection;

pub use config::{ConfigError, SessionConfig};
pub use exam::{AnswerRecord, ExamRecord, StoredExamResult, TerminationReason, UnknownReason};
pub use ids::{ExamId, OptionId, QuestionId, SubjectId, UserId};
pub use outcome::{ExamOutcome, Percentage, Score, ScoreError};
pub use question::{AnswerOption, MAX_OPTIONS, MIN_OPTIONS, Question, QuestionError};
pub use selection::Selections;
