mod clock;
mod loader;
mod pipeline;
mod report;
mod results;
mod service;
mod session;

// Public API of the exam subsystem.
pub use crate::error::{ExamError, PersistenceError, PersistenceStep, SessionInvariantViolation};
pub use clock::{SessionClock, TICK_PERIOD};
pub use loader::{LoadedPool, PoolNotice, QuestionPoolLoader, select_questions};
pub use pipeline::{ExamSubmission, ResultPipeline};
pub use report::{ExamReport, Persistence};
pub use results::ExamResultService;
pub use service::{ExamService, RunningExam};
pub use session::{Advance, ExamSession, SessionPhase, TerminatedSession, TerminationClaim, Tick};
