#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod exam;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ExamError, PersistenceError, ResultLookupError};
pub use exam::{
    Advance, ExamReport, ExamResultService, ExamService, Persistence, PoolNotice, RunningExam,
    TerminationClaim,
};
