use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use exam_core::model::{OptionId, QuestionId, SessionConfig, TerminationReason};
use storage::repository::{ExamRepository, IdentityProvider, QuestionRepository, Storage};
use tokio::sync::oneshot;

use super::clock::{SessionClock, TICK_PERIOD};
use super::loader::{PoolNotice, QuestionPoolLoader};
use super::pipeline::{ExamSubmission, ResultPipeline};
use super::report::{ExamReport, Persistence};
use super::session::{Advance, ExamSession, TerminationClaim};
use crate::Clock;
use crate::error::ExamError;

//
// ─── RUNNING EXAM ──────────────────────────────────────────────────────────────
//

/// A started exam: the session, its countdown, and the timeout channel.
///
/// Dropping it stops the countdown.
#[derive(Debug)]
pub struct RunningExam {
    session: Arc<ExamSession>,
    clock: SessionClock,
    timeout_rx: Option<oneshot::Receiver<TerminationClaim>>,
    notice: Option<PoolNotice>,
    started_at: DateTime<Utc>,
}

impl RunningExam {
    #[must_use]
    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    /// Set when the pool held fewer questions than requested.
    #[must_use]
    pub fn notice(&self) -> Option<PoolNotice> {
        self.notice
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn select_option(&self, question: QuestionId, option: OptionId) -> bool {
        self.session.select_option(question, option)
    }

    pub fn advance(&self) -> Advance {
        self.session.advance()
    }

    /// Leave early. `None` if another trigger already ended the exam.
    pub fn exit(&self) -> Option<TerminationClaim> {
        self.session.terminate(TerminationReason::ManualExit)
    }

    /// Receiver that yields the claim when the countdown reaches zero.
    ///
    /// Only the first call returns it.
    pub fn take_timeout(&mut self) -> Option<oneshot::Receiver<TerminationClaim>> {
        self.timeout_rx.take()
    }

    /// Walk away without finishing; the countdown stops and nothing is saved.
    pub fn abandon(mut self) {
        self.clock.stop();
        log::info!("session {} abandoned", self.session.id());
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Starts exams and routes finished ones to scoring and persistence.
#[derive(Clone)]
pub struct ExamService {
    clock: Clock,
    loader: QuestionPoolLoader,
    pipeline: ResultPipeline,
    tick_period: Duration,
}

impl ExamService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        exams: Arc<dyn ExamRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            clock,
            loader: QuestionPoolLoader::new(questions),
            pipeline: ResultPipeline::new(exams, identity),
            tick_period: TICK_PERIOD,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.identity),
        )
    }

    /// Override the countdown step (one second by default).
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Load questions and start the countdown.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::PoolEmpty` or `ExamError::Storage` when loading
    /// fails; no countdown is started in that case.
    pub async fn start(&self, config: SessionConfig) -> Result<RunningExam, ExamError> {
        let session = Arc::new(ExamSession::new(config));

        let loaded = match self.loader.load(session.config()).await {
            Ok(loaded) => loaded,
            Err(err) => {
                session.abort();
                return Err(err);
            }
        };
        let count = loaded.questions.len();
        session.begin(loaded.questions)?;

        let (timeout_tx, timeout_rx) = oneshot::channel();
        let clock = SessionClock::start(Arc::clone(&session), self.tick_period, timeout_tx);
        log::info!(
            "session {} started: {count} questions, {} minutes{}",
            session.id(),
            session.config().duration_minutes(),
            if session.config().is_guest() {
                " (guest)"
            } else {
                ""
            }
        );

        Ok(RunningExam {
            session,
            clock,
            timeout_rx: Some(timeout_rx),
            notice: loaded.notice,
            started_at: self.clock.now(),
        })
    }

    /// Score the exam and save it unless it is a guest session.
    ///
    /// Persistence failures end up in the report, next to the outcome.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Invariant` if `claim` does not belong to `exam`.
    pub async fn finish(
        &self,
        exam: RunningExam,
        claim: TerminationClaim,
    ) -> Result<ExamReport, ExamError> {
        let RunningExam {
            session,
            mut clock,
            notice,
            started_at,
            ..
        } = exam;
        clock.stop();

        let done = session.finalize(claim)?;
        let finished_at = self.clock.now();
        log::info!(
            "session {} finished ({}): {} / {} correct, {}%",
            session.id(),
            done.reason,
            done.outcome.correct(),
            done.outcome.total(),
            done.outcome.percentage()
        );

        let persistence = if session.config().is_guest() {
            Persistence::GuestNotSaved
        } else {
            let submission = ExamSubmission {
                config: session.config(),
                session: &done,
                started_at,
                finished_at,
            };
            match self.pipeline.persist(&submission).await {
                Ok(id) => Persistence::Saved(id),
                Err(err) => Persistence::Failed(err),
            }
        };

        Ok(ExamReport {
            reason: done.reason,
            outcome: done.outcome,
            persistence,
            notice,
        })
    }
}
