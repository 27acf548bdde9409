use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use exam_core::model::{
    AnswerRecord, ExamOutcome, OptionId, Question, QuestionId, SessionConfig, Selections,
    TerminationReason,
};
use exam_core::scoring;
use uuid::Uuid;

use crate::error::{ExamError, SessionInvariantViolation};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Loading = 0,
    Running = 1,
    Terminating = 2,
    Terminated = 3,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionPhase::Loading,
            1 => SessionPhase::Running,
            2 => SessionPhase::Terminating,
            _ => SessionPhase::Terminated,
        }
    }
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Proof that the holder won the single termination claim of a session.
///
/// Not `Clone`: whoever holds it is the only caller allowed to finalize.
#[derive(Debug, PartialEq, Eq)]
pub struct TerminationClaim {
    session_id: Uuid,
    reason: TerminationReason,
}

impl TerminationClaim {
    #[must_use]
    pub fn reason(&self) -> TerminationReason {
        self.reason
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

/// Result of `ExamSession::advance`.
#[derive(Debug, PartialEq, Eq)]
pub enum Advance {
    Moved { position: usize },
    /// Advanced past the last question; the caller now owns termination.
    Finished(TerminationClaim),
    /// The session is not running.
    Ignored,
}

/// Result of one clock tick.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    Remaining(u32),
    TimedOut(TerminationClaim),
    /// The session is not running; the ticker should stop.
    Idle,
}

/// Frozen result of a terminated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedSession {
    pub reason: TerminationReason,
    pub outcome: ExamOutcome,
    /// Answered questions in presentation order.
    pub answers: Vec<AnswerRecord>,
    pub questions_presented: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

struct SessionState {
    questions: Vec<Question>,
    position: usize,
    selections: Selections,
    remaining_secs: u32,
}

/// In-progress exam shared between the user, the clock and the finisher.
///
/// All mutation happens under one lock and only while the phase is
/// `Running`. Leaving `Running` is a compare-and-set, so exactly one
/// trigger obtains the `TerminationClaim`.
pub struct ExamSession {
    id: Uuid,
    config: SessionConfig,
    phase: AtomicU8,
    state: Mutex<Option<SessionState>>,
}

impl ExamSession {
    /// Create a session in the `Loading` phase.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            phase: AtomicU8::new(SessionPhase::Loading as u8),
            state: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, from: SessionPhase, to: SessionPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn claim(&self, reason: TerminationReason) -> Option<TerminationClaim> {
        if self.transition(SessionPhase::Running, SessionPhase::Terminating) {
            log::debug!("session {} claimed termination: {reason}", self.id);
            Some(TerminationClaim {
                session_id: self.id,
                reason,
            })
        } else {
            None
        }
    }

    /// Seed the session with its finalized question list and start running.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Aborted` if the session was terminated while
    /// loading, or `ExamError::Invariant` for an empty list or a second call.
    pub fn begin(&self, questions: Vec<Question>) -> Result<(), ExamError> {
        let mut guard = self.lock();
        match self.phase() {
            SessionPhase::Loading => {}
            SessionPhase::Terminated if guard.is_none() => return Err(ExamError::Aborted),
            _ => return Err(SessionInvariantViolation::NotLoading.raise().into()),
        }
        if questions.is_empty() {
            return Err(SessionInvariantViolation::EmptySequence.raise().into());
        }

        *guard = Some(SessionState {
            questions,
            position: 0,
            selections: Selections::new(),
            remaining_secs: self.config.duration_secs(),
        });
        self.phase
            .store(SessionPhase::Running as u8, Ordering::Release);
        Ok(())
    }

    /// Record `option` for `question`, replacing an earlier choice.
    ///
    /// Returns false (and changes nothing) when the session is not running
    /// or the question is not part of this exam.
    pub fn select_option(&self, question: QuestionId, option: OptionId) -> bool {
        let mut guard = self.lock();
        if !self.is_running() {
            return false;
        }
        let Some(state) = guard.as_mut() else {
            return false;
        };
        if !state.questions.iter().any(|q| q.id() == question) {
            log::warn!("ignoring selection for question {question} outside session {}", self.id);
            return false;
        }
        state.selections.select(question, option);
        true
    }

    /// Move to the next question, or claim termination on the last one.
    pub fn advance(&self) -> Advance {
        let mut guard = self.lock();
        if !self.is_running() {
            return Advance::Ignored;
        }
        let Some(state) = guard.as_mut() else {
            return Advance::Ignored;
        };

        if state.position + 1 < state.questions.len() {
            state.position += 1;
            return Advance::Moved {
                position: state.position,
            };
        }
        match self.claim(TerminationReason::Completed) {
            Some(claim) => Advance::Finished(claim),
            None => Advance::Ignored,
        }
    }

    /// Request termination.
    ///
    /// From `Running` this returns the claim unless another trigger won it.
    /// From `Loading` the session is aborted outright and nothing is scored.
    pub fn terminate(&self, reason: TerminationReason) -> Option<TerminationClaim> {
        let _guard = self.lock();
        match self.phase() {
            SessionPhase::Loading => {
                self.abort_loading();
                None
            }
            SessionPhase::Running => self.claim(reason),
            SessionPhase::Terminating | SessionPhase::Terminated => None,
        }
    }

    /// Give up on a session that never started running.
    ///
    /// Returns false if the session already left `Loading`.
    pub fn abort(&self) -> bool {
        let _guard = self.lock();
        self.abort_loading()
    }

    fn abort_loading(&self) -> bool {
        let aborted = self.transition(SessionPhase::Loading, SessionPhase::Terminated);
        if aborted {
            log::info!("session {} aborted while loading", self.id);
        }
        aborted
    }

    /// Count one second down. Reaching zero claims termination as `TimeUp`.
    pub fn tick(&self) -> Tick {
        let mut guard = self.lock();
        if !self.is_running() {
            return Tick::Idle;
        }
        let Some(state) = guard.as_mut() else {
            return Tick::Idle;
        };

        state.remaining_secs = state.remaining_secs.saturating_sub(1);
        if state.remaining_secs > 0 {
            return Tick::Remaining(state.remaining_secs);
        }
        match self.claim(TerminationReason::TimeUp) {
            Some(claim) => Tick::TimedOut(claim),
            None => Tick::Idle,
        }
    }

    /// Score the frozen answers and move to `Terminated`.
    ///
    /// Consumes the claim, so this runs at most once per session.
    ///
    /// # Errors
    ///
    /// Returns `SessionInvariantViolation` if the claim belongs to another
    /// session or the session holds no state.
    pub fn finalize(
        &self,
        claim: TerminationClaim,
    ) -> Result<TerminatedSession, SessionInvariantViolation> {
        let mut guard = self.lock();
        if claim.session_id != self.id {
            return Err(SessionInvariantViolation::ForeignClaim.raise());
        }
        if self.phase() != SessionPhase::Terminating {
            return Err(SessionInvariantViolation::NotTerminating.raise());
        }
        let Some(state) = guard.take() else {
            return Err(SessionInvariantViolation::NotLoaded.raise());
        };
        self.phase
            .store(SessionPhase::Terminated as u8, Ordering::Release);
        drop(guard);

        let score = scoring::score(&state.questions, &state.selections);
        let answers = scoring::answer_records(&state.questions, &state.selections);
        let elapsed = self
            .config
            .duration_secs()
            .saturating_sub(state.remaining_secs);

        Ok(TerminatedSession {
            reason: claim.reason,
            outcome: ExamOutcome::new(score, elapsed),
            answers,
            questions_presented: u32::try_from(state.questions.len()).unwrap_or(u32::MAX),
        })
    }

    /// Index of the question on screen, while running.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.lock().as_ref().map(|s| s.position)
    }

    #[must_use]
    pub fn question_count(&self) -> Option<usize> {
        self.lock().as_ref().map(|s| s.questions.len())
    }

    #[must_use]
    pub fn current_question(&self) -> Option<Question> {
        self.lock()
            .as_ref()
            .and_then(|s| s.questions.get(s.position).cloned())
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.lock().as_ref().map(|s| s.remaining_secs)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.lock().as_ref().map_or(0, |s| s.selections.len())
    }

    #[must_use]
    pub fn selection(&self, question: QuestionId) -> Option<OptionId> {
        self.lock()
            .as_ref()
            .and_then(|s| s.selections.get(question).cloned())
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("position", &self.position())
            .field("remaining_secs", &self.remaining_secs())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerOption, Percentage, SubjectId};
    use std::sync::{Arc, Barrier};

    fn question(id: u64, correct: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            SubjectId::new(1),
            format!("Q{id}"),
            vec![
                AnswerOption::new("A", "a"),
                AnswerOption::new("B", "b"),
                AnswerOption::new("C", "c"),
            ],
            OptionId::new(correct),
        )
        .unwrap()
    }

    fn running(count: u64, minutes: u32) -> ExamSession {
        let config = SessionConfig::new([SubjectId::new(1)], 10, minutes, false).unwrap();
        let session = ExamSession::new(config);
        session
            .begin((1..=count).map(|i| question(i, "A")).collect())
            .unwrap();
        session
    }

    fn pick(session: &ExamSession, q: u64, o: &str) -> bool {
        session.select_option(QuestionId::new(q), OptionId::new(o))
    }

    #[test]
    fn begin_moves_loading_to_running() {
        let config = SessionConfig::new([SubjectId::new(1)], 3, 2, false).unwrap();
        let session = ExamSession::new(config);
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert!(session.current_question().is_none());

        session.begin(vec![question(1, "A")]).unwrap();
        assert_eq!(session.phase(), SessionPhase::Running);
        assert_eq!(session.position(), Some(0));
        assert_eq!(session.remaining_secs(), Some(120));
        assert_eq!(session.current_question().unwrap().id(), QuestionId::new(1));
    }

    #[test]
    fn terminate_while_loading_aborts_without_claim() {
        let config = SessionConfig::new([SubjectId::new(1)], 3, 1, false).unwrap();
        let session = ExamSession::new(config);

        assert!(session.terminate(TerminationReason::ManualExit).is_none());
        assert_eq!(session.phase(), SessionPhase::Terminated);

        let err = session.begin(vec![question(1, "A")]).unwrap_err();
        assert!(matches!(err, ExamError::Aborted));
        assert!(session.remaining_secs().is_none());
    }

    #[test]
    fn selections_overwrite_and_ignore_foreign_questions() {
        let session = running(2, 1);
        assert!(pick(&session, 1, "B"));
        assert!(pick(&session, 1, "A"));
        assert!(!pick(&session, 99, "A"));
        assert_eq!(session.selection(QuestionId::new(1)), Some(OptionId::new("A")));
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn advance_moves_then_finishes_on_last_question() {
        let session = running(3, 1);
        assert_eq!(session.advance(), Advance::Moved { position: 1 });
        assert_eq!(session.advance(), Advance::Moved { position: 2 });

        let Advance::Finished(claim) = session.advance() else {
            panic!("expected completion claim");
        };
        assert_eq!(claim.reason(), TerminationReason::Completed);
        assert_eq!(session.phase(), SessionPhase::Terminating);

        // Input after the claim is a no-op.
        assert_eq!(session.advance(), Advance::Ignored);
        assert!(!pick(&session, 1, "A"));
        assert!(session.terminate(TerminationReason::ManualExit).is_none());
    }

    #[test]
    fn manual_exit_scores_partial_answers() {
        let session = running(3, 1);
        pick(&session, 1, "A");
        session.advance();
        pick(&session, 2, "A");
        session.advance();

        let claim = session.terminate(TerminationReason::ManualExit).unwrap();
        let done = session.finalize(claim).unwrap();

        assert_eq!(done.reason, TerminationReason::ManualExit);
        assert_eq!(
            (
                done.outcome.correct(),
                done.outcome.incorrect(),
                done.outcome.unanswered()
            ),
            (2, 0, 1)
        );
        assert_eq!(done.outcome.percentage().to_string(), "66.67");
        assert_eq!(done.outcome.elapsed_secs(), 0);
        assert_eq!(done.answers.len(), 2);
        assert_eq!(done.questions_presented, 3);
        assert_eq!(session.phase(), SessionPhase::Terminated);
    }

    #[test]
    fn timeout_claims_exactly_once_and_blocks_late_advance() {
        let session = running(1, 1);
        for remaining in (1..60).rev() {
            assert_eq!(session.tick(), Tick::Remaining(remaining));
        }

        let Tick::TimedOut(claim) = session.tick() else {
            panic!("expected timeout claim");
        };
        // Same logical step: the user also advances past the last question.
        assert_eq!(session.advance(), Advance::Ignored);
        assert_eq!(session.tick(), Tick::Idle);

        let done = session.finalize(claim).unwrap();
        assert_eq!(done.reason, TerminationReason::TimeUp);
        assert_eq!(done.outcome.elapsed_secs(), 60);
        assert_eq!(done.outcome.percentage(), Percentage::ZERO);
        assert_eq!(session.remaining_secs(), None);
    }

    #[test]
    fn advance_wins_when_it_claims_before_the_last_tick() {
        let session = running(1, 1);
        for _ in 0..59 {
            session.tick();
        }
        let Advance::Finished(claim) = session.advance() else {
            panic!("expected completion claim");
        };
        assert_eq!(session.tick(), Tick::Idle);
        let done = session.finalize(claim).unwrap();
        assert_eq!(done.reason, TerminationReason::Completed);
        assert_eq!(done.outcome.elapsed_secs(), 59);
    }

    #[test]
    fn concurrent_triggers_produce_one_claim() {
        for _ in 0..50 {
            let session = Arc::new(running(1, 1));
            for _ in 0..59 {
                session.tick();
            }

            let barrier = Arc::new(Barrier::new(3));
            let handles: Vec<_> = (0..3)
                .map(|i| {
                    let session = Arc::clone(&session);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        match i {
                            0 => matches!(session.tick(), Tick::TimedOut(_)),
                            1 => matches!(session.advance(), Advance::Finished(_)),
                            _ => session.terminate(TerminationReason::ManualExit).is_some(),
                        }
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
            assert_eq!(session.phase(), SessionPhase::Terminating);
        }
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "different session"))]
    fn claim_from_another_session_is_rejected() {
        let first = running(1, 1);
        let second = running(1, 1);
        let claim = second.terminate(TerminationReason::ManualExit).unwrap();
        let _ = first.terminate(TerminationReason::ManualExit).unwrap();

        let err = first.finalize(claim).unwrap_err();
        assert_eq!(err, SessionInvariantViolation::ForeignClaim);
    }
}
