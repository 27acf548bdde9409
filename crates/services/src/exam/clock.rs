use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use super::session::{ExamSession, Tick, TerminationClaim};

/// Default countdown step: one second per tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background countdown bound to one session.
///
/// Ticks the session once per period and hands a timeout claim to the
/// owner through a oneshot channel. Stopping (or dropping) aborts the task.
#[derive(Debug)]
pub struct SessionClock {
    handle: Option<JoinHandle<()>>,
}

impl SessionClock {
    /// Spawn the ticker. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(
        session: Arc<ExamSession>,
        period: Duration,
        timeout_tx: oneshot::Sender<TerminationClaim>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match session.tick() {
                    Tick::Remaining(secs) => {
                        log::debug!("session {} has {secs}s left", session.id());
                    }
                    Tick::TimedOut(claim) => {
                        log::info!("session {} ran out of time", session.id());
                        if timeout_tx.send(claim).is_err() {
                            log::warn!(
                                "session {} timed out with nobody listening",
                                session.id()
                            );
                        }
                        return;
                    }
                    Tick::Idle => return,
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Abort the ticker. Later calls do nothing.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.stop();
    }
}
