//! Run stream client.
//!
//! One client serves one thread. It enforces the protocol's cardinality
//! rule: at most one live event sequence per thread. A sequence stays
//! "live" until it is fully consumed or dropped; opening another while one
//! is live is a programmer error (`ConflictingRun`), not a queueing
//! request. Sequences are not restartable; to continue a run after tool
//! outputs, `resume` opens a new sequence for the same logical run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::protocol::{RunEvent, ToolOutput};

use super::service::EventReceiver;
use super::{RunService, StreamError};

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Remote assistant to execute against the thread.
    pub assistant_id: String,
}

/// Client for opening and resuming run streams on one thread.
pub struct RunStreamClient {
    service: Arc<dyn RunService>,
    active: Arc<AtomicBool>,
}

impl RunStreamClient {
    pub fn new(service: Arc<dyn RunService>) -> Self {
        Self {
            service,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Post the user's message and begin a new run, returning its ordered
    /// event sequence.
    pub async fn open(
        &self,
        thread_id: &str,
        user_text: &str,
        config: &RunConfig,
    ) -> Result<EventSequence, StreamError> {
        let guard = self.acquire()?;
        debug!(thread_id, "Opening run stream");
        self.service.add_user_message(thread_id, user_text).await?;
        let rx = self.service.stream_run(thread_id, config).await?;
        Ok(EventSequence::new(rx, guard))
    }

    /// Submit the complete tool output batch for a paused run and return
    /// the event sequence continuing the same logical run.
    pub async fn resume(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventSequence, StreamError> {
        let guard = self.acquire()?;
        debug!(thread_id, run_id, outputs = outputs.len(), "Resuming run");
        let rx = self
            .service
            .submit_tool_outputs(thread_id, run_id, outputs)
            .await?;
        Ok(EventSequence::new(rx, guard))
    }

    /// Whether a sequence is currently live on this thread.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<ActiveGuard, StreamError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StreamError::ConflictingRun);
        }
        Ok(ActiveGuard {
            flag: self.active.clone(),
        })
    }
}

/// Marks the thread's stream slot occupied for the guard's lifetime.
#[derive(Debug)]
struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A live, ordered sequence of run events.
///
/// Consumed once, front to back; `next` returning `None` means the remote
/// stream ended. Dropping the sequence frees the thread's stream slot.
#[derive(Debug)]
pub struct EventSequence {
    rx: EventReceiver,
    _guard: ActiveGuard,
}

impl EventSequence {
    fn new(rx: EventReceiver, guard: ActiveGuard) -> Self {
        Self { rx, _guard: guard }
    }

    /// The next event in arrival order, or `None` once the stream ends.
    pub async fn next(&mut self) -> Option<Result<RunEvent, StreamError>> {
        self.rx.recv().await
    }
}
