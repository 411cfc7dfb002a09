//! Work timer
//!
//! Per-open-problem elapsed-time counter. While running, a one-second
//! tick increments the counter and persists `{time_spent}` through the
//! session's serialized path, so timer writes can never clobber a
//! concurrent section save. The tick task is aborted on stop and on
//! drop, covering every exit path.

use crate::config::WORK_TIMER_TICK_SECS;
use crate::database::{Problem, ProblemPatch};
use crate::error::Result;
use crate::services::session::ProblemSession;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct WorkTimer {
    elapsed: Arc<AtomicI64>,
    running: Arc<AtomicBool>,
    session: Arc<ProblemSession>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl WorkTimer {
    /// Start the tick task. `running` is false for already-solved
    /// problems; the task still ticks but skips paused seconds.
    pub fn start(session: Arc<ProblemSession>, initial_seconds: i64, running: bool) -> Self {
        let elapsed = Arc::new(AtomicI64::new(initial_seconds));
        let running_flag = Arc::new(AtomicBool::new(running));

        let task = tokio::spawn({
            let elapsed = Arc::clone(&elapsed);
            let running = Arc::clone(&running_flag);
            let session = Arc::clone(&session);
            async move {
                let mut interval =
                    tokio::time::interval(Duration::from_secs(WORK_TIMER_TICK_SECS));
                // The first tick completes immediately; consume it so the
                // counter advances one full period after start.
                interval.tick().await;

                loop {
                    interval.tick().await;

                    if !running.load(Ordering::Relaxed) {
                        continue;
                    }

                    let seconds = elapsed.fetch_add(1, Ordering::Relaxed) + 1;
                    let patch = ProblemPatch {
                        time_spent: Some(seconds),
                        ..Default::default()
                    };
                    if let Err(e) = session.persist(patch).await {
                        tracing::error!(
                            "Failed to persist time for {}: {}",
                            session.id(),
                            e
                        );
                    }
                }
            }
        });

        Self {
            elapsed,
            running: running_flag,
            session,
            tick_task: Mutex::new(Some(task)),
        }
    }

    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop counting without touching the solved flag.
    pub fn pause(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    /// Zero the counter and persist immediately.
    pub async fn reset(&self) -> Result<Problem> {
        self.elapsed.store(0, Ordering::Relaxed);
        self.session
            .persist(ProblemPatch {
                time_spent: Some(0),
                ..Default::default()
            })
            .await
    }

    /// Abort the tick task and release its clock resource.
    pub fn stop(&self) {
        let task = self
            .tick_task
            .lock()
            .expect("work timer lock poisoned")
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for WorkTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
