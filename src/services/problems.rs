//! Problem service
//!
//! High-level operations over the record store, plus the per-open-problem
//! coordination: each `open` creates one `ProblemSession` (the single
//! owner of that problem's current record) and a work timer, and the
//! service routes out-of-view mutations through the open session when one
//! exists so every write path shares the same serialized merge-and-persist.

use crate::database::{NewProblem, Problem, ProblemPatch, Store};
use crate::error::{AppError, Result};
use crate::services::autosave::{BlockAutosave, ListSection, TextAutosave, TextSection};
use crate::services::session::ProblemSession;
use crate::services::timer::WorkTimer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};

/// Events foreground views subscribe to so cached lists stay fresh.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ReminderTriggered { problem_id: String, title: String },
}

/// Filter for the problem list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemFilter {
    All,
    Solved,
    Unsolved,
}

/// Aggregate numbers behind the statistics view. Rendering is someone
/// else's job; this is just the arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total: usize,
    pub solved: usize,
    pub unsolved: usize,
    pub total_time_spent: i64,
    pub average_time_spent: i64,
}

/// Format a second count as hh:mm:ss.
pub fn format_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[derive(Clone)]
pub struct ProblemService {
    store: Store,
    sessions: Arc<Mutex<HashMap<String, Weak<ProblemSession>>>>,
    events: broadcast::Sender<EngineEvent>,
}

impl ProblemService {
    pub fn new(store: Store) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Create a new problem with empty sections.
    pub async fn create(&self, title: &str, url: Option<String>) -> Result<Problem> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidProblem(
                "title must not be empty".to_string(),
            ));
        }
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        tracing::info!("Creating new problem: {}", title);
        self.store.add(NewProblem::with_title(title, url)).await
    }

    pub async fn get(&self, id: &str) -> Result<Problem> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Problem>> {
        self.store.list_all().await
    }

    pub async fn list_filtered(&self, filter: ProblemFilter) -> Result<Vec<Problem>> {
        let problems = self.list().await?;
        Ok(problems
            .into_iter()
            .filter(|p| match filter {
                ProblemFilter::All => true,
                ProblemFilter::Solved => p.solved,
                ProblemFilter::Unsolved => !p.solved,
            })
            .collect())
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        let problems = self.list().await?;

        let total = problems.len();
        let solved = problems.iter().filter(|p| p.solved).count();
        let total_time_spent: i64 = problems.iter().map(|p| p.time_spent).sum();
        let average_time_spent = if total > 0 {
            total_time_spent / total as i64
        } else {
            0
        };

        Ok(Statistics {
            total,
            solved,
            unsolved: total - solved,
            total_time_spent,
            average_time_spent,
        })
    }

    /// Hard delete. Any open session is evicted first so later mutations
    /// cannot route through it.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.lock().await.remove(id);
        tracing::info!("Deleting problem: {}", id);
        self.store.delete(id).await
    }

    async fn open_session(&self, id: &str) -> Option<Arc<ProblemSession>> {
        self.sessions.lock().await.get(id).and_then(Weak::upgrade)
    }

    /// Latest known copy: the open session's current record when one
    /// exists, the stored record otherwise.
    pub async fn latest(&self, id: &str) -> Result<Problem> {
        match self.open_session(id).await {
            Some(session) => Ok(session.snapshot().await),
            None => self.store.get(id).await,
        }
    }

    /// Apply a partial update through the serialized persist path: the
    /// open session when one exists, read-merge-write otherwise.
    pub async fn apply_patch(&self, id: &str, patch: ProblemPatch) -> Result<Problem> {
        match self.open_session(id).await {
            Some(session) => session.persist(patch).await,
            None => {
                let mut problem = self.store.get(id).await?;
                patch.apply(&mut problem);
                self.store.put(&problem).await
            }
        }
    }

    /// Open a problem for editing: one session, one work timer. The
    /// timer runs unless the problem is already solved.
    pub async fn open(&self, id: &str) -> Result<OpenProblem> {
        let problem = self.store.get(id).await?;
        let session = Arc::new(ProblemSession::new(self.store.clone(), problem.clone()));

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, weak| weak.strong_count() > 0);
        sessions.insert(id.to_string(), Arc::downgrade(&session));
        drop(sessions);

        let timer = WorkTimer::start(Arc::clone(&session), problem.time_spent, !problem.solved);

        tracing::info!("Opened problem: {}", id);
        Ok(OpenProblem {
            session,
            timer,
            autosaves: std::sync::Mutex::new(Vec::new()),
        })
    }
}

enum SectionAutosave {
    Blocks(BlockAutosave),
    Text(TextAutosave),
}

/// One open problem view: the session, its work timer, and every
/// autosave handle created through it. `close` flushes the autosaves and
/// stops the timer; `abandon` cancels pending timers without emitting.
pub struct OpenProblem {
    session: Arc<ProblemSession>,
    timer: WorkTimer,
    autosaves: std::sync::Mutex<Vec<SectionAutosave>>,
}

impl OpenProblem {
    pub fn session(&self) -> Arc<ProblemSession> {
        Arc::clone(&self.session)
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    pub fn timer(&self) -> &WorkTimer {
        &self.timer
    }

    pub async fn snapshot(&self) -> Problem {
        self.session.snapshot().await
    }

    /// Autosave handle for a block-list section, seeded from the current
    /// record.
    pub async fn block_autosave(&self, section: ListSection) -> BlockAutosave {
        let stored = section.stored_blocks(&self.session.snapshot().await);
        let autosave = BlockAutosave::new(section, Arc::clone(&self.session), stored);
        self.autosaves
            .lock()
            .expect("autosave registry lock poisoned")
            .push(SectionAutosave::Blocks(autosave.clone()));
        autosave
    }

    /// Autosave handle for a long-form text section.
    pub async fn text_autosave(&self, section: TextSection) -> TextAutosave {
        let stored = section.stored_text(&self.session.snapshot().await);
        let autosave = TextAutosave::new(section, Arc::clone(&self.session), stored);
        self.autosaves
            .lock()
            .expect("autosave registry lock poisoned")
            .push(SectionAutosave::Text(autosave.clone()));
        autosave
    }

    pub async fn set_title(&self, title: &str) -> Result<Problem> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidProblem(
                "title must not be empty".to_string(),
            ));
        }
        self.session
            .persist(ProblemPatch {
                title: Some(title.to_string()),
                ..Default::default()
            })
            .await
    }

    pub async fn set_url(&self, url: Option<String>) -> Result<Problem> {
        self.session
            .persist(ProblemPatch {
                url: Some(url),
                ..Default::default()
            })
            .await
    }

    /// Toggling solved wires the timer: solving stops the count,
    /// unsolving resumes it.
    pub async fn set_solved(&self, solved: bool) -> Result<Problem> {
        if solved {
            // Stop counting before the write so no tick lands in between.
            self.timer.pause();
        }

        let stored = self
            .session
            .persist(ProblemPatch {
                solved: Some(solved),
                ..Default::default()
            })
            .await?;

        if !solved {
            self.timer.resume();
        }
        Ok(stored)
    }

    /// Arm, move or clear the reminder. Changing it re-arms delivery
    /// (`reminder_notified` resets in the merge).
    pub async fn set_reminder(&self, at: Option<DateTime<Utc>>) -> Result<Problem> {
        self.session
            .persist(ProblemPatch {
                reminder: Some(at),
                ..Default::default()
            })
            .await
    }

    /// Tear down with save: flush every registered autosave, then stop
    /// the timer. Flush failures are logged inside the autosaves; the
    /// teardown itself always completes.
    pub async fn close(self) {
        let autosaves: Vec<SectionAutosave> = {
            let mut registry = self
                .autosaves
                .lock()
                .expect("autosave registry lock poisoned");
            registry.drain(..).collect()
        };
        for autosave in autosaves {
            match autosave {
                SectionAutosave::Blocks(a) => a.flush().await,
                SectionAutosave::Text(a) => a.flush().await,
            }
        }
        self.timer.stop();
        tracing::info!("Closed problem: {}", self.session.id());
    }

    /// Tear down without save: cancel pending autosave timers and stop
    /// the timer. Used when the record is being externally replaced.
    pub fn abandon(self) {
        let registry = self
            .autosaves
            .lock()
            .expect("autosave registry lock poisoned");
        for autosave in registry.iter() {
            match autosave {
                SectionAutosave::Blocks(a) => a.cancel(),
                SectionAutosave::Text(a) => a.cancel(),
            }
        }
        drop(registry);
        self.timer.stop();
        tracing::info!("Abandoned problem view: {}", self.session.id());
    }
}
