//! Record merge & persist
//!
//! `ProblemSession` owns the single in-memory "current" copy of an open
//! problem. Every mutation, from any section's autosave, the work timer,
//! or the reminder scheduler, funnels through `persist`, which holds the
//! session lock across merge-and-write. That gives all persists for one
//! open problem a total order: each merge computes from the previous
//! persist's result, never from a stale base, so two sections saving in
//! the same scheduling turn cannot clobber each other.

use crate::database::{Problem, ProblemPatch, Store};
use crate::error::Result;
use tokio::sync::Mutex;

pub struct ProblemSession {
    id: String,
    store: Store,
    current: Mutex<Problem>,
}

impl ProblemSession {
    pub fn new(store: Store, problem: Problem) -> Self {
        Self {
            id: problem.id.clone(),
            store,
            current: Mutex::new(problem),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A copy of the current record as of the last completed persist.
    pub async fn snapshot(&self) -> Problem {
        self.current.lock().await.clone()
    }

    /// Merge `patch` into the current record and write the whole merged
    /// record back. The lock is held until the stored result has replaced
    /// the current copy, which is what serializes concurrent callers.
    pub async fn persist(&self, patch: ProblemPatch) -> Result<Problem> {
        let mut current = self.current.lock().await;

        let mut merged = current.clone();
        patch.apply(&mut merged);

        let stored = self.store.put(&merged).await?;
        tracing::debug!("Persisted problem: {}", stored.id);

        *current = stored.clone();
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewProblem;
    use std::sync::Arc;

    async fn open_session() -> (Store, Arc<ProblemSession>) {
        let store = Store::new();
        store.open_in_memory().await.unwrap();

        let problem = store
            .add(NewProblem::with_title("Session", None))
            .await
            .unwrap();
        let session = Arc::new(ProblemSession::new(store.clone(), problem));

        (store, session)
    }

    #[tokio::test]
    async fn test_persist_updates_current() {
        let (store, session) = open_session().await;

        let stored = session
            .persist(ProblemPatch {
                scratch_pad: Some("notes".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(stored.scratch_pad, "notes");
        assert_eq!(session.snapshot().await.scratch_pad, "notes");
        assert_eq!(
            store.get(session.id()).await.unwrap().scratch_pad,
            "notes"
        );
    }

    #[tokio::test]
    async fn test_concurrent_persists_do_not_clobber() {
        let (store, session) = open_session().await;

        // Two sections' timers elapsing in the same scheduling turn.
        let a = session.persist(ProblemPatch {
            observations: Some(vec!["obs".to_string()]),
            ..Default::default()
        });
        let b = session.persist(ProblemPatch {
            questions: Some(vec!["why".to_string()]),
            ..Default::default()
        });

        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        let stored = store.get(session.id()).await.unwrap();
        assert_eq!(stored.observations, vec!["obs".to_string()]);
        assert_eq!(stored.questions, vec!["why".to_string()]);
    }

    #[tokio::test]
    async fn test_interleaved_persists_observe_total_order() {
        let (store, session) = open_session().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session
                    .persist(ProblemPatch {
                        time_spent: Some(i),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever order the tasks ran in, the stored record matches the
        // session's current copy: no write was computed from a stale base.
        let stored = store.get(session.id()).await.unwrap();
        assert_eq!(stored.time_spent, session.snapshot().await.time_spent);
        assert_eq!(store.write_count(), 10);
    }
}
