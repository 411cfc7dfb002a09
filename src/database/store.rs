//! Record store adapter
//!
//! A thin handle over the repository that callers can hold before the
//! underlying database has finished initializing. Every operation on an
//! unready store fails with `StoreUnavailable`; callers defer their work
//! until `open` has completed rather than crash. This mirrors the
//! startup window where background tasks are already running while the
//! store is still opening.

use super::models::{NewProblem, Problem};
use super::{create_pool, initialize_database, Repository};
use crate::error::{AppError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct Store {
    repo: Arc<RwLock<Option<Repository>>>,
    writes: Arc<AtomicU64>,
}

impl Store {
    /// Create an unready store. Operations fail with `StoreUnavailable`
    /// until `open` (or `open_in_memory`) completes.
    pub fn new() -> Self {
        Self {
            repo: Arc::new(RwLock::new(None)),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the on-disk database and attach the repository.
    pub async fn open(&self, db_path: &Path) -> Result<()> {
        let pool = create_pool(db_path).await?;
        let mut repo = self.repo.write().await;
        *repo = Some(Repository::new(pool));
        tracing::info!("Record store ready");
        Ok(())
    }

    /// Open an in-memory database, primarily for tests and ephemeral
    /// sessions. A single connection keeps the database alive and shared.
    pub async fn open_in_memory(&self) -> Result<()> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        initialize_database(&pool).await?;

        let mut repo = self.repo.write().await;
        *repo = Some(Repository::new(pool));
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        self.repo.read().await.is_some()
    }

    async fn repo(&self) -> Result<Repository> {
        self.repo
            .read()
            .await
            .clone()
            .ok_or(AppError::StoreUnavailable)
    }

    pub async fn add(&self, new: NewProblem) -> Result<Problem> {
        self.repo().await?.add_problem(new).await
    }

    pub async fn get(&self, id: &str) -> Result<Problem> {
        self.repo().await?.get_problem(id).await
    }

    /// Whole-record upsert through the adapter. Counts as one write.
    pub async fn put(&self, problem: &Problem) -> Result<Problem> {
        let repo = self.repo().await?;
        let stored = repo.put_problem(problem).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repo().await?.delete_problem(id).await
    }

    pub async fn list_all(&self) -> Result<Vec<Problem>> {
        self.repo().await?.list_problems().await
    }

    /// Number of put operations issued so far, for diagnostics and tests.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
