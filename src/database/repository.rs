//! Repository layer for database operations
//!
//! Typed CRUD over the problems table. List sections are stored as
//! JSON-encoded TEXT columns; conversion to and from `Problem` happens
//! here so callers only ever see the typed model.

use super::models::{NewProblem, Problem};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Raw row shape; block lists are JSON strings until decoded.
#[derive(Debug, FromRow)]
struct ProblemRow {
    id: String,
    title: String,
    url: Option<String>,
    observations: String,
    approaches: String,
    known_facts: String,
    scratch_pad: String,
    questions: String,
    time_spent: i64,
    solved: bool,
    reminder: Option<DateTime<Utc>>,
    reminder_notified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProblemRow {
    fn into_problem(self) -> Result<Problem> {
        Ok(Problem {
            id: self.id,
            title: self.title,
            url: self.url,
            observations: serde_json::from_str(&self.observations)?,
            approaches: serde_json::from_str(&self.approaches)?,
            known_facts: self.known_facts,
            scratch_pad: self.scratch_pad,
            questions: serde_json::from_str(&self.questions)?,
            time_spent: self.time_spent,
            solved: self.solved,
            reminder: self.reminder,
            reminder_notified: self.reminder_notified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn encode_blocks(blocks: &[String]) -> Result<String> {
    Ok(serde_json::to_string(blocks)?)
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a new problem under a fresh id.
    pub async fn add_problem(&self, new: NewProblem) -> Result<Problem> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, ProblemRow>(
            r#"
            INSERT INTO problems (
                id, title, url, observations, approaches, known_facts,
                scratch_pad, questions, time_spent, solved, reminder,
                reminder_notified, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.url)
        .bind(encode_blocks(&new.observations)?)
        .bind(encode_blocks(&new.approaches)?)
        .bind(&new.known_facts)
        .bind(&new.scratch_pad)
        .bind(encode_blocks(&new.questions)?)
        .bind(new.time_spent)
        .bind(new.solved)
        .bind(new.reminder)
        .bind(new.reminder_notified)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Added problem: {}", id);
        row.into_problem()
    }

    /// Get a problem by ID
    pub async fn get_problem(&self, id: &str) -> Result<Problem> {
        let row = sqlx::query_as::<_, ProblemRow>(
            r#"
            SELECT * FROM problems WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::ProblemNotFound(id.to_string()))?;

        row.into_problem()
    }

    /// List all problems, most recently updated first.
    pub async fn list_problems(&self) -> Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, ProblemRow>(
            r#"
            SELECT * FROM problems ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProblemRow::into_problem).collect()
    }

    /// Whole-record upsert: creates on an absent id, overwrites on a
    /// present one. `updated_at` is stamped here; `created_at` is kept.
    pub async fn put_problem(&self, problem: &Problem) -> Result<Problem> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, ProblemRow>(
            r#"
            INSERT INTO problems (
                id, title, url, observations, approaches, known_facts,
                scratch_pad, questions, time_spent, solved, reminder,
                reminder_notified, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                observations = excluded.observations,
                approaches = excluded.approaches,
                known_facts = excluded.known_facts,
                scratch_pad = excluded.scratch_pad,
                questions = excluded.questions,
                time_spent = excluded.time_spent,
                solved = excluded.solved,
                reminder = excluded.reminder,
                reminder_notified = excluded.reminder_notified,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&problem.id)
        .bind(&problem.title)
        .bind(&problem.url)
        .bind(encode_blocks(&problem.observations)?)
        .bind(encode_blocks(&problem.approaches)?)
        .bind(&problem.known_facts)
        .bind(&problem.scratch_pad)
        .bind(encode_blocks(&problem.questions)?)
        .bind(problem.time_spent)
        .bind(problem.solved)
        .bind(problem.reminder)
        .bind(problem.reminder_notified)
        .bind(problem.created_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Put problem: {}", problem.id);
        row.into_problem()
    }

    /// Hard delete a problem (no tombstone).
    pub async fn delete_problem(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM problems WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ProblemNotFound(id.to_string()));
        }

        tracing::debug!("Deleted problem: {}", id);
        Ok(())
    }
}
