//! Database models
//!
//! Rust structs representing tracked problems and the partial updates
//! applied to them. Wire form is camelCase to match the export format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked problem with its note sections, work timer and reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Persisted form holds only non-empty, trimmed blocks.
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub approaches: Vec<String>,
    /// Opaque rich-text markup.
    #[serde(default)]
    pub known_facts: String,
    #[serde(default)]
    pub scratch_pad: String,
    #[serde(default)]
    pub questions: Vec<String>,
    /// Seconds of work while the problem was open and unsolved.
    #[serde(default)]
    pub time_spent: i64,
    #[serde(default)]
    pub solved: bool,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
    /// True once the due notification fired for the current reminder value.
    #[serde(default)]
    pub reminder_notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// A reminder is due when armed, not yet notified, and at or past `now`.
    pub fn reminder_due(&self, now: DateTime<Utc>) -> bool {
        match self.reminder {
            Some(at) => !self.reminder_notified && at <= now,
            None => false,
        }
    }
}

/// Payload for adding a problem. Also the import shape: incoming `id`
/// and unknown fields are ignored, missing fields default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProblem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub approaches: Vec<String>,
    #[serde(default)]
    pub known_facts: String,
    #[serde(default)]
    pub scratch_pad: String,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub time_spent: i64,
    #[serde(default)]
    pub solved: bool,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_notified: bool,
}

impl NewProblem {
    /// A freshly added problem: empty sections, timer at zero, no reminder.
    pub fn with_title(title: impl Into<String>, url: Option<String>) -> Self {
        Self {
            title: title.into(),
            url,
            ..Default::default()
        }
    }
}

/// A partial field update applied to the current record by the serialized
/// merge-and-persist path. `None` leaves a field untouched; nullable fields
/// use a second Option so "clear" and "leave alone" stay distinct.
#[derive(Debug, Clone, Default)]
pub struct ProblemPatch {
    pub title: Option<String>,
    pub url: Option<Option<String>>,
    pub observations: Option<Vec<String>>,
    pub approaches: Option<Vec<String>>,
    pub known_facts: Option<String>,
    pub scratch_pad: Option<String>,
    pub questions: Option<Vec<String>>,
    pub time_spent: Option<i64>,
    pub solved: Option<bool>,
    pub reminder: Option<Option<DateTime<Utc>>>,
    pub reminder_notified: Option<bool>,
}

impl ProblemPatch {
    /// Merge this patch into `problem` (last writer wins per field).
    ///
    /// Invariant: any change of `reminder` resets `reminder_notified`,
    /// so a rescheduled reminder fires again. An explicit
    /// `reminder_notified` update is applied after that reset, which lets
    /// the scheduler mark delivery without touching the reminder itself.
    pub fn apply(&self, problem: &mut Problem) {
        if let Some(title) = &self.title {
            problem.title = title.clone();
        }
        if let Some(url) = &self.url {
            problem.url = url.clone();
        }
        if let Some(observations) = &self.observations {
            problem.observations = observations.clone();
        }
        if let Some(approaches) = &self.approaches {
            problem.approaches = approaches.clone();
        }
        if let Some(known_facts) = &self.known_facts {
            problem.known_facts = known_facts.clone();
        }
        if let Some(scratch_pad) = &self.scratch_pad {
            problem.scratch_pad = scratch_pad.clone();
        }
        if let Some(questions) = &self.questions {
            problem.questions = questions.clone();
        }
        if let Some(time_spent) = self.time_spent {
            problem.time_spent = time_spent;
        }
        if let Some(solved) = self.solved {
            problem.solved = solved;
        }
        if let Some(reminder) = self.reminder {
            if reminder != problem.reminder {
                problem.reminder_notified = false;
            }
            problem.reminder = reminder;
        }
        if let Some(notified) = self.reminder_notified {
            problem.reminder_notified = notified;
        }
    }
}
