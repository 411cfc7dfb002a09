//! Debounced section autosave
//!
//! One autosave instance is bound to one editable section of one open
//! problem. Edits land in a shared buffer synchronously; a single
//! rescheduled timer emits the buffer's value after an idle delay. The
//! emitted value is always read at emission time from the live buffer,
//! never captured when the timer was scheduled, so a burst of edits
//! coalesces into one save carrying the final value.
//!
//! Block-list sections (observations, approaches, questions) keep a
//! trailing blank editing slot in the buffer; emission trims each block
//! and drops empties, so the persisted form never contains the slot.

use crate::config::{
    LIST_AUTOSAVE_DELAY_MS, MAX_AUTOSAVE_DELAY_MS, MIN_AUTOSAVE_DELAY_MS, TEXT_AUTOSAVE_DELAY_MS,
};
use crate::database::{Problem, ProblemPatch};
use crate::services::session::ProblemSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sections edited as an ordered list of text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSection {
    Observations,
    Approaches,
    Questions,
}

impl ListSection {
    pub fn stored_blocks(self, problem: &Problem) -> Vec<String> {
        match self {
            ListSection::Observations => problem.observations.clone(),
            ListSection::Approaches => problem.approaches.clone(),
            ListSection::Questions => problem.questions.clone(),
        }
    }

    fn patch(self, blocks: Vec<String>) -> ProblemPatch {
        match self {
            ListSection::Observations => ProblemPatch {
                observations: Some(blocks),
                ..Default::default()
            },
            ListSection::Approaches => ProblemPatch {
                approaches: Some(blocks),
                ..Default::default()
            },
            ListSection::Questions => ProblemPatch {
                questions: Some(blocks),
                ..Default::default()
            },
        }
    }
}

/// Sections edited as one long-form text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSection {
    KnownFacts,
    ScratchPad,
}

impl TextSection {
    pub fn stored_text(self, problem: &Problem) -> String {
        match self {
            TextSection::KnownFacts => problem.known_facts.clone(),
            TextSection::ScratchPad => problem.scratch_pad.clone(),
        }
    }

    fn patch(self, text: String) -> ProblemPatch {
        match self {
            TextSection::KnownFacts => ProblemPatch {
                known_facts: Some(text),
                ..Default::default()
            },
            TextSection::ScratchPad => ProblemPatch {
                scratch_pad: Some(text),
                ..Default::default()
            },
        }
    }
}

fn clamp_delay(delay_ms: u64) -> Duration {
    Duration::from_millis(delay_ms.clamp(MIN_AUTOSAVE_DELAY_MS, MAX_AUTOSAVE_DELAY_MS))
}

/// Trailing-edge debounce state: the single pending timer task.
struct Debounce {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debounce {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay: clamp_delay(delay_ms),
            pending: Mutex::new(None),
        }
    }

    /// Replace the pending timer, aborting the previous one.
    fn arm(&self, task: JoinHandle<()>) {
        let mut pending = self.pending.lock().expect("autosave timer lock poisoned");
        if let Some(old) = pending.replace(task) {
            old.abort();
        }
    }

    fn take(&self) -> Option<JoinHandle<()>> {
        self.pending
            .lock()
            .expect("autosave timer lock poisoned")
            .take()
    }

    fn disarm(&self) {
        if let Some(task) = self.take() {
            task.abort();
        }
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.disarm();
    }
}

struct TextInner {
    section: TextSection,
    session: Arc<ProblemSession>,
    buffer: Mutex<String>,
    debounce: Debounce,
}

impl TextInner {
    fn schedule(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay = self.debounce.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            // Detach our own handle before persisting so a fresh edit
            // reschedules instead of aborting the in-flight write.
            let _ = inner.debounce.take();
            inner.emit().await;
        });
        self.debounce.arm(task);
    }

    async fn emit(&self) {
        let value = self
            .buffer
            .lock()
            .expect("autosave buffer lock poisoned")
            .clone();
        if let Err(e) = self.session.persist(self.section.patch(value)).await {
            tracing::error!("Autosave failed for {:?}: {}", self.section, e);
        }
    }
}

/// Debounced autosave for a long-form text section.
#[derive(Clone)]
pub struct TextAutosave {
    inner: Arc<TextInner>,
}

impl TextAutosave {
    pub fn new(section: TextSection, session: Arc<ProblemSession>, initial: String) -> Self {
        Self::with_delay(section, session, initial, TEXT_AUTOSAVE_DELAY_MS)
    }

    pub fn with_delay(
        section: TextSection,
        session: Arc<ProblemSession>,
        initial: String,
        delay_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(TextInner {
                section,
                session,
                buffer: Mutex::new(initial),
                debounce: Debounce::new(delay_ms),
            }),
        }
    }

    /// Current buffer contents, as the UI shows them.
    pub fn value(&self) -> String {
        self.inner
            .buffer
            .lock()
            .expect("autosave buffer lock poisoned")
            .clone()
    }

    /// Replace the buffer and (re)start the idle timer.
    pub fn edit(&self, value: impl Into<String>) {
        {
            let mut buffer = self
                .inner
                .buffer
                .lock()
                .expect("autosave buffer lock poisoned");
            *buffer = value.into();
        }
        self.inner.schedule();
    }

    /// Force immediate emission of the buffered value if a timer is
    /// pending. Must be called on teardown, or edits made in the last
    /// debounce window are lost.
    pub async fn flush(&self) {
        if let Some(task) = self.inner.debounce.take() {
            task.abort();
            self.inner.emit().await;
        }
    }

    /// Discard a pending timer without emitting. Used when the underlying
    /// record is being externally replaced.
    pub fn cancel(&self) {
        self.inner.debounce.disarm();
    }

    /// Wait for a pending timer to fire and its save to finish, instead
    /// of pre-empting it the way `flush` does.
    pub async fn settle(&self) {
        if let Some(task) = self.inner.debounce.take() {
            let _ = task.await;
        }
    }
}

struct BlockInner {
    section: ListSection,
    session: Arc<ProblemSession>,
    blocks: Mutex<Vec<String>>,
    debounce: Debounce,
}

impl BlockInner {
    fn schedule(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay = self.debounce.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            let _ = inner.debounce.take();
            inner.emit().await;
        });
        self.debounce.arm(task);
    }

    async fn emit(&self) {
        let blocks = self
            .blocks
            .lock()
            .expect("autosave buffer lock poisoned")
            .clone();
        let filtered: Vec<String> = blocks
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if let Err(e) = self.session.persist(self.section.patch(filtered)).await {
            tracing::error!("Autosave failed for {:?}: {}", self.section, e);
        }
    }
}

/// Debounced autosave for a block-list section.
#[derive(Clone)]
pub struct BlockAutosave {
    inner: Arc<BlockInner>,
}

impl BlockAutosave {
    /// `stored` is the persisted (filtered) form; the editable buffer
    /// gets the trailing blank slot appended.
    pub fn new(section: ListSection, session: Arc<ProblemSession>, stored: Vec<String>) -> Self {
        Self::with_delay(section, session, stored, LIST_AUTOSAVE_DELAY_MS)
    }

    pub fn with_delay(
        section: ListSection,
        session: Arc<ProblemSession>,
        stored: Vec<String>,
        delay_ms: u64,
    ) -> Self {
        let mut blocks = stored;
        blocks.push(String::new());
        Self {
            inner: Arc::new(BlockInner {
                section,
                session,
                blocks: Mutex::new(blocks),
                debounce: Debounce::new(delay_ms),
            }),
        }
    }

    /// Current buffer contents, trailing blank slot included.
    pub fn blocks(&self) -> Vec<String> {
        self.inner
            .blocks
            .lock()
            .expect("autosave buffer lock poisoned")
            .clone()
    }

    /// Edit one block in place. Editing the last block to a non-empty
    /// value appends a fresh trailing blank slot.
    pub fn edit_block(&self, index: usize, value: impl Into<String>) {
        {
            let mut blocks = self
                .inner
                .blocks
                .lock()
                .expect("autosave buffer lock poisoned");
            if index >= blocks.len() {
                tracing::warn!(
                    "Ignoring edit of block {} past end of {:?} buffer",
                    index,
                    self.inner.section
                );
                return;
            }
            let value = value.into();
            let was_last = index == blocks.len() - 1;
            let non_empty = !value.trim().is_empty();
            blocks[index] = value;
            if was_last && non_empty {
                blocks.push(String::new());
            }
        }
        self.inner.schedule();
    }

    /// Append a blank block. Participates in the same debounce path.
    pub fn add_block(&self) {
        {
            let mut blocks = self
                .inner
                .blocks
                .lock()
                .expect("autosave buffer lock poisoned");
            blocks.push(String::new());
        }
        self.inner.schedule();
    }

    /// Remove a block. Deleting the sole remaining block is a no-op: at
    /// least one block always stays in the editable buffer.
    pub fn delete_block(&self, index: usize) {
        {
            let mut blocks = self
                .inner
                .blocks
                .lock()
                .expect("autosave buffer lock poisoned");
            if blocks.len() == 1 || index >= blocks.len() {
                return;
            }
            blocks.remove(index);
        }
        self.inner.schedule();
    }

    pub async fn flush(&self) {
        if let Some(task) = self.inner.debounce.take() {
            task.abort();
            self.inner.emit().await;
        }
    }

    pub fn cancel(&self) {
        self.inner.debounce.disarm();
    }

    pub async fn settle(&self) {
        if let Some(task) = self.inner.debounce.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewProblem, Store};

    async fn open_session() -> (Store, Arc<ProblemSession>) {
        let store = Store::new();
        store.open_in_memory().await.unwrap();

        let problem = store
            .add(NewProblem::with_title("Autosave", None))
            .await
            .unwrap();
        let session = Arc::new(ProblemSession::new(store.clone(), problem));

        (store, session)
    }

    #[tokio::test]
    async fn test_burst_of_edits_coalesces_to_one_save() {
        let (store, session) = open_session().await;
        let autosave = TextAutosave::new(
            TextSection::ScratchPad,
            Arc::clone(&session),
            String::new(),
        );

        autosave.edit("f");
        tokio::time::sleep(Duration::from_millis(200)).await;
        autosave.edit("fo");
        tokio::time::sleep(Duration::from_millis(200)).await;
        autosave.edit("foo");

        autosave.settle().await;

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(session.id()).await.unwrap().scratch_pad, "foo");
    }

    #[tokio::test]
    async fn test_no_emission_before_idle_delay() {
        let (store, session) = open_session().await;
        let autosave = TextAutosave::new(
            TextSection::KnownFacts,
            Arc::clone(&session),
            String::new(),
        );

        autosave.edit("markup");
        tokio::time::sleep(Duration::from_millis(600)).await;

        // 1000 ms long-form delay has not elapsed yet.
        assert_eq!(store.write_count(), 0);

        autosave.settle().await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(session.id()).await.unwrap().known_facts, "markup");
    }

    #[tokio::test]
    async fn test_flush_emits_pending_value() {
        let (store, session) = open_session().await;
        let autosave = TextAutosave::new(
            TextSection::ScratchPad,
            Arc::clone(&session),
            String::new(),
        );

        autosave.edit("about to close");
        autosave.flush().await;

        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.get(session.id()).await.unwrap().scratch_pad,
            "about to close"
        );

        // Nothing pending: flush is a no-op.
        autosave.flush().await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_timer() {
        let (store, session) = open_session().await;
        let autosave = TextAutosave::new(
            TextSection::ScratchPad,
            Arc::clone(&session),
            String::new(),
        );

        autosave.edit("never saved");
        autosave.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_block_edits_trim_and_filter_on_emit() {
        let (store, session) = open_session().await;
        let autosave = BlockAutosave::new(
            ListSection::Observations,
            Arc::clone(&session),
            Vec::new(),
        );

        autosave.edit_block(0, "  sorted input  ");
        autosave.edit_block(1, "n is small");
        autosave.settle().await;

        let stored = store.get(session.id()).await.unwrap();
        assert_eq!(
            stored.observations,
            vec!["sorted input".to_string(), "n is small".to_string()]
        );

        // Buffer keeps the trailing blank editing slot.
        assert_eq!(autosave.blocks().len(), 3);
        assert_eq!(autosave.blocks().last().unwrap(), "");
    }

    #[tokio::test]
    async fn test_repeated_identical_save_is_idempotent() {
        let (store, session) = open_session().await;
        let autosave = BlockAutosave::new(
            ListSection::Questions,
            Arc::clone(&session),
            Vec::new(),
        );

        autosave.edit_block(0, " why O(n)? ");
        autosave.settle().await;
        let first = store.get(session.id()).await.unwrap().questions;

        autosave.edit_block(0, " why O(n)? ");
        autosave.settle().await;
        let second = store.get(session.id()).await.unwrap().questions;

        assert_eq!(first, vec!["why O(n)?".to_string()]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_delete_sole_block_is_noop() {
        let (store, session) = open_session().await;
        let autosave = BlockAutosave::new(
            ListSection::Approaches,
            Arc::clone(&session),
            Vec::new(),
        );

        autosave.delete_block(0);
        assert_eq!(autosave.blocks(), vec![String::new()]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_and_delete_blocks_participate_in_debounce() {
        let (store, session) = open_session().await;
        let autosave = BlockAutosave::new(
            ListSection::Approaches,
            Arc::clone(&session),
            vec!["brute force".to_string(), "two pointers".to_string()],
        );

        autosave.delete_block(0);
        autosave.add_block();
        autosave.settle().await;

        assert_eq!(store.write_count(), 1);
        let stored = store.get(session.id()).await.unwrap();
        assert_eq!(stored.approaches, vec!["two pointers".to_string()]);
    }

    #[tokio::test]
    async fn test_emission_reads_buffer_at_fire_time() {
        let (store, session) = open_session().await;
        let autosave = BlockAutosave::new(
            ListSection::Observations,
            Arc::clone(&session),
            Vec::new(),
        );

        // The value present when the delay finally elapses wins, not the
        // value present when the timer was first started.
        autosave.edit_block(0, "draft");
        tokio::time::sleep(Duration::from_millis(300)).await;
        autosave.edit_block(0, "final");
        autosave.settle().await;

        assert_eq!(store.write_count(), 1);
        let stored = store.get(session.id()).await.unwrap();
        assert_eq!(stored.observations, vec!["final".to_string()]);
    }
}
