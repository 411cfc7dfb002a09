//! Services module
//!
//! The consistency engine proper: debounced section autosave, the
//! serialized merge-and-persist session, the work timer, the background
//! reminder scan, and import/export.

pub mod autosave;
pub mod problems;
pub mod reminders;
pub mod session;
pub mod timer;
pub mod transfer;

pub use autosave::{BlockAutosave, ListSection, TextAutosave, TextSection};
pub use problems::{EngineEvent, OpenProblem, ProblemFilter, ProblemService, Statistics};
pub use reminders::ReminderScheduler;
pub use session::ProblemSession;
pub use timer::WorkTimer;
pub use transfer::TransferService;
