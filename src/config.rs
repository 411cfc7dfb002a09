//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the engine.

// ===== Autosave =====

/// Idle delay before a block-list section (observations, approaches,
/// questions) emits its buffered value, in milliseconds.
pub const LIST_AUTOSAVE_DELAY_MS: u64 = 500;

/// Idle delay before a long-form text section (known facts, scratch pad)
/// emits its buffered value, in milliseconds.
pub const TEXT_AUTOSAVE_DELAY_MS: u64 = 1000;

/// Minimum autosave delay in milliseconds.
/// Values below this cause excessive disk I/O and degrade performance.
pub const MIN_AUTOSAVE_DELAY_MS: u64 = 100;

/// Maximum autosave delay in milliseconds (5 minutes).
/// Values above this risk data loss on unexpected shutdown.
pub const MAX_AUTOSAVE_DELAY_MS: u64 = 300_000;

// ===== Work timer =====

/// Work timer tick period in seconds. Each tick increments the elapsed
/// counter and persists it through the session.
pub const WORK_TIMER_TICK_SECS: u64 = 1;

// ===== Reminders =====

/// Period of the background reminder scan in seconds.
pub const REMINDER_SCAN_PERIOD_SECS: u64 = 60;

// ===== Storage =====

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "solvespace.db";
