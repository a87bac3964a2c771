//! Domain types shared by the engine, store and HTTP API
//!
//! Everything crossing the wire is a typed serde struct - no loose JSON
//! inspection on either side. Calendar days are `chrono::NaiveDate` and
//! serialize as `YYYY-MM-DD` with no time-of-day component, so day-boundary
//! logic never depends on timezones.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task size category, fixed closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Small,
    Medium,
    Large,
}

impl TaskKind {
    /// Storage representation (matches the serde form)
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Small => "small",
            TaskKind::Medium => "medium",
            TaskKind::Large => "large",
        }
    }

    /// Parse the storage representation; unknown strings map to `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "small" => Some(TaskKind::Small),
            "medium" => Some(TaskKind::Medium),
            "large" => Some(TaskKind::Large),
            _ => None,
        }
    }
}

/// A registered task owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: TaskKind,
    pub base_xp: i64,
    pub required_daily: bool,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// A user row with its leveling/streak state
///
/// `xp_into_level` counts XP inside the current level; the next-level
/// threshold is always derived from `current_level`, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub current_level: i64,
    pub xp_into_level: i64,
    pub streak_days: i64,
    /// Last day that went through the Day Processor, if any
    pub last_processed_day: Option<NaiveDate>,
    pub created_at: String,
}

/// One append-only completion log row
///
/// `task_name` and `xp_awarded` are frozen at award time: later task edits
/// or deletions never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub day: NaiveDate,
    pub xp_awarded: i64,
    /// Whether this entry was eligible for the streak rule on its day
    pub counted_streak: bool,
    pub created_at: String,
}

/// A task submitted for day processing, with its completion outcome
///
/// Completion detection happens in the client; the engine only scores.
/// `task_id` is optional: unknown tasks are registered on first sight by
/// `(user, name)`.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateTask {
    pub task_id: Option<i64>,
    pub name: String,
    pub kind: TaskKind,
    pub base_xp: i64,
    #[serde(default)]
    pub required_daily: bool,
    pub completed: bool,
}

/// Per-task result inside a [`DayReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Completed, no prior log row: XP awarded and logged
    Awarded,
    /// A log row for (user, task, day) already existed: no-op
    AlreadyLogged,
    /// Submitted but not completed: nothing awarded
    NotCompleted,
    /// Malformed payload: excluded from the batch, rest continues
    Rejected,
}

/// Outcome for one candidate task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: Option<i64>,
    pub name: String,
    pub status: OutcomeStatus,
    pub xp_awarded: i64,
    /// Rejection reason, present only for `rejected`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result event for one `process_day` call
///
/// Ephemeral - derivable from the completion log and user stats, produced
/// per invocation and never persisted itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayReport {
    pub user_id: i64,
    pub day: NaiveDate,
    pub outcomes: Vec<TaskOutcome>,
    /// Total XP awarded across the batch
    pub xp_awarded: i64,
    pub leveled_up: bool,
    pub current_level: i64,
    pub xp_into_level: i64,
    pub next_level_threshold: i64,
    pub streak_days: i64,
}
