//! Day Processor - scores one day's task outcomes atomically
//!
//! The only writer of user stats and the completion log. Each call runs in
//! one immediate SQLite transaction: either the whole day's changes land
//! (log rows + stats) or none of them do. Per-task problems are recorded as
//! `rejected` outcomes and never abort the batch; `UnknownUser` and
//! `Conflict` abort with no partial effect.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rusqlite::TransactionBehavior;

use crate::error::EngineError;
use crate::models::{CandidateTask, DayReport, OutcomeStatus, Task, TaskOutcome};
use crate::store::{self, Store};

use super::{leveling, streak};

/// Orchestrates `process_day` calls against the store
pub struct DayProcessor {
    store: Arc<Store>,
}

impl DayProcessor {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Process `day` (defaulting to today, UTC calendar date) for a user.
    ///
    /// Steps are strictly sequential: resolve and score each candidate,
    /// fold awarded XP through the leveling engine, advance the streak once
    /// per call, then commit stats and log rows together.
    pub fn process(
        &self,
        user_id: i64,
        day: Option<NaiveDate>,
        candidates: &[CandidateTask],
    ) -> Result<DayReport, EngineError> {
        let day = day.unwrap_or_else(|| Utc::now().date_naive());

        let mut conn = self.store.conn()?;
        // Immediate transaction: takes the write lock up front, serializing
        // all stats mutations and log appends behind this call.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user = store::get_user(&tx, user_id)?.ok_or(EngineError::UnknownUser(user_id))?;

        if let Some(last) = user.last_processed_day {
            if day < last {
                return Err(EngineError::Conflict(format!(
                    "day {} is earlier than last processed day {}",
                    day, last
                )));
            }
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut level = user.current_level;
        let mut xp_into_level = user.xp_into_level;
        let mut levels_gained = 0;
        let mut xp_awarded_total = 0;
        let mut required_done = false;

        for cand in candidates {
            // Per-item validation: a malformed payload is excluded from the
            // batch, the rest of the day's awards proceed.
            if cand.name.trim().is_empty() {
                outcomes.push(rejected(cand, "task name must not be empty"));
                continue;
            }
            if cand.base_xp <= 0 {
                outcomes.push(rejected(cand, "base_xp must be > 0"));
                continue;
            }

            let task = match self.resolve_task(&tx, user_id, cand)? {
                Ok(task) => task,
                Err(reason) => {
                    outcomes.push(rejected(cand, &reason));
                    continue;
                }
            };

            if !cand.completed {
                outcomes.push(TaskOutcome {
                    task_id: Some(task.id),
                    name: task.name,
                    status: OutcomeStatus::NotCompleted,
                    xp_awarded: 0,
                    detail: None,
                });
                continue;
            }

            // A completed required-daily task keeps the streak alive even if
            // its XP was already awarded on a prior call for the same day.
            if task.required_daily {
                required_done = true;
            }

            if store::log_exists(&tx, user_id, task.id, day)? {
                outcomes.push(TaskOutcome {
                    task_id: Some(task.id),
                    name: task.name,
                    status: OutcomeStatus::AlreadyLogged,
                    xp_awarded: 0,
                    detail: None,
                });
                continue;
            }

            // Award the registry's XP value and freeze it in the log row
            let awarded = task.base_xp;
            let progress = leveling::apply_xp(level, xp_into_level, awarded);
            level = progress.level;
            xp_into_level = progress.xp_into_level;
            levels_gained += progress.levels_gained;
            xp_awarded_total += awarded;

            store::insert_log(&tx, user_id, task.id, &task.name, day, awarded, task.required_daily)?;
            outcomes.push(TaskOutcome {
                task_id: Some(task.id),
                name: task.name,
                status: OutcomeStatus::Awarded,
                xp_awarded: awarded,
                detail: None,
            });
        }

        // Streak rule runs once per call, not once per task
        let streak_days = streak::advance(user.last_processed_day, day, user.streak_days, required_done);

        store::update_user_stats(&tx, user_id, level, xp_into_level, streak_days, day)?;
        tx.commit()?;

        tracing::info!(
            "Processed day {} for user {}: +{} XP, level {} ({} gained), streak {}",
            day,
            user_id,
            xp_awarded_total,
            level,
            levels_gained,
            streak_days
        );

        Ok(DayReport {
            user_id,
            day,
            outcomes,
            xp_awarded: xp_awarded_total,
            leveled_up: levels_gained > 0,
            current_level: level,
            xp_into_level,
            next_level_threshold: leveling::next_level_threshold(level),
            streak_days,
        })
    }

    /// Resolve a candidate against the registry.
    ///
    /// By id: the task must exist and belong to the user. By name: register
    /// on first sight with the candidate's fields (ensure-task semantics),
    /// so clients can submit a day without a separate create round-trip.
    /// The inner `Err` is a per-item rejection reason, not a call failure.
    fn resolve_task(
        &self,
        conn: &rusqlite::Connection,
        user_id: i64,
        cand: &CandidateTask,
    ) -> Result<Result<Task, String>, EngineError> {
        match cand.task_id {
            Some(id) => match store::find_task(conn, id)? {
                Some(task) if task.user_id == user_id => Ok(Ok(task)),
                Some(_) => Ok(Err(format!("task {} belongs to another user", id))),
                None => Ok(Err(format!("unknown task id {}", id))),
            },
            None => match store::find_task_by_name(conn, user_id, cand.name.trim())? {
                Some(task) => Ok(Ok(task)),
                None => {
                    let task = store::insert_task(
                        conn,
                        user_id,
                        cand.name.trim(),
                        cand.kind,
                        cand.base_xp,
                        cand.required_daily,
                    )?;
                    tracing::debug!("Registered task '{}' on first sight", task.name);
                    Ok(Ok(task))
                }
            },
        }
    }
}

fn rejected(cand: &CandidateTask, reason: &str) -> TaskOutcome {
    TaskOutcome {
        task_id: cand.task_id,
        name: cand.name.clone(),
        status: OutcomeStatus::Rejected,
        xp_awarded: 0,
        detail: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskKind;

    fn setup() -> (Arc<Store>, DayProcessor, i64) {
        let store = Arc::new(Store::open_in_memory());
        let processor = DayProcessor::new(store.clone());
        let user = store.create_user("lena").unwrap();
        (store, processor, user.id)
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn candidate(name: &str, xp: i64, required: bool, completed: bool) -> CandidateTask {
        CandidateTask {
            task_id: None,
            name: name.to_string(),
            kind: TaskKind::Small,
            base_xp: xp,
            required_daily: required,
            completed,
        }
    }

    #[test]
    fn test_unknown_user_aborts() {
        let (_store, processor, _) = setup();
        let err = processor.process(999, Some(day("2025-03-01")), &[]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownUser(999)));
    }

    #[test]
    fn test_award_updates_stats_and_log() {
        let (store, processor, user_id) = setup();
        let report = processor
            .process(user_id, Some(day("2025-03-01")), &[candidate("run", 50, true, true)])
            .unwrap();

        assert_eq!(report.xp_awarded, 50);
        assert_eq!(report.current_level, 1);
        assert_eq!(report.xp_into_level, 50);
        assert_eq!(report.streak_days, 1);
        assert!(!report.leveled_up);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Awarded);

        let user = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.xp_into_level, 50);
        assert_eq!(user.streak_days, 1);
        assert_eq!(user.last_processed_day, Some(day("2025-03-01")));
        assert_eq!(store.all_logs(user_id).unwrap().len(), 1);
    }

    #[test]
    fn test_reprocessing_same_day_is_idempotent() {
        let (store, processor, user_id) = setup();
        let tasks = [candidate("run", 50, true, true), candidate("read", 20, false, true)];

        let first = processor.process(user_id, Some(day("2025-03-01")), &tasks).unwrap();
        let second = processor.process(user_id, Some(day("2025-03-01")), &tasks).unwrap();

        assert_eq!(first.xp_awarded, 70);
        assert_eq!(second.xp_awarded, 0, "no XP on reprocess");
        assert_eq!(second.streak_days, first.streak_days, "no double-count");
        assert!(second
            .outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::AlreadyLogged));

        let user = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.xp_into_level, first.xp_into_level);
        assert_eq!(user.current_level, first.current_level);
        assert_eq!(store.all_logs(user_id).unwrap().len(), 2, "no duplicate rows");
    }

    #[test]
    fn test_new_task_on_same_day_still_awards() {
        let (store, processor, user_id) = setup();
        let d = day("2025-03-01");
        processor.process(user_id, Some(d), &[candidate("run", 50, true, true)]).unwrap();
        let report = processor
            .process(user_id, Some(d), &[candidate("read", 20, false, true)])
            .unwrap();

        assert_eq!(report.xp_awarded, 20);
        assert_eq!(report.streak_days, 1, "same-day streak unchanged");
        assert_eq!(store.all_logs(user_id).unwrap().len(), 2);
    }

    #[test]
    fn test_earlier_day_is_a_conflict() {
        let (_store, processor, user_id) = setup();
        processor
            .process(user_id, Some(day("2025-03-02")), &[candidate("run", 50, true, true)])
            .unwrap();
        let err = processor
            .process(user_id, Some(day("2025-03-01")), &[candidate("run", 50, true, true)])
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn test_rejected_candidate_does_not_block_batch() {
        let (_store, processor, user_id) = setup();
        let tasks = [
            candidate("", 50, false, true),
            candidate("bad-xp", -5, false, true),
            candidate("run", 50, true, true),
        ];
        let report = processor.process(user_id, Some(day("2025-03-01")), &tasks).unwrap();

        assert_eq!(report.outcomes[0].status, OutcomeStatus::Rejected);
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Rejected);
        assert_eq!(report.outcomes[2].status, OutcomeStatus::Awarded);
        assert_eq!(report.xp_awarded, 50);
    }

    #[test]
    fn test_unknown_task_id_is_rejected_per_item() {
        let (_store, processor, user_id) = setup();
        let mut cand = candidate("ghost", 50, false, true);
        cand.task_id = Some(12345);
        let report = processor.process(user_id, Some(day("2025-03-01")), &[cand]).unwrap();
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Rejected);
    }

    #[test]
    fn test_large_award_spans_levels() {
        let (_store, processor, user_id) = setup();
        let t1 = leveling::next_level_threshold(1);
        let t2 = leveling::next_level_threshold(2);
        let award = t1 + t2 + 17;

        let report = processor
            .process(user_id, Some(day("2025-03-01")), &[candidate("marathon", award, true, true)])
            .unwrap();
        assert!(report.leveled_up);
        assert_eq!(report.current_level, 3);
        assert_eq!(report.xp_into_level, 17);
        assert_eq!(report.next_level_threshold, leveling::next_level_threshold(3));
    }

    #[test]
    fn test_streak_over_consecutive_days_and_gap() {
        let (_store, processor, user_id) = setup();
        let required = |completed| candidate("run", 50, true, completed);

        let r1 = processor.process(user_id, Some(day("2025-03-01")), &[required(true)]).unwrap();
        assert_eq!(r1.streak_days, 1);

        let r2 = processor.process(user_id, Some(day("2025-03-02")), &[required(true)]).unwrap();
        assert_eq!(r2.streak_days, 2);

        // Missed required task on the next day resets
        let r3 = processor.process(user_id, Some(day("2025-03-03")), &[required(false)]).unwrap();
        assert_eq!(r3.streak_days, 0);

        let r4 = processor.process(user_id, Some(day("2025-03-04")), &[required(true)]).unwrap();
        assert_eq!(r4.streak_days, 1);

        // Gap of >= 2 days resets even with a completion on the new day
        let r5 = processor.process(user_id, Some(day("2025-03-07")), &[required(true)]).unwrap();
        assert_eq!(r5.streak_days, 0);
    }

    #[test]
    fn test_optional_task_alone_does_not_start_streak() {
        let (_store, processor, user_id) = setup();
        let report = processor
            .process(user_id, Some(day("2025-03-01")), &[candidate("read", 20, false, true)])
            .unwrap();
        assert_eq!(report.streak_days, 0);
        assert_eq!(report.xp_awarded, 20, "XP still awarded for bonus tasks");
    }

    #[test]
    fn test_activity_map_rebuilds_from_log() {
        let (store, processor, user_id) = setup();
        processor
            .process(
                user_id,
                Some(day("2025-03-01")),
                &[candidate("run", 50, true, true), candidate("read", 20, false, true)],
            )
            .unwrap();
        processor
            .process(user_id, Some(day("2025-03-02")), &[candidate("run", 50, true, true)])
            .unwrap();

        let logs = store.all_logs(user_id).unwrap();
        let map = streak::activity_map(&logs);
        assert_eq!(map[&day("2025-03-01")], 2);
        assert_eq!(map[&day("2025-03-02")], 1);
    }
}
