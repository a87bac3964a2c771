// HTTP API module - the engine's operation contracts as REST endpoints
//
// Boundary consumed by the UI layer: user stats, the task registry, the
// completion log and the process-day entry point. Dates cross the wire as
// plain YYYY-MM-DD calendar dates, never timestamps.

mod logs;
mod process;
mod stats;
mod tasks;
mod users;

use axum::Json;
use serde_json::{json, Value};

// Re-export endpoint handlers
pub use logs::list_task_logs;
pub use process::process_day;
pub use stats::{get_activity, get_user_stats};
pub use tasks::{create_task, delete_task, list_tasks, update_task};
pub use users::{create_user, get_user};

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "streax-engine",
        "version": crate::config::VERSION,
    }))
}
