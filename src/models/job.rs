use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Status of a bulk generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Status of a single per-employee task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Which organisational unit `group_id` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupType {
    Department,
    Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Parent record of one bulk generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub id: Uuid,
    pub group_type: GroupType,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty_level: DifficultyLevel,
    pub send_notifications: bool,
    pub status: JobStatus,
    pub total_count: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    /// Tasks that have reached a terminal state.
    pub fn resolved_count(&self) -> i32 {
        self.completed_count + self.failed_count
    }

    pub fn remaining_count(&self) -> i32 {
        (self.total_count - self.resolved_count()).max(0)
    }
}

/// Fields required to insert a new job. Counters start at zero and the
/// status at `pending`.
#[derive(Debug, Clone)]
pub struct NewBulkJob {
    pub group_type: GroupType,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty_level: DifficultyLevel,
    pub send_notifications: bool,
    pub total_count: i32,
    pub created_by: Uuid,
}

/// One per-employee unit of work belonging to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub employee_id: Uuid,
    pub sequence: i32,
    pub status: TaskStatus,
    pub content_id: Option<String>,
    pub course_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// References produced by a successful task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub content_id: String,
    pub course_id: Uuid,
    pub enrollment_id: Uuid,
}

/// Completed and failed task counts of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub completed: i32,
    pub failed: i32,
}
