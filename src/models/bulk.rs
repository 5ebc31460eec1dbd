use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::employee::EmployeeSummary;
use super::job::{BulkJob, BulkTask, DifficultyLevel, GroupType, TaskStatus};

/// Request to generate one personalized course per employee of a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkGenerationRequest {
    #[garde(skip)]
    pub group_type: GroupType,

    #[garde(skip)]
    pub group_id: Uuid,

    #[garde(length(min = 3, max = 200))]
    pub title: String,

    #[garde(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default)]
    #[garde(skip)]
    pub difficulty_level: DifficultyLevel,

    /// Explicit employee selection. Overrides the group filter when non-empty.
    #[garde(length(max = 1000))]
    pub employee_ids: Option<Vec<Uuid>>,

    #[garde(skip)]
    pub should_send_notifications: Option<bool>,
}

/// Response after a bulk job has been accepted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub total_employees: usize,
    pub estimated_time_minutes: i64,
}

/// A task together with the display fields of its employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: BulkTask,
    pub employee: Option<EmployeeSummary>,
}

/// Number of tasks in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a TaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// Aggregated view of a job as reported to its creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub job: BulkJob,
    pub tasks: Vec<TaskView>,
    pub task_counts: TaskCounts,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion_time: Option<DateTime<Utc>>,
}

/// Response for querying job status.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: JobStatusReport,
}
