use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::bulk::{JobStatusReport, TaskCounts};
use crate::models::job::{BulkJob, JobStatus};
use crate::services::store::{JobStore, StoreError};

/// Minutes needed for `task_count` tasks, rounded up.
pub fn estimated_minutes(task_count: usize, per_task_minutes: f64) -> i64 {
    (task_count as f64 * per_task_minutes).ceil() as i64
}

/// Percentage of tasks that reached a terminal state.
pub fn progress_percent(job: &BulkJob) -> f64 {
    if job.total_count <= 0 {
        return 0.0;
    }
    f64::from(job.resolved_count()) / f64::from(job.total_count) * 100.0
}

/// Expected finish time, or `None` once the job has completed or the
/// estimate is out of range.
pub fn estimated_completion(
    job: &BulkJob,
    now: DateTime<Utc>,
    per_task_minutes: f64,
) -> Option<DateTime<Utc>> {
    if job.status == JobStatus::Completed {
        return None;
    }
    let minutes = estimated_minutes(job.remaining_count() as usize, per_task_minutes);
    now.checked_add_signed(Duration::try_minutes(minutes)?)
}

/// Read-only job reporting for the job's creator.
pub struct StatusService {
    jobs: Arc<dyn JobStore>,
    per_task_minutes: f64,
}

impl StatusService {
    pub fn new(jobs: Arc<dyn JobStore>, per_task_minutes: f64) -> Self {
        Self {
            jobs,
            per_task_minutes,
        }
    }

    /// Report for `job_id`, or `None` when it does not exist or belongs to
    /// someone other than `requester`.
    pub async fn job_status(
        &self,
        job_id: Uuid,
        requester: Uuid,
    ) -> Result<Option<JobStatusReport>, StoreError> {
        let Some(job) = self.jobs.find_job_for_creator(job_id, requester).await? else {
            return Ok(None);
        };

        let tasks = self.jobs.list_tasks(job_id).await?;
        let task_counts = TaskCounts::tally(tasks.iter().map(|t| &t.task.status));

        Ok(Some(JobStatusReport {
            progress: progress_percent(&job),
            estimated_completion_time: estimated_completion(&job, Utc::now(), self.per_task_minutes),
            job,
            tasks,
            task_counts,
        }))
    }
}
