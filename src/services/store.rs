//! Persistence seams used by the submission, processing and status services.
//!
//! Postgres implementations live in [`crate::db::PgStore`]; tests use
//! in-memory fakes.
//!
//! Job-level writes made by a processor carry the `claim_id` it received from
//! [`JobStore::claim_job`] and only apply while that claim still owns the job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::bulk::TaskView;
use crate::models::course::{AssignmentNotice, NewCourse, NewEnrollment};
use crate::models::employee::EmployeeProfile;
use crate::models::job::{BulkJob, BulkTask, GroupType, JobProgress, JobStatus, NewBulkJob, TaskResult};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable job and task records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &NewBulkJob) -> Result<BulkJob, StoreError>;

    /// Insert one pending task per employee, in the given order, as a single
    /// unit. Returns the number of tasks created.
    async fn create_tasks(&self, job_id: Uuid, employee_ids: &[Uuid]) -> Result<u64, StoreError>;

    /// Remove a job and its tasks.
    async fn delete_job(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// Job lookup restricted to its creator.
    async fn find_job_for_creator(
        &self,
        job_id: Uuid,
        creator: Uuid,
    ) -> Result<Option<BulkJob>, StoreError>;

    /// Compare-and-set `pending -> processing`, recording `claim_id` as the
    /// owner. A `processing` job whose heartbeat is older than `stale_before`
    /// may be reclaimed, which revokes the previous claim. Returns `None` when
    /// another processor owns the job or it is terminal.
    async fn claim_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<BulkJob>, StoreError>;

    /// Refresh the heartbeat. `false` once the claim has been revoked.
    async fn touch_job(&self, job_id: Uuid, claim_id: Uuid) -> Result<bool, StoreError>;

    /// Pending tasks of a job ordered by sequence, then id.
    async fn pending_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError>;

    /// Tasks stuck in `processing`, left behind by an interrupted run.
    async fn interrupted_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError>;

    /// Compare-and-set `pending -> processing` on a task of a job `claim_id`
    /// still owns; also refreshes the heartbeat. `false` if the task was not
    /// pending or the claim was revoked.
    async fn start_task(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        task_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// `processing -> completed`. `false` if the task had already left
    /// `processing`.
    async fn complete_task(&self, task_id: Uuid, result: &TaskResult) -> Result<bool, StoreError>;

    /// `processing -> failed`. `false` if the task had already left
    /// `processing`.
    async fn fail_task(&self, task_id: Uuid, error: &str) -> Result<bool, StoreError>;

    /// Recompute both counters from the task rows and refresh the heartbeat.
    /// Returns the stored counts, or `None` once the claim has been revoked.
    async fn sync_job_counts(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
    ) -> Result<Option<JobProgress>, StoreError>;

    /// Move the job to a terminal status and stamp `completed_at`. `false`
    /// once the claim has been revoked.
    async fn finish_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        status: JobStatus,
    ) -> Result<bool, StoreError>;

    /// All tasks of a job with their employee display fields.
    async fn list_tasks(&self, job_id: Uuid) -> Result<Vec<TaskView>, StoreError>;
}

/// Read access to the employee records owned by the HR side of the platform.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// The subset of `ids` that exist and are active, in any order.
    async fn active_employees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// Active employees of a department or position, ordered by name.
    async fn active_employees_in_group(
        &self,
        group_type: GroupType,
        group_id: Uuid,
    ) -> Result<Vec<Uuid>, StoreError>;

    async fn employee_profile(&self, employee_id: Uuid)
        -> Result<Option<EmployeeProfile>, StoreError>;
}

/// Where generated courses and enrollments are recorded.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn create_course(&self, course: &NewCourse) -> Result<Uuid, StoreError>;

    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Uuid, StoreError>;

    async fn notify_assignment(&self, notice: &AssignmentNotice) -> Result<(), StoreError>;

    /// Delete a course together with its enrollments and notifications.
    async fn withdraw_course(&self, course_id: Uuid) -> Result<(), StoreError>;
}
