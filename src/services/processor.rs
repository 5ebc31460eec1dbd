//! Drives the tasks of one bulk job to terminal states.
//!
//! A run claims the job under a fresh claim id, fails any tasks a crashed
//! predecessor left in `processing`, then handles the pending snapshot one
//! task at a time. Everything that goes wrong for a single employee becomes a
//! failed task; only failures of the job's own bookkeeping end the run with
//! the job marked `failed`.
//!
//! Job-level writes are fenced by the claim id. When a slow run loses its
//! lease and another processor reclaims the job, the old run's writes stop
//! applying and it ends with [`RunOutcome::Superseded`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::course::{AssignmentNotice, NewCourse, NewEnrollment};
use crate::models::job::{BulkJob, BulkTask, JobStatus, TaskResult};
use crate::services::generation::{GenerationBackend, GenerationError};
use crate::services::personalization;
use crate::services::store::{CourseCatalog, EmployeeDirectory, JobStore, StoreError};

pub use crate::models::job::JobProgress;

pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted before the task finished";

const MIN_HEARTBEAT: std::time::Duration = std::time::Duration::from_secs(1);

/// Result of generating one task's course, before it is recorded.
#[derive(Debug)]
enum TaskOutcome {
    Completed {
        result: TaskResult,
        notice: AssignmentNotice,
    },
    Failed(String),
}

/// How a processor run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another processor owns the job or it is already terminal.
    Skipped,
    /// Every task in the snapshot reached a terminal state.
    Completed(JobProgress),
    /// The run stopped early; the job was marked `failed`.
    Failed { error: String },
    /// The job was reclaimed by another processor mid-run. Nothing further
    /// was written on its behalf.
    Superseded,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Failed to load employee profile: {0}")]
    ProfileFetch(#[source] StoreError),

    #[error("Employee {0} not found")]
    EmployeeNotFound(Uuid),

    #[error("Course generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to save generated course: {0}")]
    Persistence(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to claim job {job_id}: {source}")]
    Claim {
        job_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("Failed to mark job {job_id} as {status}: {source}")]
    Finish {
        job_id: Uuid,
        status: JobStatus,
        #[source]
        source: StoreError,
    },
}

pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    employees: Arc<dyn EmployeeDirectory>,
    courses: Arc<dyn CourseCatalog>,
    backend: Arc<dyn GenerationBackend>,
    claim_lease: Duration,
    heartbeat: std::time::Duration,
}

impl JobProcessor {
    /// `claim_lease` is how long a silent processor keeps its job; the
    /// heartbeat fires three times per lease while a course is generated.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        employees: Arc<dyn EmployeeDirectory>,
        courses: Arc<dyn CourseCatalog>,
        backend: Arc<dyn GenerationBackend>,
        claim_lease: Duration,
    ) -> Self {
        Self {
            jobs,
            employees,
            courses,
            backend,
            claim_lease,
            heartbeat: heartbeat_period(claim_lease),
        }
    }

    /// Run the processor on its own tokio task so a panic inside it still
    /// leaves the job in a terminal state.
    pub async fn run_supervised(self: Arc<Self>, job_id: Uuid) -> Result<RunOutcome, ProcessorError> {
        let claim_id = Uuid::new_v4();
        let processor = Arc::clone(&self);
        let handle = tokio::spawn(async move { processor.run_with_claim(job_id, claim_id).await });

        match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                error!(job_id = %job_id, error = %join_error, "Processor aborted, marking job failed");
                if !self.finish(job_id, claim_id, JobStatus::Failed).await? {
                    return Ok(superseded(job_id));
                }
                Ok(RunOutcome::Failed {
                    error: join_error.to_string(),
                })
            }
        }
    }

    /// Process every pending task of `job_id` sequentially.
    pub async fn run(&self, job_id: Uuid) -> Result<RunOutcome, ProcessorError> {
        self.run_with_claim(job_id, Uuid::new_v4()).await
    }

    #[tracing::instrument(skip_all, fields(job_id = %job_id, claim_id = %claim_id))]
    async fn run_with_claim(&self, job_id: Uuid, claim_id: Uuid) -> Result<RunOutcome, ProcessorError> {
        let stale_before = Utc::now() - self.claim_lease;
        let job = match self.jobs.claim_job(job_id, claim_id, stale_before).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!("Job is owned by another processor or already finished, skipping");
                return Ok(RunOutcome::Skipped);
            }
            Err(source) => return Err(ProcessorError::Claim { job_id, source }),
        };

        info!(total = job.total_count, title = %job.title, "Claimed bulk generation job");

        match self.drain(&job, claim_id).await {
            Ok(Some(progress)) => {
                if !self.finish(job_id, claim_id, JobStatus::Completed).await? {
                    return Ok(superseded(job_id));
                }
                info!(
                    completed = progress.completed,
                    failed = progress.failed,
                    "Bulk generation job completed"
                );
                Ok(RunOutcome::Completed(progress))
            }
            Ok(None) => Ok(superseded(job_id)),
            Err(e) => {
                error!(error = %e, "Bulk generation job aborted");
                if !self.finish(job_id, claim_id, JobStatus::Failed).await? {
                    return Ok(superseded(job_id));
                }
                Ok(RunOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Returns the final counters, or `None` once the claim was revoked.
    async fn drain(&self, job: &BulkJob, claim_id: Uuid) -> Result<Option<JobProgress>, StoreError> {
        let Some(mut progress) = self.jobs.sync_job_counts(job.id, claim_id).await? else {
            return Ok(None);
        };

        if progress.completed != job.completed_count || progress.failed != job.failed_count {
            warn!(
                recorded_completed = job.completed_count,
                recorded_failed = job.failed_count,
                completed = progress.completed,
                failed = progress.failed,
                "Job counters disagreed with task states, corrected"
            );
        }

        for task in self.jobs.interrupted_tasks(job.id).await? {
            warn!(task_id = %task.id, employee_id = %task.employee_id, "Failing interrupted task");
            let outcome = TaskOutcome::Failed(INTERRUPTED_MESSAGE.to_string());
            match self.settle(job, claim_id, &task, outcome).await? {
                Some(next) => progress = next,
                None => return Ok(None),
            }
        }

        let pending = self.jobs.pending_tasks(job.id).await?;
        info!(pending = pending.len(), "Processing pending tasks");

        for task in pending {
            if !self.jobs.start_task(job.id, claim_id, task.id).await? {
                if !self.jobs.touch_job(job.id, claim_id).await? {
                    return Ok(None);
                }
                warn!(task_id = %task.id, "Task is no longer pending, skipping");
                continue;
            }

            let outcome = self.process_with_heartbeat(job, claim_id, &task).await;
            match self.settle(job, claim_id, &task, outcome).await? {
                Some(next) => progress = next,
                None => return Ok(None),
            }
        }

        Ok(Some(progress))
    }

    /// Record a task's terminal state, then recount the job.
    ///
    /// A course whose task could not be marked completed is withdrawn, so no
    /// enrollment outlives a failed task. Only a store failure while marking
    /// the task failed is returned; it ends the run.
    async fn settle(
        &self,
        job: &BulkJob,
        claim_id: Uuid,
        task: &BulkTask,
        outcome: TaskOutcome,
    ) -> Result<Option<JobProgress>, StoreError> {
        match outcome {
            TaskOutcome::Completed { result, notice } => {
                match self.jobs.complete_task(task.id, &result).await {
                    Ok(true) => {
                        metrics::counter!("bulk_tasks_completed_total").increment(1);
                        if job.send_notifications {
                            if let Err(e) = self.courses.notify_assignment(&notice).await {
                                warn!(task_id = %task.id, error = %e, "Failed to send assignment notification");
                            }
                        }
                    }
                    Ok(false) => {
                        warn!(task_id = %task.id, "Task left processing before its course was recorded");
                        self.withdraw(task, result.course_id).await;
                    }
                    Err(e) => {
                        let reason = TaskError::Persistence(e).to_string();
                        warn!(task_id = %task.id, error = %reason, "Failed to record completed task");
                        self.withdraw(task, result.course_id).await;
                        if self.jobs.fail_task(task.id, &reason).await? {
                            metrics::counter!("bulk_tasks_failed_total").increment(1);
                        }
                    }
                }
            }
            TaskOutcome::Failed(reason) => {
                if self.jobs.fail_task(task.id, &reason).await? {
                    metrics::counter!("bulk_tasks_failed_total").increment(1);
                }
            }
        }

        self.jobs.sync_job_counts(job.id, claim_id).await
    }

    async fn withdraw(&self, task: &BulkTask, course_id: Uuid) {
        if let Err(e) = self.courses.withdraw_course(course_id).await {
            error!(
                task_id = %task.id,
                course_id = %course_id,
                error = %e,
                "Failed to withdraw course of unrecorded task"
            );
        }
    }

    /// Generate one task's course while keeping the job heartbeat fresh.
    async fn process_with_heartbeat(&self, job: &BulkJob, claim_id: Uuid, task: &BulkTask) -> TaskOutcome {
        let work = self.process_task(job, task);
        tokio::pin!(work);

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        // The first tick completes immediately; start_task just refreshed it.
        heartbeat.tick().await;
        let mut owned = true;

        loop {
            tokio::select! {
                outcome = &mut work => return outcome,
                _ = heartbeat.tick(), if owned => {
                    match self.jobs.touch_job(job.id, claim_id).await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(task_id = %task.id, "Job was reclaimed while generating");
                            owned = false;
                        }
                        Err(e) => warn!(task_id = %task.id, error = %e, "Failed to refresh job heartbeat"),
                    }
                }
            }
        }
    }

    /// Never fails; errors are folded into [`TaskOutcome::Failed`].
    async fn process_task(&self, job: &BulkJob, task: &BulkTask) -> TaskOutcome {
        let start = Instant::now();

        match self.generate_for_employee(job, task).await {
            Ok((result, notice)) => {
                metrics::histogram!("bulk_task_generation_seconds")
                    .record(start.elapsed().as_secs_f64());
                info!(
                    task_id = %task.id,
                    employee_id = %task.employee_id,
                    course_id = %result.course_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Course generated"
                );
                TaskOutcome::Completed { result, notice }
            }
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    employee_id = %task.employee_id,
                    error = %e,
                    "Task failed"
                );
                TaskOutcome::Failed(e.to_string())
            }
        }
    }

    async fn generate_for_employee(
        &self,
        job: &BulkJob,
        task: &BulkTask,
    ) -> Result<(TaskResult, AssignmentNotice), TaskError> {
        let profile = self
            .employees
            .employee_profile(task.employee_id)
            .await
            .map_err(TaskError::ProfileFetch)?
            .ok_or(TaskError::EmployeeNotFound(task.employee_id))?;

        let request = personalization::personalize(job, &profile);
        let content = self.backend.generate(&request).await?;

        let course_id = self
            .courses
            .create_course(&NewCourse {
                title: request.title.clone(),
                description: request.description.clone(),
                difficulty_level: request.difficulty_level,
                content_id: content.content_id.clone(),
                created_by: job.created_by,
                bulk_job_id: job.id,
            })
            .await
            .map_err(TaskError::Persistence)?;

        let enrollment = NewEnrollment {
            employee_id: task.employee_id,
            course_id,
            content_id: content.content_id.clone(),
        };
        let enrollment_id = match self.courses.enroll(&enrollment).await {
            Ok(id) => id,
            Err(e) => {
                self.withdraw(task, course_id).await;
                return Err(TaskError::Persistence(e));
            }
        };

        let notice = AssignmentNotice {
            employee_id: task.employee_id,
            course_id,
            title: request.title,
        };
        let result = TaskResult {
            content_id: content.content_id,
            course_id,
            enrollment_id,
        };
        Ok((result, notice))
    }

    /// Returns `false` when the claim no longer owns the job.
    async fn finish(&self, job_id: Uuid, claim_id: Uuid, status: JobStatus) -> Result<bool, ProcessorError> {
        let applied = self
            .jobs
            .finish_job(job_id, claim_id, status)
            .await
            .map_err(|source| ProcessorError::Finish {
                job_id,
                status,
                source,
            })?;
        if applied {
            metrics::counter!("bulk_jobs_finished_total", "status" => status.to_string()).increment(1);
        }
        Ok(applied)
    }
}

fn heartbeat_period(claim_lease: Duration) -> std::time::Duration {
    (claim_lease / 3).to_std().unwrap_or_default().max(MIN_HEARTBEAT)
}

fn superseded(job_id: Uuid) -> RunOutcome {
    warn!(job_id = %job_id, "Job was reclaimed by another processor, stopping");
    RunOutcome::Superseded
}
