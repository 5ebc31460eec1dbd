use std::collections::HashSet;
use std::sync::Arc;

use garde::Validate;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::bulk::BulkGenerationRequest;
use crate::models::job::NewBulkJob;
use crate::services::queue::{JobScheduler, QueueError};
use crate::services::status::estimated_minutes;
use crate::services::store::{EmployeeDirectory, JobStore, StoreError};

/// Minimum title length after trimming.
const MIN_TITLE_CHARS: usize = 3;

/// What the caller gets back once a job is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub job_id: Uuid,
    pub total_employees: usize,
    pub estimated_time_minutes: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("No active employees found for the selected group")]
    NoEmployees,

    #[error("Failed to resolve employees: {0}")]
    Resolution(#[source] StoreError),

    #[error("Failed to create job: {0}")]
    JobCreation(#[source] StoreError),

    #[error("Failed to create tasks for job {job_id}: {source}")]
    TaskCreation {
        job_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("Failed to schedule job {job_id}: {source}")]
    Schedule {
        job_id: Uuid,
        #[source]
        source: QueueError,
    },

    /// Setup failed and the half-created job could not be deleted; it is
    /// left orphaned in the store.
    #[error("{cause}; deleting job {job_id} also failed: {source}")]
    RollbackFailed {
        job_id: Uuid,
        cause: Box<SubmissionError>,
        #[source]
        source: StoreError,
    },
}

/// Validates bulk requests, creates the job with its tasks and schedules
/// processing.
pub struct SubmissionService {
    jobs: Arc<dyn JobStore>,
    employees: Arc<dyn EmployeeDirectory>,
    scheduler: Arc<dyn JobScheduler>,
    per_task_minutes: f64,
}

impl SubmissionService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        employees: Arc<dyn EmployeeDirectory>,
        scheduler: Arc<dyn JobScheduler>,
        per_task_minutes: f64,
    ) -> Self {
        Self {
            jobs,
            employees,
            scheduler,
            per_task_minutes,
        }
    }

    /// Accept a bulk generation request on behalf of `creator`.
    ///
    /// Either the job, all of its tasks and the scheduled run exist when this
    /// returns `Ok`, or nothing was left behind.
    pub async fn submit(
        &self,
        request: BulkGenerationRequest,
        creator: Uuid,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        request
            .validate()
            .map_err(|report| SubmissionError::Invalid(report.to_string()))?;

        let title = request.title.trim().to_string();
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(SubmissionError::Invalid(format!(
                "title: length is lower than {}",
                MIN_TITLE_CHARS
            )));
        }

        let employee_ids = self.resolve_employees(&request).await?;
        if employee_ids.is_empty() {
            warn!(
                group_type = %request.group_type,
                group_id = %request.group_id,
                "Bulk generation requested for an empty employee set"
            );
            return Err(SubmissionError::NoEmployees);
        }

        let total = employee_ids.len();
        let new_job = NewBulkJob {
            group_type: request.group_type,
            group_id: request.group_id,
            title,
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            difficulty_level: request.difficulty_level,
            send_notifications: request.should_send_notifications.unwrap_or(false),
            total_count: total as i32,
            created_by: creator,
        };

        let job = self
            .jobs
            .create_job(&new_job)
            .await
            .map_err(SubmissionError::JobCreation)?;

        if let Err(source) = self.jobs.create_tasks(job.id, &employee_ids).await {
            error!(job_id = %job.id, error = %source, "Task creation failed, rolling back job");
            let cause = SubmissionError::TaskCreation {
                job_id: job.id,
                source,
            };
            return Err(self.roll_back(job.id, cause).await);
        }

        if let Err(source) = self.scheduler.schedule(job.id).await {
            error!(job_id = %job.id, error = %source, "Scheduling failed, rolling back job");
            let cause = SubmissionError::Schedule {
                job_id: job.id,
                source,
            };
            return Err(self.roll_back(job.id, cause).await);
        }

        metrics::counter!("bulk_jobs_submitted_total").increment(1);
        info!(
            job_id = %job.id,
            creator = %creator,
            total_employees = total,
            "Bulk generation job submitted"
        );

        Ok(SubmissionReceipt {
            job_id: job.id,
            total_employees: total,
            estimated_time_minutes: estimated_minutes(total, self.per_task_minutes),
        })
    }

    async fn resolve_employees(
        &self,
        request: &BulkGenerationRequest,
    ) -> Result<Vec<Uuid>, SubmissionError> {
        match request.employee_ids.as_deref() {
            Some(ids) if !ids.is_empty() => {
                let requested = dedup_in_order(ids);
                let active: HashSet<Uuid> = self
                    .employees
                    .active_employees_by_ids(&requested)
                    .await
                    .map_err(SubmissionError::Resolution)?
                    .into_iter()
                    .collect();

                if active.len() < requested.len() {
                    warn!(
                        requested = requested.len(),
                        active = active.len(),
                        "Dropping inactive or unknown employees from explicit selection"
                    );
                }

                Ok(requested.into_iter().filter(|id| active.contains(id)).collect())
            }
            _ => self
                .employees
                .active_employees_in_group(request.group_type, request.group_id)
                .await
                .map_err(SubmissionError::Resolution),
        }
    }

    /// Compensating delete for a job whose setup did not finish. Returns the
    /// error to report, widened when the delete itself fails.
    async fn roll_back(&self, job_id: Uuid, cause: SubmissionError) -> SubmissionError {
        match self.jobs.delete_job(job_id).await {
            Ok(()) => cause,
            Err(source) => {
                error!(job_id = %job_id, error = %source, "Failed to delete job during rollback, job is orphaned");
                SubmissionError::RollbackFailed {
                    job_id,
                    cause: Box::new(cause),
                    source,
                }
            }
        }
    }
}

fn dedup_in_order(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
