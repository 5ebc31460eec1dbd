use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{course_queries, employee_queries, queries};
use crate::models::bulk::TaskView;
use crate::models::course::{AssignmentNotice, NewCourse, NewEnrollment};
use crate::models::employee::EmployeeProfile;
use crate::models::job::{
    BulkJob, BulkTask, GroupType, JobProgress, JobStatus, NewBulkJob, TaskResult, TaskStatus,
};
use crate::services::store::{CourseCatalog, EmployeeDirectory, JobStore, StoreError};

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, job: &NewBulkJob) -> Result<BulkJob, StoreError> {
        Ok(queries::create_job(&self.pool, job).await?)
    }

    async fn create_tasks(&self, job_id: Uuid, employee_ids: &[Uuid]) -> Result<u64, StoreError> {
        Ok(queries::create_tasks(&self.pool, job_id, employee_ids).await?)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        Ok(queries::delete_job(&self.pool, job_id).await?)
    }

    async fn find_job_for_creator(
        &self,
        job_id: Uuid,
        creator: Uuid,
    ) -> Result<Option<BulkJob>, StoreError> {
        Ok(queries::get_job_for_creator(&self.pool, job_id, creator).await?)
    }

    async fn claim_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<BulkJob>, StoreError> {
        Ok(queries::claim_job(&self.pool, job_id, claim_id, stale_before).await?)
    }

    async fn touch_job(&self, job_id: Uuid, claim_id: Uuid) -> Result<bool, StoreError> {
        Ok(queries::touch_job(&self.pool, job_id, claim_id).await?)
    }

    async fn pending_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError> {
        Ok(queries::get_tasks_by_status(&self.pool, job_id, TaskStatus::Pending.as_ref()).await?)
    }

    async fn interrupted_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError> {
        Ok(
            queries::get_tasks_by_status(&self.pool, job_id, TaskStatus::Processing.as_ref())
                .await?,
        )
    }

    async fn start_task(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        task_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(queries::start_task(&self.pool, job_id, claim_id, task_id).await?)
    }

    async fn complete_task(&self, task_id: Uuid, result: &TaskResult) -> Result<bool, StoreError> {
        Ok(queries::complete_task(&self.pool, task_id, result).await?)
    }

    async fn fail_task(&self, task_id: Uuid, error: &str) -> Result<bool, StoreError> {
        Ok(queries::fail_task(&self.pool, task_id, error).await?)
    }

    async fn sync_job_counts(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
    ) -> Result<Option<JobProgress>, StoreError> {
        Ok(queries::sync_job_counts(&self.pool, job_id, claim_id).await?)
    }

    async fn finish_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        status: JobStatus,
    ) -> Result<bool, StoreError> {
        Ok(queries::finish_job(&self.pool, job_id, claim_id, status).await?)
    }

    async fn list_tasks(&self, job_id: Uuid) -> Result<Vec<TaskView>, StoreError> {
        Ok(queries::list_tasks(&self.pool, job_id).await?)
    }
}

#[async_trait]
impl EmployeeDirectory for PgStore {
    async fn active_employees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        Ok(employee_queries::active_by_ids(&self.pool, ids).await?)
    }

    async fn active_employees_in_group(
        &self,
        group_type: GroupType,
        group_id: Uuid,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(employee_queries::active_in_group(&self.pool, group_type, group_id).await?)
    }

    async fn employee_profile(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<EmployeeProfile>, StoreError> {
        Ok(employee_queries::get_profile(&self.pool, employee_id).await?)
    }
}

#[async_trait]
impl CourseCatalog for PgStore {
    async fn create_course(&self, course: &NewCourse) -> Result<Uuid, StoreError> {
        Ok(course_queries::create_course(&self.pool, course).await?)
    }

    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Uuid, StoreError> {
        Ok(course_queries::create_enrollment(&self.pool, enrollment).await?)
    }

    async fn notify_assignment(&self, notice: &AssignmentNotice) -> Result<(), StoreError> {
        Ok(course_queries::create_notification(&self.pool, notice).await?)
    }

    async fn withdraw_course(&self, course_id: Uuid) -> Result<(), StoreError> {
        Ok(course_queries::withdraw_course(&self.pool, course_id).await?)
    }
}
