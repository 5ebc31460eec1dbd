use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::bulk::TaskView;
use crate::models::employee::EmployeeSummary;
use crate::models::job::{BulkJob, BulkTask, JobProgress, JobStatus, NewBulkJob, TaskResult};

const JOB_COLUMNS: &str = r#"
    id, group_type, group_id, title, description, difficulty_level, send_notifications,
    status, total_count, completed_count, failed_count, created_by,
    created_at, started_at, updated_at, completed_at
"#;

const TASK_COLUMNS: &str = r#"
    t.id, t.job_id, t.employee_id, t.sequence, t.status, t.content_id, t.course_id,
    t.error_message, t.created_at, t.completed_at
"#;

fn parse_enum<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn job_from_row(row: &PgRow) -> Result<BulkJob, sqlx::Error> {
    Ok(BulkJob {
        id: row.try_get("id")?,
        group_type: parse_enum(row, "group_type")?,
        group_id: row.try_get("group_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        difficulty_level: parse_enum(row, "difficulty_level")?,
        send_notifications: row.try_get("send_notifications")?,
        status: parse_enum(row, "status")?,
        total_count: row.try_get("total_count")?,
        completed_count: row.try_get("completed_count")?,
        failed_count: row.try_get("failed_count")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<BulkTask, sqlx::Error> {
    Ok(BulkTask {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        employee_id: row.try_get("employee_id")?,
        sequence: row.try_get("sequence")?,
        status: parse_enum(row, "status")?,
        content_id: row.try_get("content_id")?,
        course_id: row.try_get("course_id")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Insert a new bulk generation job in `pending` state
pub async fn create_job(pool: &PgPool, job: &NewBulkJob) -> Result<BulkJob, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO bulk_generation_jobs
            (group_type, group_id, title, description, difficulty_level,
             send_notifications, status, total_count, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
        RETURNING {JOB_COLUMNS}
        "#
    );

    let row = sqlx::query(&sql)
        .bind(job.group_type.as_ref())
        .bind(job.group_id)
        .bind(&job.title)
        .bind(job.description.as_deref())
        .bind(job.difficulty_level.as_ref())
        .bind(job.send_notifications)
        .bind(job.total_count)
        .bind(job.created_by)
        .fetch_one(pool)
        .await?;

    job_from_row(&row)
}

/// Insert one pending task per employee in a single statement.
/// `sequence` follows the order of `employee_ids`.
pub async fn create_tasks(
    pool: &PgPool,
    job_id: Uuid,
    employee_ids: &[Uuid],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO bulk_generation_tasks (job_id, employee_id, sequence, status)
        SELECT $1, e.employee_id, e.ord::INT, 'pending'
        FROM UNNEST($2::UUID[]) WITH ORDINALITY AS e(employee_id, ord)
        "#,
    )
    .bind(job_id)
    .bind(employee_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete a job; its tasks cascade
pub async fn delete_job(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM bulk_generation_jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Get a job by ID only if `creator` created it
pub async fn get_job_for_creator(
    pool: &PgPool,
    job_id: Uuid,
    creator: Uuid,
) -> Result<Option<BulkJob>, sqlx::Error> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM bulk_generation_jobs WHERE id = $1 AND created_by = $2"
    );
    let row = sqlx::query(&sql)
        .bind(job_id)
        .bind(creator)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Claim a job for processing under `claim_id`. Succeeds for pending jobs
/// and for processing jobs whose heartbeat is older than `stale_before`.
pub async fn claim_job(
    pool: &PgPool,
    job_id: Uuid,
    claim_id: Uuid,
    stale_before: DateTime<Utc>,
) -> Result<Option<BulkJob>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE bulk_generation_jobs
        SET status = 'processing',
            claim_id = $2,
            started_at = COALESCE(started_at, NOW()),
            updated_at = NOW()
        WHERE id = $1
          AND (status = 'pending' OR (status = 'processing' AND updated_at < $3))
        RETURNING {JOB_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(job_id)
        .bind(claim_id)
        .bind(stale_before)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Refresh the heartbeat of a job still owned by `claim_id`
pub async fn touch_job(pool: &PgPool, job_id: Uuid, claim_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bulk_generation_jobs
        SET updated_at = NOW()
        WHERE id = $1 AND claim_id = $2 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(claim_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Tasks of a job in the given status, in processing order
pub async fn get_tasks_by_status(
    pool: &PgPool,
    job_id: Uuid,
    status: &str,
) -> Result<Vec<BulkTask>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM bulk_generation_tasks t
        WHERE t.job_id = $1 AND t.status = $2
        ORDER BY t.sequence ASC, t.id ASC
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(job_id)
        .bind(status)
        .fetch_all(pool)
        .await?;

    rows.iter().map(task_from_row).collect()
}

/// Move a task from pending to processing while `claim_id` owns its job,
/// refreshing the job heartbeat. Returns whether the task was started.
pub async fn start_task(
    pool: &PgPool,
    job_id: Uuid,
    claim_id: Uuid,
    task_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        WITH owner AS (
            UPDATE bulk_generation_jobs
            SET updated_at = NOW()
            WHERE id = $1 AND claim_id = $2 AND status = 'processing'
            RETURNING id
        )
        UPDATE bulk_generation_tasks
        SET status = 'processing', started_at = NOW()
        WHERE id = $3
          AND job_id IN (SELECT id FROM owner)
          AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .bind(claim_id)
    .bind(task_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a processing task completed with its result references
pub async fn complete_task(
    pool: &PgPool,
    task_id: Uuid,
    result: &TaskResult,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE bulk_generation_tasks
        SET status = 'completed',
            content_id = $2,
            course_id = $3,
            enrollment_id = $4,
            error_message = NULL,
            completed_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(task_id)
    .bind(&result.content_id)
    .bind(result.course_id)
    .bind(result.enrollment_id)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Mark a processing task failed
pub async fn fail_task(pool: &PgPool, task_id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE bulk_generation_tasks
        SET status = 'failed',
            error_message = $2,
            completed_at = NOW()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(task_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Recount completed and failed tasks into the job row and refresh the
/// heartbeat. Returns `None` when `claim_id` no longer owns the job.
pub async fn sync_job_counts(
    pool: &PgPool,
    job_id: Uuid,
    claim_id: Uuid,
) -> Result<Option<JobProgress>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE bulk_generation_jobs j
        SET completed_count = c.completed,
            failed_count = c.failed,
            updated_at = NOW()
        FROM (
            SELECT COUNT(*) FILTER (WHERE status = 'completed')::INT AS completed,
                   COUNT(*) FILTER (WHERE status = 'failed')::INT AS failed
            FROM bulk_generation_tasks
            WHERE job_id = $1
        ) c
        WHERE j.id = $1 AND j.claim_id = $2 AND j.status = 'processing'
        RETURNING j.completed_count, j.failed_count
        "#,
    )
    .bind(job_id)
    .bind(claim_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(JobProgress {
            completed: r.try_get("completed_count")?,
            failed: r.try_get("failed_count")?,
        })
    })
    .transpose()
}

/// Move a job owned by `claim_id` to a terminal status
pub async fn finish_job(
    pool: &PgPool,
    job_id: Uuid,
    claim_id: Uuid,
    status: JobStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bulk_generation_jobs
        SET status = $3,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND claim_id = $2 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(claim_id)
    .bind(status.as_ref())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// All tasks of a job joined with employee display fields
pub async fn list_tasks(pool: &PgPool, job_id: Uuid) -> Result<Vec<TaskView>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS},
               e.id AS employee_ref, e.name AS employee_name, e.email AS employee_email
        FROM bulk_generation_tasks t
        LEFT JOIN hr_employees e ON e.id = t.employee_id
        WHERE t.job_id = $1
        ORDER BY t.sequence ASC, t.id ASC
        "#
    );
    let rows = sqlx::query(&sql).bind(job_id).fetch_all(pool).await?;

    rows.iter()
        .map(|r| {
            let employee_ref: Option<Uuid> = r.try_get("employee_ref")?;
            let employee = match employee_ref {
                Some(id) => Some(EmployeeSummary {
                    id,
                    name: r.try_get("employee_name")?,
                    email: r.try_get("employee_email")?,
                }),
                None => None,
            };
            Ok(TaskView {
                task: task_from_row(r)?,
                employee,
            })
        })
        .collect()
}
