use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::course::{AssignmentNotice, NewCourse, NewEnrollment};

/// Insert a generated course and return its id
pub async fn create_course(pool: &PgPool, course: &NewCourse) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO hr_courses
            (title, description, difficulty_level, content_id, created_by, bulk_job_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(course.difficulty_level.as_ref())
    .bind(&course.content_id)
    .bind(course.created_by)
    .bind(course.bulk_job_id)
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

/// Enroll an employee in a course
pub async fn create_enrollment(
    pool: &PgPool,
    enrollment: &NewEnrollment,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO hr_course_enrollments (employee_id, course_id, content_id, status, progress)
        VALUES ($1, $2, $3, 'assigned', 0)
        RETURNING id
        "#,
    )
    .bind(enrollment.employee_id)
    .bind(enrollment.course_id)
    .bind(&enrollment.content_id)
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

/// Record an in-app course assignment notification
pub async fn create_notification(
    pool: &PgPool,
    notice: &AssignmentNotice,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO hr_notifications (employee_id, course_id, title, message)
        VALUES ($1, $2, 'New course assigned', $3)
        "#,
    )
    .bind(notice.employee_id)
    .bind(notice.course_id)
    .bind(format!("You have been enrolled in \"{}\".", notice.title))
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a course with the enrollments and notifications that point at it
pub async fn withdraw_course(pool: &PgPool, course_id: Uuid) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM hr_notifications WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM hr_course_enrollments WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM hr_courses WHERE id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}
