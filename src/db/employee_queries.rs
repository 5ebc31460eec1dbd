use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::employee::EmployeeProfile;
use crate::models::job::GroupType;

/// Active employees among `ids`
pub async fn active_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id
        FROM hr_employees
        WHERE id = ANY($1) AND status = 'active'
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|r| r.try_get("id")).collect()
}

/// Active employees of a department or position, ordered by name
pub async fn active_in_group(
    pool: &PgPool,
    group_type: GroupType,
    group_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let sql = match group_type {
        GroupType::Department => {
            r#"
            SELECT id FROM hr_employees
            WHERE department_id = $1 AND status = 'active'
            ORDER BY name ASC, id ASC
            "#
        }
        GroupType::Position => {
            r#"
            SELECT id FROM hr_employees
            WHERE position_id = $1 AND status = 'active'
            ORDER BY name ASC, id ASC
            "#
        }
    };

    let rows = sqlx::query(sql).bind(group_id).fetch_all(pool).await?;
    rows.iter().map(|r| r.try_get("id")).collect()
}

/// Personalization profile for one employee
pub async fn get_profile(
    pool: &PgPool,
    employee_id: Uuid,
) -> Result<Option<EmployeeProfile>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT e.id, e.name, e.email, e.experience, e.skills,
               d.name AS department, p.title AS position
        FROM hr_employees e
        LEFT JOIN hr_departments d ON d.id = e.department_id
        LEFT JOIN hr_positions p ON p.id = e.position_id
        WHERE e.id = $1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(r) => Some(EmployeeProfile {
            id: r.try_get("id")?,
            name: r.try_get("name")?,
            email: r.try_get("email")?,
            department: r.try_get("department")?,
            position: r.try_get("position")?,
            experience: r.try_get("experience")?,
            skills: r.try_get("skills")?,
        }),
        None => None,
    })
}
