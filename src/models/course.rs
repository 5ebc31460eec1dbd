use uuid::Uuid;

use super::job::DifficultyLevel;

/// Course row created for a successfully generated artifact.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub difficulty_level: DifficultyLevel,
    pub content_id: String,
    pub created_by: Uuid,
    pub bulk_job_id: Uuid,
}

/// Links an employee to a generated course.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub employee_id: Uuid,
    pub course_id: Uuid,
    pub content_id: String,
}

/// In-app notice that a course was assigned.
#[derive(Debug, Clone)]
pub struct AssignmentNotice {
    pub employee_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
}
