use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Employee data used to personalize a generated course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub experience: Option<String>,
    pub skills: Vec<String>,
}

/// Minimal employee display fields returned alongside task status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
