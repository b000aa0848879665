use crate::shared::schema::{
    departments, employees, notifications, organizations, parameters, team_members, teams,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Employee roles. Stored as text; every role check goes through these
/// constants.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const LINE_MANAGER: &str = "line-manager";
    pub const STAFF: &str = "staff";

    pub fn is_valid(role: &str) -> bool {
        matches!(role, ADMIN | LINE_MANAGER | STAFF)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = organizations)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = employees)]
pub struct Employee {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub department_id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub position: Option<String>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Employee as exposed over the API; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeProfile {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub department_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub position: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Employee> for EmployeeProfile {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            organization_id: e.organization_id,
            department_id: e.department_id,
            email: e.email,
            first_name: e.first_name,
            last_name: e.last_name,
            role: e.role,
            position: e.position,
            is_active: e.is_active,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub department_id: Option<Uuid>,
    pub name: String,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = team_members)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub employee_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = parameters)]
pub struct Parameter {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub recipient_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub action_url: Option<String>,
    pub priority: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_validation() {
        assert!(roles::is_valid("admin"));
        assert!(roles::is_valid("line-manager"));
        assert!(roles::is_valid("staff"));
        assert!(!roles::is_valid("superuser"));
        assert!(!roles::is_valid("Admin"));
    }

    #[test]
    fn test_profile_drops_password_hash() {
        let employee = Employee {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            department_id: None,
            email: "jo@example.com".into(),
            password_hash: "secret-hash".into(),
            first_name: "Jo".into(),
            last_name: "Silva".into(),
            role: roles::STAFF.into(),
            position: None,
            is_active: true,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile = EmployeeProfile::from(employee);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("jo@example.com"));
    }
}
