use crate::security::password::hash_password;
use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{roles, Employee, EmployeeProfile, SuccessResponse};
use crate::shared::schema::{departments, employees};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeQuery {
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    pub search: Option<String>,
}

pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<Vec<EmployeeProfile>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        let mut q = employees::table
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .into_boxed();

        if let Some(role) = query.role {
            q = q.filter(employees::role.eq(role));
        }
        if let Some(department_id) = query.department_id {
            q = q.filter(employees::department_id.eq(department_id));
        }
        if let Some(search) = query.search {
            let pattern = format!("%{search}%");
            q = q.filter(
                employees::first_name
                    .ilike(pattern.clone())
                    .or(employees::last_name.ilike(pattern.clone()))
                    .or(employees::email.ilike(pattern)),
            );
        }

        Ok(q.order((employees::last_name.asc(), employees::first_name.asc()))
            .load::<Employee>(conn)?)
    })
    .await?;

    Ok(Json(rows.into_iter().map(EmployeeProfile::from).collect()))
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<Json<EmployeeProfile>, ServiceError> {
    auth.require_admin()?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation("A valid email is required".into()));
    }
    if req.password.len() < 8 {
        return Err(ServiceError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if !roles::is_valid(&req.role) {
        return Err(ServiceError::Validation(format!(
            "Unknown role '{}'",
            req.role
        )));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ServiceError::Validation("First and last name are required".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let org_id = auth.organization_id;

    let employee = blocking(&state.conn, move |conn| {
        let taken = diesel::dsl::select(diesel::dsl::exists(
            employees::table.filter(employees::email.eq(&email)),
        ))
        .get_result::<bool>(conn)?;
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        if let Some(department_id) = req.department_id {
            let dept_ok = diesel::dsl::select(diesel::dsl::exists(
                departments::table
                    .filter(departments::id.eq(department_id))
                    .filter(departments::organization_id.eq(org_id)),
            ))
            .get_result::<bool>(conn)?;
            if !dept_ok {
                return Err(ServiceError::NotFound("Department not found".into()));
            }
        }

        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4(),
            organization_id: org_id,
            department_id: req.department_id,
            email,
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role: req.role,
            position: req.position,
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(employees::table)
            .values(&employee)
            .execute(conn)?;
        Ok(employee)
    })
    .await?;

    info!("Employee {} created in org {}", employee.id, org_id);
    Ok(Json(employee.into()))
}

pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeProfile>, ServiceError> {
    let org_id = auth.organization_id;
    let employee = blocking(&state.conn, move |conn| {
        find_employee(conn, id, org_id)
    })
    .await?;
    Ok(Json(employee.into()))
}

pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEmployeeRequest>,
) -> Result<Json<EmployeeProfile>, ServiceError> {
    auth.require_admin()?;

    if let Some(ref role) = req.role {
        if !roles::is_valid(role) {
            return Err(ServiceError::Validation(format!("Unknown role '{}'", role)));
        }
    }
    let password_hash = match req.password {
        Some(ref password) if password.len() < 8 => {
            return Err(ServiceError::Validation(
                "Password must be at least 8 characters".into(),
            ))
        }
        Some(ref password) => Some(hash_password(password)?),
        None => None,
    };

    let org_id = auth.organization_id;
    let employee = blocking(&state.conn, move |conn| {
        let mut employee = find_employee(conn, id, org_id)?;

        if let Some(first_name) = req.first_name {
            employee.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = req.last_name {
            employee.last_name = last_name.trim().to_string();
        }
        if let Some(role) = req.role {
            employee.role = role;
        }
        if let Some(department_id) = req.department_id {
            let dept_ok = diesel::dsl::select(diesel::dsl::exists(
                departments::table
                    .filter(departments::id.eq(department_id))
                    .filter(departments::organization_id.eq(org_id)),
            ))
            .get_result::<bool>(conn)?;
            if !dept_ok {
                return Err(ServiceError::NotFound("Department not found".into()));
            }
            employee.department_id = Some(department_id);
        }
        if let Some(position) = req.position {
            employee.position = Some(position);
        }
        if let Some(is_active) = req.is_active {
            employee.is_active = is_active;
        }
        if let Some(password_hash) = password_hash {
            employee.password_hash = password_hash;
        }
        employee.updated_at = Utc::now();

        diesel::update(employees::table.find(id))
            .set((
                employees::first_name.eq(&employee.first_name),
                employees::last_name.eq(&employee.last_name),
                employees::role.eq(&employee.role),
                employees::department_id.eq(employee.department_id),
                employees::position.eq(employee.position.clone()),
                employees::is_active.eq(employee.is_active),
                employees::password_hash.eq(&employee.password_hash),
                employees::updated_at.eq(employee.updated_at),
            ))
            .execute(conn)?;
        Ok(employee)
    })
    .await?;

    Ok(Json(employee.into()))
}

/// Soft delete: the row stays (history references it), listings and auth
/// treat it as gone.
pub async fn delete_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    if auth.id == id {
        return Err(ServiceError::Validation(
            "You cannot delete your own account".into(),
        ));
    }

    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        find_employee(conn, id, org_id)?;
        diesel::update(employees::table.find(id))
            .set((
                employees::deleted_at.eq(Some(Utc::now())),
                employees::is_active.eq(false),
                employees::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Employee {} soft-deleted", id);
    Ok(Json(SuccessResponse::new("Employee deleted")))
}

fn find_employee(
    conn: &mut PgConnection,
    id: Uuid,
    org_id: Uuid,
) -> Result<Employee, ServiceError> {
    employees::table
        .filter(employees::id.eq(id))
        .filter(employees::organization_id.eq(org_id))
        .filter(employees::deleted_at.is_null())
        .first::<Employee>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Employee not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parse() {
        let json = r#"{
            "email": "ana@example.com",
            "password": "s3cret-pass",
            "first_name": "Ana",
            "last_name": "Lima",
            "role": "line-manager"
        }"#;
        let req: CreateEmployeeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.role, "line-manager");
        assert!(req.department_id.is_none());
    }

    #[test]
    fn test_query_defaults() {
        let query: EmployeeQuery = serde_json::from_str("{}").unwrap();
        assert!(query.role.is_none());
        assert!(query.search.is_none());
    }
}
