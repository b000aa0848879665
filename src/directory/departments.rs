use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{Department, SuccessResponse};
use crate::shared::schema::{departments, employees};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<Department>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        Ok(departments::table
            .filter(departments::organization_id.eq(org_id))
            .order(departments::name.asc())
            .load::<Department>(conn)?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<Json<Department>, ServiceError> {
    auth.require_admin()?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Validation("Department name is required".into()));
    }

    let org_id = auth.organization_id;
    let department = blocking(&state.conn, move |conn| {
        let exists = diesel::dsl::select(diesel::dsl::exists(
            departments::table
                .filter(departments::organization_id.eq(org_id))
                .filter(departments::name.eq(&name)),
        ))
        .get_result::<bool>(conn)?;
        if exists {
            return Err(ServiceError::Conflict(format!(
                "Department '{}' already exists",
                name
            )));
        }

        let department = Department {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name,
            description: req.description,
            created_at: Utc::now(),
        };
        diesel::insert_into(departments::table)
            .values(&department)
            .execute(conn)?;
        Ok(department)
    })
    .await?;

    info!("Department {} created in org {}", department.id, org_id);
    Ok(Json(department))
}

pub async fn get_department(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>, ServiceError> {
    let org_id = auth.organization_id;
    let department = blocking(&state.conn, move |conn| {
        departments::table
            .filter(departments::id.eq(id))
            .filter(departments::organization_id.eq(org_id))
            .first::<Department>(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Department not found".into()))
    })
    .await?;
    Ok(Json(department))
}

pub async fn update_department(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<Department>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let department = blocking(&state.conn, move |conn| {
        let mut department: Department = departments::table
            .filter(departments::id.eq(id))
            .filter(departments::organization_id.eq(org_id))
            .first::<Department>(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Department not found".into()))?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::Validation("Department name is required".into()));
            }
            department.name = name;
        }
        if let Some(description) = req.description {
            department.description = Some(description);
        }

        diesel::update(departments::table.find(id))
            .set((
                departments::name.eq(&department.name),
                departments::description.eq(department.description.clone()),
            ))
            .execute(conn)?;
        Ok(department)
    })
    .await?;
    Ok(Json(department))
}

pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        let found = departments::table
            .filter(departments::id.eq(id))
            .filter(departments::organization_id.eq(org_id))
            .count()
            .get_result::<i64>(conn)?;
        if found == 0 {
            return Err(ServiceError::NotFound("Department not found".into()));
        }

        let in_use = diesel::dsl::select(diesel::dsl::exists(
            employees::table
                .filter(employees::department_id.eq(id))
                .filter(employees::deleted_at.is_null()),
        ))
        .get_result::<bool>(conn)?;
        if in_use {
            return Err(ServiceError::Conflict(
                "Department still has employees assigned".into(),
            ));
        }

        diesel::delete(departments::table.find(id)).execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(Json(SuccessResponse::new("Department deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parse() {
        let json = r#"{"name": "Engineering", "description": "Product engineering"}"#;
        let req: CreateDepartmentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Engineering");
        assert_eq!(req.description.as_deref(), Some("Product engineering"));
    }

    #[test]
    fn test_update_request_fields_optional() {
        let req: UpdateDepartmentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_none());
        assert!(req.description.is_none());
    }
}
