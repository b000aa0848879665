use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{Parameter, SuccessResponse};
use crate::shared::schema::{matrix_parameters, parameters};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateParameterRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParameterRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Organization parameters plus the global (unowned) catalogue.
pub async fn list_parameters(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<Parameter>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        Ok(parameters::table
            .filter(
                parameters::organization_id
                    .eq(org_id)
                    .or(parameters::organization_id.is_null()),
            )
            .order(parameters::name.asc())
            .load::<Parameter>(conn)?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn create_parameter(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateParameterRequest>,
) -> Result<Json<Parameter>, ServiceError> {
    auth.require_admin()?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Validation("Parameter name is required".into()));
    }

    let org_id = auth.organization_id;
    let parameter = blocking(&state.conn, move |conn| {
        let taken = diesel::dsl::select(diesel::dsl::exists(
            parameters::table
                .filter(parameters::organization_id.eq(org_id))
                .filter(parameters::name.eq(&name)),
        ))
        .get_result::<bool>(conn)?;
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Parameter '{}' already exists",
                name
            )));
        }

        let parameter = Parameter {
            id: Uuid::new_v4(),
            organization_id: Some(org_id),
            name,
            description: req.description,
            created_at: Utc::now(),
        };
        diesel::insert_into(parameters::table)
            .values(&parameter)
            .execute(conn)?;
        Ok(parameter)
    })
    .await?;

    Ok(Json(parameter))
}

pub async fn update_parameter(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateParameterRequest>,
) -> Result<Json<Parameter>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let parameter = blocking(&state.conn, move |conn| {
        // Global parameters are read-only for tenants.
        let mut parameter: Parameter = parameters::table
            .filter(parameters::id.eq(id))
            .filter(parameters::organization_id.eq(org_id))
            .first::<Parameter>(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Parameter not found".into()))?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::Validation("Parameter name is required".into()));
            }
            parameter.name = name;
        }
        if let Some(description) = req.description {
            parameter.description = Some(description);
        }

        diesel::update(parameters::table.find(id))
            .set((
                parameters::name.eq(&parameter.name),
                parameters::description.eq(parameter.description.clone()),
            ))
            .execute(conn)?;
        Ok(parameter)
    })
    .await?;
    Ok(Json(parameter))
}

pub async fn delete_parameter(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        let found = parameters::table
            .filter(parameters::id.eq(id))
            .filter(parameters::organization_id.eq(org_id))
            .count()
            .get_result::<i64>(conn)?;
        if found == 0 {
            return Err(ServiceError::NotFound("Parameter not found".into()));
        }

        let in_use = diesel::dsl::select(diesel::dsl::exists(
            matrix_parameters::table.filter(matrix_parameters::parameter_id.eq(id)),
        ))
        .get_result::<bool>(conn)?;
        if in_use {
            return Err(ServiceError::Conflict(
                "Parameter is used by one or more matrices".into(),
            ));
        }

        diesel::delete(parameters::table.find(id)).execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(Json(SuccessResponse::new("Parameter deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parse() {
        let json = r#"{"name": "Code Quality", "description": "Review rigor and defect rate"}"#;
        let req: CreateParameterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Code Quality");
    }
}
