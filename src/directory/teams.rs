use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{roles, Employee, SuccessResponse, Team, TeamMember};
use crate::shared::schema::{cycle_team_assignments, departments, employees, team_members, teams};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub employee_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub id: Uuid,
    pub name: String,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub manager_name: Option<String>,
    pub member_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TeamMemberResponse {
    pub employee_id: Uuid,
    pub name: String,
    pub email: String,
    pub position: Option<String>,
}

pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<TeamResponse>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        let team_rows: Vec<Team> = teams::table
            .filter(teams::organization_id.eq(org_id))
            .order(teams::name.asc())
            .load(conn)?;

        let manager_ids: Vec<Uuid> = team_rows.iter().filter_map(|t| t.manager_id).collect();
        let managers: HashMap<Uuid, String> = employees::table
            .filter(employees::id.eq_any(&manager_ids))
            .select((employees::id, employees::first_name, employees::last_name))
            .load::<(Uuid, String, String)>(conn)?
            .into_iter()
            .map(|(id, first, last)| (id, format!("{} {}", first, last)))
            .collect();

        let counts: HashMap<Uuid, i64> = team_members::table
            .inner_join(employees::table)
            .filter(employees::deleted_at.is_null())
            .group_by(team_members::team_id)
            .select((team_members::team_id, diesel::dsl::count_star()))
            .load::<(Uuid, i64)>(conn)?
            .into_iter()
            .collect();

        Ok(team_rows
            .into_iter()
            .map(|t| TeamResponse {
                manager_name: t.manager_id.and_then(|id| managers.get(&id).cloned()),
                member_count: counts.get(&t.id).copied().unwrap_or(0),
                id: t.id,
                name: t.name,
                department_id: t.department_id,
                manager_id: t.manager_id,
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateTeamRequest>,
) -> Result<Json<Team>, ServiceError> {
    auth.require_admin()?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Validation("Team name is required".into()));
    }

    let org_id = auth.organization_id;
    let team = blocking(&state.conn, move |conn| {
        let taken = diesel::dsl::select(diesel::dsl::exists(
            teams::table
                .filter(teams::organization_id.eq(org_id))
                .filter(teams::name.eq(&name)),
        ))
        .get_result::<bool>(conn)?;
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Team '{}' already exists",
                name
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
        if let Some(manager_id) = req.manager_id {
            check_manager(conn, manager_id, org_id)?;
        }

        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4(),
            organization_id: org_id,
            department_id: req.department_id,
            name,
            manager_id: req.manager_id,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(teams::table).values(&team).execute(conn)?;
        Ok(team)
    })
    .await?;

    info!("Team {} created in org {}", team.id, org_id);
    Ok(Json(team))
}

pub async fn get_team(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamResponse>, ServiceError> {
    let org_id = auth.organization_id;
    let team = blocking(&state.conn, move |conn| {
        let team = find_team(conn, id, org_id)?;
        let manager_name = match team.manager_id {
            Some(manager_id) => employees::table
                .filter(employees::id.eq(manager_id))
                .select((employees::first_name, employees::last_name))
                .first::<(String, String)>(conn)
                .optional()?
                .map(|(first, last)| format!("{} {}", first, last)),
            None => None,
        };
        let member_count: i64 = team_members::table
            .inner_join(employees::table)
            .filter(team_members::team_id.eq(id))
            .filter(employees::deleted_at.is_null())
            .count()
            .get_result(conn)?;
        Ok(TeamResponse {
            id: team.id,
            name: team.name,
            department_id: team.department_id,
            manager_id: team.manager_id,
            manager_name,
            member_count,
        })
    })
    .await?;
    Ok(Json(team))
}

pub async fn update_team(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let team = blocking(&state.conn, move |conn| {
        let mut team = find_team(conn, id, org_id)?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::Validation("Team name is required".into()));
            }
            team.name = name;
        }
        if let Some(department_id) = req.department_id {
            team.department_id = Some(department_id);
        }
        if let Some(manager_id) = req.manager_id {
            check_manager(conn, manager_id, org_id)?;
            team.manager_id = Some(manager_id);
        }
        team.updated_at = Utc::now();

        diesel::update(teams::table.find(id))
            .set((
                teams::name.eq(&team.name),
                teams::department_id.eq(team.department_id),
                teams::manager_id.eq(team.manager_id),
                teams::updated_at.eq(team.updated_at),
            ))
            .execute(conn)?;
        Ok(team)
    })
    .await?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        find_team(conn, id, org_id)?;

        let referenced = diesel::dsl::select(diesel::dsl::exists(
            cycle_team_assignments::table.filter(cycle_team_assignments::team_id.eq(id)),
        ))
        .get_result::<bool>(conn)?;
        if referenced {
            return Err(ServiceError::Conflict(
                "Team is referenced by evaluation cycles and cannot be deleted".into(),
            ));
        }

        diesel::delete(teams::table.find(id)).execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(Json(SuccessResponse::new("Team deleted")))
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TeamMemberResponse>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        find_team(conn, id, org_id)?;
        let members: Vec<Employee> = team_members::table
            .inner_join(employees::table)
            .filter(team_members::team_id.eq(id))
            .filter(employees::deleted_at.is_null())
            .select(employees::all_columns)
            .order(employees::last_name.asc())
            .load(conn)?;
        Ok(members
            .into_iter()
            .map(|e| TeamMemberResponse {
                employee_id: e.id,
                name: e.full_name(),
                email: e.email,
                position: e.position,
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        find_team(conn, id, org_id)?;

        let employee_ok = diesel::dsl::select(diesel::dsl::exists(
            employees::table
                .filter(employees::id.eq(req.employee_id))
                .filter(employees::organization_id.eq(org_id))
                .filter(employees::deleted_at.is_null()),
        ))
        .get_result::<bool>(conn)?;
        if !employee_ok {
            return Err(ServiceError::NotFound("Employee not found".into()));
        }

        let already = diesel::dsl::select(diesel::dsl::exists(
            team_members::table
                .filter(team_members::team_id.eq(id))
                .filter(team_members::employee_id.eq(req.employee_id)),
        ))
        .get_result::<bool>(conn)?;
        if already {
            return Err(ServiceError::Conflict(
                "Employee is already a member of this team".into(),
            ));
        }

        diesel::insert_into(team_members::table)
            .values(&TeamMember {
                id: Uuid::new_v4(),
                team_id: id,
                employee_id: req.employee_id,
                added_at: Utc::now(),
            })
            .execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(Json(SuccessResponse::new("Member added")))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path((id, employee_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        find_team(conn, id, org_id)?;
        let removed = diesel::delete(
            team_members::table
                .filter(team_members::team_id.eq(id))
                .filter(team_members::employee_id.eq(employee_id)),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(ServiceError::NotFound(
                "Employee is not a member of this team".into(),
            ));
        }
        Ok(())
    })
    .await?;

    Ok(Json(SuccessResponse::new("Member removed")))
}

fn find_team(conn: &mut PgConnection, id: Uuid, org_id: Uuid) -> Result<Team, ServiceError> {
    teams::table
        .filter(teams::id.eq(id))
        .filter(teams::organization_id.eq(org_id))
        .first::<Team>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Team not found".into()))
}

fn check_manager(conn: &mut PgConnection, manager_id: Uuid, org_id: Uuid) -> Result<(), ServiceError> {
    let role: Option<String> = employees::table
        .filter(employees::id.eq(manager_id))
        .filter(employees::organization_id.eq(org_id))
        .filter(employees::deleted_at.is_null())
        .select(employees::role)
        .first(conn)
        .optional()?;
    match role {
        None => Err(ServiceError::NotFound("Manager not found".into())),
        Some(role) if role != roles::LINE_MANAGER => Err(ServiceError::Validation(
            "Assigned manager must have the line-manager role".into(),
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parse() {
        let json = r#"{"name": "Platform", "manager_id": null}"#;
        let req: CreateTeamRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Platform");
        assert!(req.manager_id.is_none());
    }

    #[test]
    fn test_add_member_request_parse() {
        let json = r#"{"employee_id": "123e4567-e89b-12d3-a456-426614174000"}"#;
        let req: AddMemberRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req.employee_id.to_string(),
            "123e4567-e89b-12d3-a456-426614174000"
        );
    }
}
