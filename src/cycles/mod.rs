//! Evaluation cycle workflow: draft → team assignment → activation →
//! scoring → close.
//!
//! Activation is the heavy step: it expands every (team member × matrix
//! parameter) pair into seeded evaluation rows inside one transaction, so a
//! failure anywhere leaves the cycle untouched.

use crate::evaluations::{build_evaluation_rows, Evaluation, EvaluationDetail, EvaluationStatusRow};
use crate::matrices::status as matrix_status;
use crate::notifications::NotificationTemplate;
use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::{roles, SuccessResponse};
use crate::shared::schema::{
    cycle_team_assignments, employees, evaluation_cycles, evaluation_details, evaluation_status,
    evaluations, matrix_parameters, performance_matrices, team_members, teams,
};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod status {
    pub const DRAFT: &str = "draft";
    pub const ACTIVE: &str = "active";
    pub const CLOSED: &str = "closed";
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = evaluation_cycles)]
pub struct EvaluationCycle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = cycle_team_assignments)]
pub struct CycleTeamAssignment {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub team_id: Uuid,
    pub matrix_id: Uuid,
    pub manager_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCycleRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCycleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTeamRequest {
    pub team_id: Uuid,
    pub matrix_id: Uuid,
    pub manager_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CycleSummary {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assignment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub matrix_id: Uuid,
    pub matrix_name: String,
    pub manager_id: Uuid,
    pub manager_name: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub success: bool,
    pub evaluations_created: usize,
    pub details_created: usize,
}

pub fn configure_cycle_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cycles", get(list_cycles))
        .route("/api/cycles", post(create_cycle))
        .route("/api/cycles/:id", get(get_cycle))
        .route("/api/cycles/:id", put(update_cycle))
        .route("/api/cycles/:id/assign-team", post(assign_team))
        .route("/api/cycles/:id/assignments", get(list_assignments))
        .route("/api/cycles/:id/activate", post(activate_cycle))
        .route("/api/cycles/:id/close", post(close_cycle))
}

pub fn validate_cycle_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ServiceError> {
    if end < start {
        return Err(ServiceError::Validation(
            "Cycle end date must not precede its start date".into(),
        ));
    }
    Ok(())
}

pub async fn list_cycles(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<CycleSummary>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        let cycles: Vec<EvaluationCycle> = evaluation_cycles::table
            .filter(evaluation_cycles::organization_id.eq(org_id))
            .order(evaluation_cycles::created_at.desc())
            .load(conn)?;

        let ids: Vec<Uuid> = cycles.iter().map(|c| c.id).collect();
        let counts: Vec<(Uuid, i64)> = cycle_team_assignments::table
            .filter(cycle_team_assignments::cycle_id.eq_any(&ids))
            .group_by(cycle_team_assignments::cycle_id)
            .select((cycle_team_assignments::cycle_id, diesel::dsl::count_star()))
            .load(conn)?;

        Ok(cycles
            .into_iter()
            .map(|c| CycleSummary {
                assignment_count: counts
                    .iter()
                    .find(|(id, _)| *id == c.id)
                    .map(|(_, n)| *n)
                    .unwrap_or(0),
                id: c.id,
                name: c.name,
                status: c.status,
                start_date: c.start_date,
                end_date: c.end_date,
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

pub async fn create_cycle(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateCycleRequest>,
) -> Result<Json<EvaluationCycle>, ServiceError> {
    auth.require_admin()?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Validation("Cycle name is required".into()));
    }
    validate_cycle_dates(req.start_date, req.end_date)?;

    let org_id = auth.organization_id;
    let created_by = auth.id;
    let cycle = blocking(&state.conn, move |conn| {
        let now = Utc::now();
        let cycle = EvaluationCycle {
            id: Uuid::new_v4(),
            organization_id: org_id,
            name,
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            status: status::DRAFT.to_string(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(evaluation_cycles::table)
            .values(&cycle)
            .execute(conn)?;
        Ok(cycle)
    })
    .await?;

    info!("Cycle {} created in org {}", cycle.id, org_id);
    Ok(Json(cycle))
}

pub async fn get_cycle(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationCycle>, ServiceError> {
    let org_id = auth.organization_id;
    let cycle = blocking(&state.conn, move |conn| find_cycle(conn, id, org_id)).await?;
    Ok(Json(cycle))
}

pub async fn update_cycle(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCycleRequest>,
) -> Result<Json<EvaluationCycle>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let cycle = blocking(&state.conn, move |conn| {
        let mut cycle = find_cycle(conn, id, org_id)?;
        if cycle.status != status::DRAFT {
            return Err(ServiceError::Conflict(
                "Only draft cycles can be edited".into(),
            ));
        }

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::Validation("Cycle name is required".into()));
            }
            cycle.name = name;
        }
        if let Some(description) = req.description {
            cycle.description = Some(description);
        }
        if let Some(start_date) = req.start_date {
            cycle.start_date = start_date;
        }
        if let Some(end_date) = req.end_date {
            cycle.end_date = end_date;
        }
        validate_cycle_dates(cycle.start_date, cycle.end_date)?;
        cycle.updated_at = Utc::now();

        diesel::update(evaluation_cycles::table.find(id))
            .set((
                evaluation_cycles::name.eq(&cycle.name),
                evaluation_cycles::description.eq(cycle.description.clone()),
                evaluation_cycles::start_date.eq(cycle.start_date),
                evaluation_cycles::end_date.eq(cycle.end_date),
                evaluation_cycles::updated_at.eq(cycle.updated_at),
            ))
            .execute(conn)?;
        Ok(cycle)
    })
    .await?;
    Ok(Json(cycle))
}

/// Attach a team + matrix + manager to a draft cycle. No evaluation rows
/// are created here; that happens at activation.
pub async fn assign_team(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTeamRequest>,
) -> Result<Json<CycleTeamAssignment>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;

    let (assignment, team_name, cycle_name) = blocking(&state.conn, move |conn| {
        let cycle = find_cycle(conn, id, org_id)?;
        if cycle.status != status::DRAFT {
            return Err(ServiceError::Conflict(
                "Teams can only be assigned while the cycle is a draft".into(),
            ));
        }

        let matrix_ok: Option<String> = performance_matrices::table
            .filter(performance_matrices::id.eq(req.matrix_id))
            .filter(performance_matrices::organization_id.eq(org_id))
            .select(performance_matrices::status)
            .first(conn)
            .optional()?;
        match matrix_ok {
            None => return Err(ServiceError::NotFound("Matrix not found".into())),
            Some(s) if !s.eq_ignore_ascii_case(matrix_status::ACTIVE) => {
                return Err(ServiceError::Validation(
                    "Only an active matrix can be assigned".into(),
                ))
            }
            Some(_) => {}
        }

        let team_name: String = teams::table
            .filter(teams::id.eq(req.team_id))
            .filter(teams::organization_id.eq(org_id))
            .select(teams::name)
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Team not found".into()))?;

        let manager_role: Option<String> = employees::table
            .filter(employees::id.eq(req.manager_id))
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .select(employees::role)
            .first(conn)
            .optional()?;
        match manager_role {
            None => return Err(ServiceError::NotFound("Manager not found".into())),
            Some(role) if role != roles::LINE_MANAGER => {
                return Err(ServiceError::Validation(
                    "Assigned manager must have the line-manager role".into(),
                ))
            }
            Some(_) => {}
        }

        let already = diesel::dsl::select(diesel::dsl::exists(
            cycle_team_assignments::table
                .filter(cycle_team_assignments::cycle_id.eq(id))
                .filter(cycle_team_assignments::team_id.eq(req.team_id)),
        ))
        .get_result::<bool>(conn)?;
        if already {
            return Err(ServiceError::Validation(
                "Team is already assigned to this cycle".into(),
            ));
        }

        let assignment = CycleTeamAssignment {
            id: Uuid::new_v4(),
            cycle_id: id,
            team_id: req.team_id,
            matrix_id: req.matrix_id,
            manager_id: req.manager_id,
            assigned_at: Utc::now(),
        };
        diesel::insert_into(cycle_team_assignments::table)
            .values(&assignment)
            .execute(conn)?;
        Ok((assignment, team_name, cycle.name))
    })
    .await?;

    state
        .notifier
        .send(
            org_id,
            assignment.manager_id,
            NotificationTemplate::team_assignment(&team_name, &cycle_name, id),
        )
        .await;

    info!("Team {} assigned to cycle {}", assignment.team_id, id);
    Ok(Json(assignment))
}

pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentResponse>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        find_cycle(conn, id, org_id)?;
        let rows: Vec<(CycleTeamAssignment, String, String)> = cycle_team_assignments::table
            .inner_join(teams::table)
            .inner_join(performance_matrices::table)
            .filter(cycle_team_assignments::cycle_id.eq(id))
            .select((
                cycle_team_assignments::all_columns,
                teams::name,
                performance_matrices::name,
            ))
            .load(conn)?;

        let manager_ids: Vec<Uuid> = rows.iter().map(|(a, _, _)| a.manager_id).collect();
        let managers: Vec<(Uuid, String, String)> = employees::table
            .filter(employees::id.eq_any(&manager_ids))
            .select((employees::id, employees::first_name, employees::last_name))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(a, team_name, matrix_name)| {
                let manager_name = managers
                    .iter()
                    .find(|(mid, _, _)| *mid == a.manager_id)
                    .map(|(_, f, l)| format!("{} {}", f, l))
                    .unwrap_or_default();
                AssignmentResponse {
                    id: a.id,
                    team_id: a.team_id,
                    team_name,
                    matrix_id: a.matrix_id,
                    matrix_name,
                    manager_id: a.manager_id,
                    manager_name,
                    assigned_at: a.assigned_at,
                }
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

/// Flip the cycle active and materialize every evaluation row. The whole
/// expansion happens in one transaction; the cycle stays draft on any
/// failure.
pub async fn activate_cycle(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivationResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;

    let (cycle_name, end_date, evaluations_created, details_created) =
        blocking(&state.conn, move |conn| {
            conn.transaction::<(String, NaiveDate, usize, usize), ServiceError, _>(|conn| {
                let cycle = find_cycle(conn, id, org_id)?;
                if cycle.status != status::DRAFT {
                    return Err(ServiceError::Conflict(
                        "Only draft cycles can be activated".into(),
                    ));
                }

                let assignments: Vec<CycleTeamAssignment> = cycle_team_assignments::table
                    .filter(cycle_team_assignments::cycle_id.eq(id))
                    .load(conn)?;
                if assignments.is_empty() {
                    return Err(ServiceError::Validation(
                        "Cycle has no team assignments".into(),
                    ));
                }

                // Cross-cycle exclusivity: none of these teams may already
                // sit in another active cycle.
                let team_ids: Vec<Uuid> = assignments.iter().map(|a| a.team_id).collect();
                let conflicting: Option<String> = cycle_team_assignments::table
                    .inner_join(evaluation_cycles::table)
                    .inner_join(teams::table)
                    .filter(cycle_team_assignments::team_id.eq_any(&team_ids))
                    .filter(cycle_team_assignments::cycle_id.ne(id))
                    .filter(evaluation_cycles::status.ilike(status::ACTIVE))
                    .select(teams::name)
                    .first(conn)
                    .optional()?;
                if let Some(team_name) = conflicting {
                    return Err(ServiceError::Conflict(format!(
                        "Team '{}' already belongs to another active cycle",
                        team_name
                    )));
                }

                let mut all_evaluations: Vec<Evaluation> = Vec::new();
                let mut all_details: Vec<EvaluationDetail> = Vec::new();
                let mut all_status: Vec<EvaluationStatusRow> = Vec::new();
                let now = Utc::now();

                for assignment in &assignments {
                    let members: Vec<Uuid> = team_members::table
                        .inner_join(employees::table)
                        .filter(team_members::team_id.eq(assignment.team_id))
                        .filter(employees::deleted_at.is_null())
                        .select(employees::id)
                        .load(conn)?;
                    let parameter_ids: Vec<Uuid> = matrix_parameters::table
                        .filter(matrix_parameters::matrix_id.eq(assignment.matrix_id))
                        .select(matrix_parameters::parameter_id)
                        .load(conn)?;

                    let (evals, details, statuses) =
                        build_evaluation_rows(assignment.id, assignment.manager_id, &members, &parameter_ids, now);
                    all_evaluations.extend(evals);
                    all_details.extend(details);
                    all_status.extend(statuses);
                }

                diesel::insert_into(evaluations::table)
                    .values(&all_evaluations)
                    .execute(conn)?;
                diesel::insert_into(evaluation_details::table)
                    .values(&all_details)
                    .execute(conn)?;
                diesel::insert_into(evaluation_status::table)
                    .values(&all_status)
                    .execute(conn)?;

                diesel::update(evaluation_cycles::table.find(id))
                    .set((
                        evaluation_cycles::status.eq(status::ACTIVE),
                        evaluation_cycles::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok((cycle.name, cycle.end_date, all_evaluations.len(), all_details.len()))
            })
        })
        .await?;

    // Best-effort fan-out after commit.
    let recipients = blocking(&state.conn, move |conn| {
        Ok(employees::table
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .filter(employees::is_active.eq(true))
            .filter(employees::role.eq_any([roles::LINE_MANAGER, roles::STAFF]))
            .select(employees::id)
            .load::<Uuid>(conn)?)
    })
    .await
    .unwrap_or_default();
    state
        .notifier
        .send_bulk(
            org_id,
            recipients,
            NotificationTemplate::cycle_activated(&cycle_name, id, end_date),
        )
        .await;

    info!(
        "Cycle {} activated: {} evaluations, {} details",
        id, evaluations_created, details_created
    );
    Ok(Json(ActivationResponse {
        success: true,
        evaluations_created,
        details_created,
    }))
}

pub async fn close_cycle(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        let cycle = find_cycle(conn, id, org_id)?;
        if cycle.status != status::ACTIVE {
            return Err(ServiceError::Conflict(
                "Only active cycles can be closed".into(),
            ));
        }
        diesel::update(evaluation_cycles::table.find(id))
            .set((
                evaluation_cycles::status.eq(status::CLOSED),
                evaluation_cycles::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Cycle {} closed", id);
    Ok(Json(SuccessResponse::new("Cycle closed")))
}

fn find_cycle(
    conn: &mut PgConnection,
    id: Uuid,
    org_id: Uuid,
) -> Result<EvaluationCycle, ServiceError> {
    evaluation_cycles::table
        .filter(evaluation_cycles::id.eq(id))
        .filter(evaluation_cycles::organization_id.eq(org_id))
        .first::<EvaluationCycle>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Cycle not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_validation() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert!(validate_cycle_dates(start, end).is_ok());
        assert!(validate_cycle_dates(start, start).is_ok());
        assert!(validate_cycle_dates(end, start).is_err());
    }

    #[test]
    fn test_create_request_parse() {
        let json = r#"{
            "name": "Q1 Review",
            "start_date": "2026-01-01",
            "end_date": "2026-03-31"
        }"#;
        let req: CreateCycleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Q1 Review");
        assert_eq!(req.end_date, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
    }

    #[test]
    fn test_assign_team_request_parse() {
        let json = r#"{
            "team_id": "123e4567-e89b-12d3-a456-426614174000",
            "matrix_id": "123e4567-e89b-12d3-a456-426614174001",
            "manager_id": "123e4567-e89b-12d3-a456-426614174002"
        }"#;
        let req: AssignTeamRequest = serde_json::from_str(json).unwrap();
        assert_ne!(req.team_id, req.matrix_id);
    }
}
