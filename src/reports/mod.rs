//! Reporting endpoints: organization rollup, employee scores, team report,
//! individual history. All aggregates are computed from typed queries and
//! folded in Rust.

use crate::cycles::CycleTeamAssignment;
use crate::evaluations::{status as eval_status, Evaluation};
use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::roles;
use crate::shared::schema::{
    cycle_team_assignments, employees, evaluation_cycles, evaluations, teams,
};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub cycle_name: String,
    pub status: String,
    pub end_date: NaiveDate,
    pub total_evaluations: i64,
    pub completed_evaluations: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct OrganizationReport {
    pub employee_count: i64,
    pub team_count: i64,
    pub active_cycles: i64,
    pub cycles: Vec<CycleReport>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeScoreRow {
    pub employee_id: Uuid,
    pub name: String,
    pub role: String,
    pub completed_evaluations: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TeamReportRow {
    pub employee_id: Uuid,
    pub name: String,
    pub evaluation_status: String,
    pub overall_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TeamReport {
    pub team_id: Uuid,
    pub team_name: String,
    pub cycle_name: String,
    pub rows: Vec<TeamReportRow>,
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct IndividualReportEntry {
    pub cycle_name: String,
    pub status: String,
    pub overall_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct IndividualReport {
    pub employee_id: Uuid,
    pub name: String,
    pub entries: Vec<IndividualReportEntry>,
    pub average_score: Option<f64>,
}

pub fn configure_report_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/organization", get(organization_report))
        .route("/api/reports/employees", get(employee_scores))
        .route("/api/reports/teams/:id", get(team_report))
        .route("/api/reports/employees/:id", get(individual_report))
}

/// Mean of the available scores; `None` when nothing is completed yet.
pub fn average(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

pub async fn organization_report(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<OrganizationReport>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let report = blocking(&state.conn, move |conn| {
        let employee_count: i64 = employees::table
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .count()
            .get_result(conn)?;
        let team_count: i64 = teams::table
            .filter(teams::organization_id.eq(org_id))
            .count()
            .get_result(conn)?;

        let cycles: Vec<(Uuid, String, String, NaiveDate)> = evaluation_cycles::table
            .filter(evaluation_cycles::organization_id.eq(org_id))
            .select((
                evaluation_cycles::id,
                evaluation_cycles::name,
                evaluation_cycles::status,
                evaluation_cycles::end_date,
            ))
            .order(evaluation_cycles::created_at.desc())
            .load(conn)?;
        let active_cycles = cycles.iter().filter(|(_, _, s, _)| s == "active").count() as i64;

        let mut cycle_reports = Vec::with_capacity(cycles.len());
        for (cycle_id, cycle_name, status, end_date) in cycles {
            let evals: Vec<(String, Option<f64>)> = evaluations::table
                .inner_join(cycle_team_assignments::table)
                .filter(cycle_team_assignments::cycle_id.eq(cycle_id))
                .select((evaluations::status, evaluations::overall_score))
                .load(conn)?;

            let total = evals.len() as i64;
            let completed = evals
                .iter()
                .filter(|(s, _)| s == eval_status::COMPLETED)
                .count() as i64;
            let scores: Vec<f64> = evals.iter().filter_map(|(_, s)| *s).collect();

            cycle_reports.push(CycleReport {
                cycle_id,
                cycle_name,
                status,
                end_date,
                total_evaluations: total,
                completed_evaluations: completed,
                average_score: average(&scores),
            });
        }

        Ok(OrganizationReport {
            employee_count,
            team_count,
            active_cycles,
            cycles: cycle_reports,
        })
    })
    .await?;
    Ok(Json(report))
}

pub async fn employee_scores(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<EmployeeScoreRow>>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        let staff: Vec<(Uuid, String, String, String)> = employees::table
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .select((
                employees::id,
                employees::first_name,
                employees::last_name,
                employees::role,
            ))
            .order(employees::last_name.asc())
            .load(conn)?;

        let ids: Vec<Uuid> = staff.iter().map(|(id, _, _, _)| *id).collect();
        let completed: Vec<(Uuid, Option<f64>)> = evaluations::table
            .filter(evaluations::employee_id.eq_any(&ids))
            .filter(evaluations::status.eq(eval_status::COMPLETED))
            .select((evaluations::employee_id, evaluations::overall_score))
            .load(conn)?;

        let mut by_employee: HashMap<Uuid, Vec<f64>> = HashMap::new();
        for (employee_id, score) in completed {
            by_employee
                .entry(employee_id)
                .or_default()
                .extend(score.into_iter());
        }

        Ok(staff
            .into_iter()
            .map(|(id, first, last, role)| {
                let scores = by_employee.remove(&id).unwrap_or_default();
                EmployeeScoreRow {
                    employee_id: id,
                    name: format!("{} {}", first, last),
                    role,
                    completed_evaluations: scores.len() as i64,
                    average_score: average(&scores),
                }
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

/// Team standing in the most recent cycle the team was assigned to. Open to
/// admins and to the manager who owns that assignment.
pub async fn team_report(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamReport>, ServiceError> {
    let org_id = auth.organization_id;
    let caller = auth.clone();
    let report = blocking(&state.conn, move |conn| {
        let team_name: String = teams::table
            .filter(teams::id.eq(id))
            .filter(teams::organization_id.eq(org_id))
            .select(teams::name)
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Team not found".into()))?;

        let assignment: Option<(CycleTeamAssignment, String)> = cycle_team_assignments::table
            .inner_join(evaluation_cycles::table)
            .filter(cycle_team_assignments::team_id.eq(id))
            .select((cycle_team_assignments::all_columns, evaluation_cycles::name))
            .order(cycle_team_assignments::assigned_at.desc())
            .first(conn)
            .optional()?;
        let Some((assignment, cycle_name)) = assignment else {
            return Err(ServiceError::NotFound(
                "Team has no evaluation cycle assignment".into(),
            ));
        };

        if !caller.has_role(roles::ADMIN) && assignment.manager_id != caller.id {
            return Err(ServiceError::Forbidden(
                "Only admins or the assigned manager can view this report".into(),
            ));
        }

        let rows: Vec<(Evaluation, String, String)> = evaluations::table
            .inner_join(employees::table.on(employees::id.eq(evaluations::employee_id)))
            .filter(evaluations::assignment_id.eq(assignment.id))
            .select((
                evaluations::all_columns,
                employees::first_name,
                employees::last_name,
            ))
            .order(employees::last_name.asc())
            .load(conn)?;

        let scores: Vec<f64> = rows.iter().filter_map(|(e, _, _)| e.overall_score).collect();
        Ok(TeamReport {
            team_id: id,
            team_name,
            cycle_name,
            average_score: average(&scores),
            rows: rows
                .into_iter()
                .map(|(e, first, last)| TeamReportRow {
                    employee_id: e.employee_id,
                    name: format!("{} {}", first, last),
                    evaluation_status: e.status,
                    overall_score: e.overall_score,
                })
                .collect(),
        })
    })
    .await?;
    Ok(Json(report))
}

/// Evaluation history of one employee. Admins, the employee, and any
/// manager who has evaluated them may read it.
pub async fn individual_report(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<IndividualReport>, ServiceError> {
    let org_id = auth.organization_id;
    let caller = auth.clone();
    let report = blocking(&state.conn, move |conn| {
        let (first, last): (String, String) = employees::table
            .filter(employees::id.eq(id))
            .filter(employees::organization_id.eq(org_id))
            .filter(employees::deleted_at.is_null())
            .select((employees::first_name, employees::last_name))
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Employee not found".into()))?;

        let history: Vec<(Evaluation, String)> = evaluations::table
            .inner_join(cycle_team_assignments::table)
            .inner_join(
                evaluation_cycles::table
                    .on(evaluation_cycles::id.eq(cycle_team_assignments::cycle_id)),
            )
            .filter(evaluations::employee_id.eq(id))
            .select((evaluations::all_columns, evaluation_cycles::name))
            .order(evaluations::created_at.desc())
            .load(conn)?;

        let allowed = caller.has_role(roles::ADMIN)
            || caller.id == id
            || history.iter().any(|(e, _)| e.manager_id == caller.id);
        if !allowed {
            return Err(ServiceError::Forbidden(
                "You are not allowed to view this report".into(),
            ));
        }

        let scores: Vec<f64> = history.iter().filter_map(|(e, _)| e.overall_score).collect();
        Ok(IndividualReport {
            employee_id: id,
            name: format!("{} {}", first, last),
            average_score: average(&scores),
            entries: history
                .into_iter()
                .map(|(e, cycle_name)| IndividualReportEntry {
                    cycle_name,
                    status: e.status,
                    overall_score: e.overall_score,
                })
                .collect(),
        })
    })
    .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[68.0]), Some(68.0));
        let avg = average(&[60.0, 80.0]).unwrap();
        assert!((avg - 70.0).abs() < f64::EPSILON);
    }
}
