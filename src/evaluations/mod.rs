//! Line-manager scoring.
//!
//! Evaluation rows are seeded at cycle activation. Managers fill scores in
//! per-parameter drafts, then submit once: submission requires every matrix
//! parameter to carry a score, computes the weighted overall score and
//! freezes the evaluation.

use crate::cycles::CycleTeamAssignment;
use crate::notifications::NotificationTemplate;
use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::roles;
use crate::shared::schema::{
    cycle_team_assignments, employees, evaluation_cycles, evaluation_details, evaluation_status,
    evaluations, matrix_parameters, parameters, performance_matrices, teams,
};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod status {
    pub const PENDING: &str = "pending";
    pub const DRAFT: &str = "draft";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = evaluations)]
pub struct Evaluation {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub employee_id: Uuid,
    pub manager_id: Uuid,
    pub status: String,
    pub overall_score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = evaluation_details)]
pub struct EvaluationDetail {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub parameter_id: Uuid,
    pub score: Option<f64>,
    pub comments: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = evaluation_status)]
pub struct EvaluationStatusRow {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub parameter_id: Uuid,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Cartesian expansion for one assignment: one evaluation per member, one
/// detail + status row per (member × parameter), seeded empty/pending.
pub fn build_evaluation_rows(
    assignment_id: Uuid,
    manager_id: Uuid,
    member_ids: &[Uuid],
    parameter_ids: &[Uuid],
    now: DateTime<Utc>,
) -> (Vec<Evaluation>, Vec<EvaluationDetail>, Vec<EvaluationStatusRow>) {
    let mut evals = Vec::with_capacity(member_ids.len());
    let mut details = Vec::with_capacity(member_ids.len() * parameter_ids.len());
    let mut statuses = Vec::with_capacity(member_ids.len() * parameter_ids.len());

    for &employee_id in member_ids {
        let evaluation_id = Uuid::new_v4();
        evals.push(Evaluation {
            id: evaluation_id,
            assignment_id,
            employee_id,
            manager_id,
            status: status::PENDING.to_string(),
            overall_score: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        });
        for &parameter_id in parameter_ids {
            details.push(EvaluationDetail {
                id: Uuid::new_v4(),
                evaluation_id,
                parameter_id,
                score: None,
                comments: None,
                updated_at: now,
            });
            statuses.push(EvaluationStatusRow {
                id: Uuid::new_v4(),
                evaluation_id,
                parameter_id,
                status: status::PENDING.to_string(),
                updated_at: now,
            });
        }
    }
    (evals, details, statuses)
}

/// `Σ(score × weightage / 100)` over scored parameters.
pub fn compute_overall_score(scored: &[(f64, i32)]) -> f64 {
    scored
        .iter()
        .map(|(score, weightage)| score * (*weightage as f64) / 100.0)
        .sum()
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScoreEntryInput {
    pub parameter_id: Uuid,
    pub score: Option<f64>,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreSheetRequest {
    pub scores: Vec<ScoreEntryInput>,
}

#[derive(Debug, Serialize)]
pub struct AssignedTeamResponse {
    pub assignment_id: Uuid,
    pub cycle_id: Uuid,
    pub cycle_name: String,
    pub cycle_end_date: chrono::NaiveDate,
    pub team_id: Uuid,
    pub team_name: String,
    pub matrix_id: Uuid,
    pub matrix_name: String,
    pub total_evaluations: i64,
    pub completed_evaluations: i64,
}

#[derive(Debug, Serialize)]
pub struct TeamEvaluationResponse {
    pub evaluation_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub status: String,
    pub overall_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FormRowResponse {
    pub parameter_id: Uuid,
    pub parameter_name: String,
    pub weightage: i32,
    pub score: Option<f64>,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationFormResponse {
    pub evaluation_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub status: String,
    pub is_editable: bool,
    pub rows: Vec<FormRowResponse>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub overall_score: f64,
}

#[derive(Debug, Serialize)]
pub struct MyEvaluationResponse {
    pub evaluation_id: Uuid,
    pub cycle_name: String,
    pub status: String,
    pub overall_score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub breakdown: Vec<FormRowResponse>,
}

pub fn configure_evaluation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/line-manager/assigned-teams", get(assigned_teams))
        .route(
            "/api/line-manager/assignments/:id/evaluations",
            get(team_evaluations),
        )
        .route(
            "/api/line-manager/evaluations/:id/form",
            get(evaluation_form),
        )
        .route(
            "/api/line-manager/evaluations/:id/draft",
            put(save_draft_evaluation),
        )
        .route(
            "/api/line-manager/evaluations/:id/submit",
            post(submit_evaluation),
        )
        .route("/api/staff/my-evaluations", get(my_evaluations))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn assigned_teams(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<AssignedTeamResponse>>, ServiceError> {
    auth.require_manager()?;
    let manager_id = auth.id;
    let rows = blocking(&state.conn, move |conn| {
        let rows: Vec<(CycleTeamAssignment, (Uuid, String, chrono::NaiveDate), String, String)> =
            cycle_team_assignments::table
                .inner_join(evaluation_cycles::table)
                .inner_join(teams::table)
                .inner_join(performance_matrices::table)
                .filter(cycle_team_assignments::manager_id.eq(manager_id))
                .filter(evaluation_cycles::status.ilike("active"))
                .select((
                    cycle_team_assignments::all_columns,
                    (
                        evaluation_cycles::id,
                        evaluation_cycles::name,
                        evaluation_cycles::end_date,
                    ),
                    teams::name,
                    performance_matrices::name,
                ))
                .load(conn)?;

        let assignment_ids: Vec<Uuid> = rows.iter().map(|(a, _, _, _)| a.id).collect();
        let totals: HashMap<Uuid, i64> = evaluations::table
            .filter(evaluations::assignment_id.eq_any(&assignment_ids))
            .group_by(evaluations::assignment_id)
            .select((evaluations::assignment_id, diesel::dsl::count_star()))
            .load::<(Uuid, i64)>(conn)?
            .into_iter()
            .collect();
        let completed: HashMap<Uuid, i64> = evaluations::table
            .filter(evaluations::assignment_id.eq_any(&assignment_ids))
            .filter(evaluations::status.eq(status::COMPLETED))
            .group_by(evaluations::assignment_id)
            .select((evaluations::assignment_id, diesel::dsl::count_star()))
            .load::<(Uuid, i64)>(conn)?
            .into_iter()
            .collect();

        Ok(rows
            .into_iter()
            .map(
                |(a, (cycle_id, cycle_name, cycle_end_date), team_name, matrix_name)| {
                    AssignedTeamResponse {
                        assignment_id: a.id,
                        cycle_id,
                        cycle_name,
                        cycle_end_date,
                        team_id: a.team_id,
                        team_name,
                        matrix_id: a.matrix_id,
                        matrix_name,
                        total_evaluations: totals.get(&a.id).copied().unwrap_or(0),
                        completed_evaluations: completed.get(&a.id).copied().unwrap_or(0),
                    }
                },
            )
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

pub async fn team_evaluations(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TeamEvaluationResponse>>, ServiceError> {
    auth.require_manager()?;
    let manager_id = auth.id;
    let rows = blocking(&state.conn, move |conn| {
        let owned = diesel::dsl::select(diesel::dsl::exists(
            cycle_team_assignments::table
                .filter(cycle_team_assignments::id.eq(id))
                .filter(cycle_team_assignments::manager_id.eq(manager_id)),
        ))
        .get_result::<bool>(conn)?;
        if !owned {
            return Err(ServiceError::NotFound("Assignment not found".into()));
        }

        let rows: Vec<(Evaluation, String, String)> = evaluations::table
            .inner_join(employees::table.on(employees::id.eq(evaluations::employee_id)))
            .filter(evaluations::assignment_id.eq(id))
            .select((
                evaluations::all_columns,
                employees::first_name,
                employees::last_name,
            ))
            .order(employees::last_name.asc())
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|(e, first, last)| TeamEvaluationResponse {
                evaluation_id: e.id,
                employee_id: e.employee_id,
                employee_name: format!("{} {}", first, last),
                status: e.status,
                overall_score: e.overall_score,
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

/// One row per matrix parameter, left-joined against whatever the manager
/// has saved so far.
pub async fn evaluation_form(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationFormResponse>, ServiceError> {
    auth.require_manager()?;
    let manager_id = auth.id;
    let form = blocking(&state.conn, move |conn| {
        let evaluation = find_owned_evaluation(conn, id, manager_id)?;
        let assignment: CycleTeamAssignment = cycle_team_assignments::table
            .find(evaluation.assignment_id)
            .first(conn)?;

        let matrix_rows: Vec<(Uuid, String, i32)> = matrix_parameters::table
            .inner_join(parameters::table)
            .filter(matrix_parameters::matrix_id.eq(assignment.matrix_id))
            .select((
                matrix_parameters::parameter_id,
                parameters::name,
                matrix_parameters::weightage,
            ))
            .order(parameters::name.asc())
            .load(conn)?;

        let details: HashMap<Uuid, (Option<f64>, Option<String>)> = evaluation_details::table
            .filter(evaluation_details::evaluation_id.eq(id))
            .select((
                evaluation_details::parameter_id,
                evaluation_details::score,
                evaluation_details::comments,
            ))
            .load::<(Uuid, Option<f64>, Option<String>)>(conn)?
            .into_iter()
            .map(|(pid, score, comments)| (pid, (score, comments)))
            .collect();

        let (first, last): (String, String) = employees::table
            .filter(employees::id.eq(evaluation.employee_id))
            .select((employees::first_name, employees::last_name))
            .first(conn)?;

        let rows = matrix_rows
            .into_iter()
            .map(|(parameter_id, parameter_name, weightage)| {
                let (score, comments) = details
                    .get(&parameter_id)
                    .cloned()
                    .unwrap_or((None, None));
                FormRowResponse {
                    parameter_id,
                    parameter_name,
                    weightage,
                    score,
                    comments,
                }
            })
            .collect();

        Ok(EvaluationFormResponse {
            evaluation_id: evaluation.id,
            employee_id: evaluation.employee_id,
            employee_name: format!("{} {}", first, last),
            is_editable: evaluation.status != status::COMPLETED,
            status: evaluation.status,
            rows,
        })
    })
    .await?;
    Ok(Json(form))
}

/// Partial save. Supplied parameters are upserted and flagged in-progress;
/// the evaluation drops to `draft`.
pub async fn save_draft_evaluation(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<ScoreSheetRequest>,
) -> Result<Json<EvaluationFormResponse>, ServiceError> {
    auth.require_manager()?;
    validate_scores(&req.scores)?;
    let manager_id = auth.id;

    blocking(&state.conn, move |conn| {
        conn.transaction::<(), ServiceError, _>(|conn| {
            let evaluation = find_owned_evaluation(conn, id, manager_id)?;
            if evaluation.status == status::COMPLETED {
                return Err(ServiceError::Conflict(
                    "Evaluation is already completed".into(),
                ));
            }
            let assignment: CycleTeamAssignment = cycle_team_assignments::table
                .find(evaluation.assignment_id)
                .first(conn)?;
            check_parameters_in_matrix(conn, assignment.matrix_id, &req.scores)?;

            upsert_details(conn, id, &req.scores)?;
            mark_parameters_in_progress(conn, id, &req.scores)?;

            diesel::update(evaluations::table.find(id))
                .set((
                    evaluations::status.eq(status::DRAFT),
                    evaluations::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(())
        })
    })
    .await?;

    // Hand back the refreshed form.
    evaluation_form(State(state), auth, Path(id)).await
}

/// Final submission: every matrix parameter must carry a score. Computes
/// and freezes the weighted overall score.
pub async fn submit_evaluation(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<ScoreSheetRequest>,
) -> Result<Json<SubmitResponse>, ServiceError> {
    auth.require_manager()?;
    validate_scores(&req.scores)?;
    let manager_id = auth.id;
    let org_id = auth.organization_id;

    let outcome = blocking(&state.conn, move |conn| {
        conn.transaction::<SubmitOutcome, ServiceError, _>(|conn| {
            let evaluation = find_owned_evaluation(conn, id, manager_id)?;
            if evaluation.status == status::COMPLETED {
                return Err(ServiceError::Conflict(
                    "Evaluation is already completed".into(),
                ));
            }
            let assignment: CycleTeamAssignment = cycle_team_assignments::table
                .find(evaluation.assignment_id)
                .first(conn)?;
            check_parameters_in_matrix(conn, assignment.matrix_id, &req.scores)?;

            upsert_details(conn, id, &req.scores)?;

            // Completeness check against the matrix parameter set.
            let weightages: HashMap<Uuid, i32> = matrix_parameters::table
                .filter(matrix_parameters::matrix_id.eq(assignment.matrix_id))
                .select((matrix_parameters::parameter_id, matrix_parameters::weightage))
                .load::<(Uuid, i32)>(conn)?
                .into_iter()
                .collect();
            let details: Vec<(Uuid, Option<f64>)> = evaluation_details::table
                .filter(evaluation_details::evaluation_id.eq(id))
                .select((evaluation_details::parameter_id, evaluation_details::score))
                .load(conn)?;

            let scored: Vec<(f64, i32)> = details
                .iter()
                .filter_map(|(pid, score)| {
                    score.and_then(|s| weightages.get(pid).map(|w| (s, *w)))
                })
                .collect();
            if scored.len() < weightages.len() {
                return Err(ServiceError::Validation(format!(
                    "Only {} of {} parameters scored; all parameters are required to submit",
                    scored.len(),
                    weightages.len()
                )));
            }

            let overall = compute_overall_score(&scored);
            let now = Utc::now();

            diesel::update(
                evaluation_status::table.filter(evaluation_status::evaluation_id.eq(id)),
            )
            .set((
                evaluation_status::status.eq(status::COMPLETED),
                evaluation_status::updated_at.eq(now),
            ))
            .execute(conn)?;

            diesel::update(evaluations::table.find(id))
                .set((
                    evaluations::status.eq(status::COMPLETED),
                    evaluations::overall_score.eq(Some(overall)),
                    evaluations::submitted_at.eq(Some(now)),
                    evaluations::updated_at.eq(now),
                ))
                .execute(conn)?;

            let remaining: i64 = evaluations::table
                .filter(evaluations::assignment_id.eq(evaluation.assignment_id))
                .filter(evaluations::status.ne(status::COMPLETED))
                .count()
                .get_result(conn)?;

            let (cycle_name, team_name): (String, String) = evaluation_cycles::table
                .inner_join(cycle_team_assignments::table)
                .inner_join(teams::table.on(teams::id.eq(cycle_team_assignments::team_id)))
                .filter(cycle_team_assignments::id.eq(evaluation.assignment_id))
                .select((evaluation_cycles::name, teams::name))
                .first(conn)?;

            Ok(SubmitOutcome {
                overall,
                employee_id: evaluation.employee_id,
                cycle_name,
                team_name,
                assignment_done: remaining == 0,
            })
        })
    })
    .await?;

    // Best-effort notifications outside the transaction.
    state
        .notifier
        .send(
            org_id,
            outcome.employee_id,
            NotificationTemplate::evaluation_completed(&outcome.cycle_name, id),
        )
        .await;

    if outcome.assignment_done {
        let (admins, manager_name) = blocking(&state.conn, move |conn| {
            let admins = employees::table
                .filter(employees::organization_id.eq(org_id))
                .filter(employees::role.eq(roles::ADMIN))
                .filter(employees::deleted_at.is_null())
                .select(employees::id)
                .load::<Uuid>(conn)?;
            let manager_name = employees::table
                .filter(employees::id.eq(manager_id))
                .select((employees::first_name, employees::last_name))
                .first::<(String, String)>(conn)
                .map(|(first, last)| format!("{} {}", first, last))?;
            Ok((admins, manager_name))
        })
        .await
        .unwrap_or_default();
        state
            .notifier
            .send_bulk(
                org_id,
                admins,
                NotificationTemplate::manager_completed(
                    &manager_name,
                    &outcome.team_name,
                    &outcome.cycle_name,
                ),
            )
            .await;
    }

    info!(
        "Evaluation {} submitted with overall score {:.2}",
        id, outcome.overall
    );
    Ok(Json(SubmitResponse {
        success: true,
        overall_score: outcome.overall,
    }))
}

pub async fn my_evaluations(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
) -> Result<Json<Vec<MyEvaluationResponse>>, ServiceError> {
    let employee_id = auth.id;
    let rows = blocking(&state.conn, move |conn| {
        let evals: Vec<(Evaluation, String)> = evaluations::table
            .inner_join(cycle_team_assignments::table)
            .inner_join(
                evaluation_cycles::table
                    .on(evaluation_cycles::id.eq(cycle_team_assignments::cycle_id)),
            )
            .filter(evaluations::employee_id.eq(employee_id))
            .select((evaluations::all_columns, evaluation_cycles::name))
            .order(evaluations::created_at.desc())
            .load(conn)?;

        let mut out = Vec::with_capacity(evals.len());
        for (evaluation, cycle_name) in evals {
            // The per-parameter breakdown is only disclosed once frozen.
            let breakdown = if evaluation.status == status::COMPLETED {
                evaluation_details::table
                    .inner_join(parameters::table)
                    .inner_join(
                        matrix_parameters::table.on(matrix_parameters::parameter_id
                            .eq(evaluation_details::parameter_id)),
                    )
                    .inner_join(
                        cycle_team_assignments::table
                            .on(cycle_team_assignments::matrix_id.eq(matrix_parameters::matrix_id)),
                    )
                    .filter(evaluation_details::evaluation_id.eq(evaluation.id))
                    .filter(cycle_team_assignments::id.eq(evaluation.assignment_id))
                    .select((
                        evaluation_details::parameter_id,
                        parameters::name,
                        matrix_parameters::weightage,
                        evaluation_details::score,
                        evaluation_details::comments,
                    ))
                    .load::<(Uuid, String, i32, Option<f64>, Option<String>)>(conn)?
                    .into_iter()
                    .map(
                        |(parameter_id, parameter_name, weightage, score, comments)| {
                            FormRowResponse {
                                parameter_id,
                                parameter_name,
                                weightage,
                                score,
                                comments,
                            }
                        },
                    )
                    .collect()
            } else {
                Vec::new()
            };

            out.push(MyEvaluationResponse {
                evaluation_id: evaluation.id,
                cycle_name,
                status: evaluation.status,
                overall_score: evaluation.overall_score,
                submitted_at: evaluation.submitted_at,
                breakdown,
            });
        }
        Ok(out)
    })
    .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct SubmitOutcome {
    overall: f64,
    employee_id: Uuid,
    cycle_name: String,
    team_name: String,
    assignment_done: bool,
}

fn validate_scores(entries: &[ScoreEntryInput]) -> Result<(), ServiceError> {
    if entries.is_empty() {
        return Err(ServiceError::Validation("No scores supplied".into()));
    }
    for entry in entries {
        if let Some(score) = entry.score {
            if !(0.0..=100.0).contains(&score) {
                return Err(ServiceError::Validation(format!(
                    "Score must be between 0 and 100, got {}",
                    score
                )));
            }
        }
    }
    Ok(())
}

fn find_owned_evaluation(
    conn: &mut PgConnection,
    id: Uuid,
    manager_id: Uuid,
) -> Result<Evaluation, ServiceError> {
    evaluations::table
        .filter(evaluations::id.eq(id))
        .filter(evaluations::manager_id.eq(manager_id))
        .first::<Evaluation>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Evaluation not found".into()))
}

fn check_parameters_in_matrix(
    conn: &mut PgConnection,
    matrix_id: Uuid,
    entries: &[ScoreEntryInput],
) -> Result<(), ServiceError> {
    let wanted: Vec<Uuid> = entries.iter().map(|e| e.parameter_id).collect();
    let known: i64 = matrix_parameters::table
        .filter(matrix_parameters::matrix_id.eq(matrix_id))
        .filter(matrix_parameters::parameter_id.eq_any(&wanted))
        .count()
        .get_result(conn)?;
    if known != wanted.len() as i64 {
        return Err(ServiceError::Validation(
            "One or more parameters do not belong to the evaluation matrix".into(),
        ));
    }
    Ok(())
}

fn upsert_details(
    conn: &mut PgConnection,
    evaluation_id: Uuid,
    entries: &[ScoreEntryInput],
) -> Result<(), ServiceError> {
    let now = Utc::now();
    for entry in entries {
        let row = EvaluationDetail {
            id: Uuid::new_v4(),
            evaluation_id,
            parameter_id: entry.parameter_id,
            score: entry.score,
            comments: entry.comments.clone(),
            updated_at: now,
        };
        diesel::insert_into(evaluation_details::table)
            .values(&row)
            .on_conflict((
                evaluation_details::evaluation_id,
                evaluation_details::parameter_id,
            ))
            .do_update()
            .set((
                evaluation_details::score.eq(excluded(evaluation_details::score)),
                evaluation_details::comments.eq(excluded(evaluation_details::comments)),
                evaluation_details::updated_at.eq(excluded(evaluation_details::updated_at)),
            ))
            .execute(conn)?;
    }
    Ok(())
}

fn mark_parameters_in_progress(
    conn: &mut PgConnection,
    evaluation_id: Uuid,
    entries: &[ScoreEntryInput],
) -> Result<(), ServiceError> {
    let parameter_ids: Vec<Uuid> = entries.iter().map(|e| e.parameter_id).collect();
    diesel::update(
        evaluation_status::table
            .filter(evaluation_status::evaluation_id.eq(evaluation_id))
            .filter(evaluation_status::parameter_id.eq_any(&parameter_ids)),
    )
    .set((
        evaluation_status::status.eq(status::IN_PROGRESS),
        evaluation_status::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_score_worked_example() {
        // A at 60% scored 80, B at 40% scored 50 => 68.
        let overall = compute_overall_score(&[(80.0, 60), (50.0, 40)]);
        assert!((overall - 68.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_score_full_marks() {
        let overall = compute_overall_score(&[(100.0, 70), (100.0, 30)]);
        assert!((overall - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_score_empty() {
        assert_eq!(compute_overall_score(&[]), 0.0);
    }

    #[test]
    fn test_build_evaluation_rows_cartesian_counts() {
        let members: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let params: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let (evals, details, statuses) = build_evaluation_rows(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &members,
            &params,
            Utc::now(),
        );

        assert_eq!(evals.len(), 4);
        assert_eq!(details.len(), 12);
        assert_eq!(statuses.len(), 12);
        assert!(evals.iter().all(|e| e.status == status::PENDING));
        assert!(evals.iter().all(|e| e.overall_score.is_none()));
        assert!(details.iter().all(|d| d.score.is_none()));
        assert!(statuses.iter().all(|s| s.status == status::PENDING));
    }

    #[test]
    fn test_build_evaluation_rows_details_reference_their_evaluation() {
        let members = vec![Uuid::new_v4(), Uuid::new_v4()];
        let params = vec![Uuid::new_v4()];
        let (evals, details, _) =
            build_evaluation_rows(Uuid::new_v4(), Uuid::new_v4(), &members, &params, Utc::now());

        let eval_ids: Vec<Uuid> = evals.iter().map(|e| e.id).collect();
        assert!(details.iter().all(|d| eval_ids.contains(&d.evaluation_id)));
    }

    #[test]
    fn test_score_bounds() {
        let ok = vec![ScoreEntryInput {
            parameter_id: Uuid::new_v4(),
            score: Some(100.0),
            comments: None,
        }];
        assert!(validate_scores(&ok).is_ok());

        let too_high = vec![ScoreEntryInput {
            parameter_id: Uuid::new_v4(),
            score: Some(100.5),
            comments: None,
        }];
        assert!(validate_scores(&too_high).is_err());

        let negative = vec![ScoreEntryInput {
            parameter_id: Uuid::new_v4(),
            score: Some(-1.0),
            comments: None,
        }];
        assert!(validate_scores(&negative).is_err());

        assert!(validate_scores(&[]).is_err());
    }

    #[test]
    fn test_score_sheet_parse() {
        let json = r#"{
            "scores": [
                {"parameter_id": "123e4567-e89b-12d3-a456-426614174000", "score": 85.0, "comments": "Strong quarter"},
                {"parameter_id": "123e4567-e89b-12d3-a456-426614174001", "score": null}
            ]
        }"#;
        let req: ScoreSheetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.scores.len(), 2);
        assert_eq!(req.scores[0].score, Some(85.0));
        assert!(req.scores[1].score.is_none());
    }
}
