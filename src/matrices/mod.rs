//! Performance matrix management.
//!
//! A matrix is a named set of (parameter, weightage%) pairs. Weightages sum
//! to at most 100 and must hit exactly 100 before a matrix can go active.
//! Active and archived matrices are immutable: editing one archives the
//! current row and inserts a successor under a fresh id (version-by-copy).

pub mod parameters;

use crate::security::AuthenticatedEmployee;
use crate::shared::error::ServiceError;
use crate::shared::models::SuccessResponse;
use crate::shared::schema::{
    cycle_team_assignments, evaluation_cycles, matrix_parameters, parameters as parameters_table,
    performance_matrices,
};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::{Path, Query, State};
use axum::routing::{delete as del, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub mod status {
    pub const DRAFT: &str = "draft";
    pub const ACTIVE: &str = "active";
    pub const ARCHIVED: &str = "archived";
    pub const DELETED: &str = "deleted";
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = performance_matrices)]
pub struct PerformanceMatrix {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub version: i32,
    pub previous_version_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = matrix_parameters)]
pub struct MatrixParameter {
    pub id: Uuid,
    pub matrix_id: Uuid,
    pub parameter_id: Uuid,
    pub weightage: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightedParameterInput {
    pub parameter_id: Uuid,
    pub weightage: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateMatrixRequest {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<WeightedParameterInput>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMatrixRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<Vec<WeightedParameterInput>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MatrixSummary {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub version: i32,
    pub total_weightage: i64,
    pub parameter_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MatrixParameterDetail {
    pub parameter_id: Uuid,
    pub name: String,
    pub weightage: i32,
}

#[derive(Debug, Serialize)]
pub struct MatrixResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub version: i32,
    pub previous_version_id: Option<Uuid>,
    pub parameters: Vec<MatrixParameterDetail>,
    pub total_weightage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn configure_matrix_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/matrices", get(list_matrices))
        .route("/api/matrices", post(create_matrix))
        .route("/api/matrices/:id", get(get_matrix))
        .route("/api/matrices/:id", put(update_matrix))
        .route("/api/matrices/:id", del(delete_matrix))
        .route("/api/parameters", get(parameters::list_parameters))
        .route("/api/parameters", post(parameters::create_parameter))
        .route("/api/parameters/:id", put(parameters::update_parameter))
        .route("/api/parameters/:id", del(parameters::delete_parameter))
}

/// Validates a weighted parameter set and returns the weightage sum.
pub fn validate_weightages(entries: &[WeightedParameterInput]) -> Result<i32, ServiceError> {
    if entries.is_empty() {
        return Err(ServiceError::Validation(
            "A matrix needs at least one parameter".into(),
        ));
    }
    let mut seen = HashSet::new();
    let mut sum: i32 = 0;
    for entry in entries {
        if !(1..=100).contains(&entry.weightage) {
            return Err(ServiceError::Validation(format!(
                "Weightage must be between 1 and 100, got {}",
                entry.weightage
            )));
        }
        if !seen.insert(entry.parameter_id) {
            return Err(ServiceError::Validation(
                "Duplicate parameter in matrix".into(),
            ));
        }
        sum += entry.weightage;
    }
    if sum > 100 {
        return Err(ServiceError::Validation(format!(
            "Weightages sum to {}, which exceeds 100",
            sum
        )));
    }
    Ok(sum)
}

/// Resolves the stored status for a matrix whose weightages sum to `sum`.
/// Only `draft` and `active` may be requested; `active` requires the sum to
/// be exactly 100, and anything short of that is silently kept as draft.
pub fn resolve_status(requested: Option<&str>, sum: i32) -> Result<&'static str, ServiceError> {
    match requested.map(|s| s.to_lowercase()) {
        None => Ok(status::DRAFT),
        Some(s) if s == status::DRAFT => Ok(status::DRAFT),
        Some(s) if s == status::ACTIVE => {
            if sum == 100 {
                Ok(status::ACTIVE)
            } else {
                Ok(status::DRAFT)
            }
        }
        Some(other) => Err(ServiceError::Validation(format!(
            "Status '{}' cannot be set directly",
            other
        ))),
    }
}

pub async fn list_matrices(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Query(query): Query<MatrixQuery>,
) -> Result<Json<Vec<MatrixSummary>>, ServiceError> {
    let org_id = auth.organization_id;
    let rows = blocking(&state.conn, move |conn| {
        let mut q = performance_matrices::table
            .filter(performance_matrices::organization_id.eq(org_id))
            .into_boxed();
        match query.status {
            Some(wanted) => q = q.filter(performance_matrices::status.eq(wanted.to_lowercase())),
            None => q = q.filter(performance_matrices::status.ne(status::DELETED)),
        }
        let matrices: Vec<PerformanceMatrix> =
            q.order(performance_matrices::updated_at.desc()).load(conn)?;

        let ids: Vec<Uuid> = matrices.iter().map(|m| m.id).collect();
        let weights: Vec<(Uuid, i32)> = matrix_parameters::table
            .filter(matrix_parameters::matrix_id.eq_any(&ids))
            .select((matrix_parameters::matrix_id, matrix_parameters::weightage))
            .load(conn)?;

        Ok(matrices
            .into_iter()
            .map(|m| {
                let (total, count) = weights
                    .iter()
                    .filter(|(matrix_id, _)| *matrix_id == m.id)
                    .fold((0i64, 0i64), |(t, c), (_, w)| (t + *w as i64, c + 1));
                MatrixSummary {
                    id: m.id,
                    name: m.name,
                    status: m.status,
                    version: m.version,
                    total_weightage: total,
                    parameter_count: count,
                    updated_at: m.updated_at,
                }
            })
            .collect())
    })
    .await?;
    Ok(Json(rows))
}

pub async fn create_matrix(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Json(req): Json<CreateMatrixRequest>,
) -> Result<Json<MatrixResponse>, ServiceError> {
    auth.require_admin()?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Validation("Matrix name is required".into()));
    }
    let sum = validate_weightages(&req.parameters)?;
    let new_status = resolve_status(req.status.as_deref(), sum)?;

    let org_id = auth.organization_id;
    let created_by = auth.id;
    let matrix_id = blocking(&state.conn, move |conn| {
        conn.transaction::<Uuid, ServiceError, _>(|conn| {
            check_parameters_exist(conn, org_id, &req.parameters)?;

            let now = Utc::now();
            let matrix = PerformanceMatrix {
                id: Uuid::new_v4(),
                organization_id: org_id,
                name,
                description: req.description,
                status: new_status.to_string(),
                version: 1,
                previous_version_id: None,
                created_by,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(performance_matrices::table)
                .values(&matrix)
                .execute(conn)?;
            insert_parameter_rows(conn, matrix.id, &req.parameters)?;
            Ok(matrix.id)
        })
    })
    .await?;

    info!("Matrix {} created in org {}", matrix_id, org_id);
    load_matrix_response(&state, matrix_id, org_id).await.map(Json)
}

pub async fn get_matrix(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<MatrixResponse>, ServiceError> {
    load_matrix_response(&state, id, auth.organization_id)
        .await
        .map(Json)
}

/// Draft matrices are edited in place; active and archived ones are
/// versioned by copy. Either way the matrix must not sit in an active
/// cycle assignment.
pub async fn update_matrix(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMatrixRequest>,
) -> Result<Json<MatrixResponse>, ServiceError> {
    auth.require_admin()?;
    if let Some(ref entries) = req.parameters {
        validate_weightages(entries)?;
    }

    let org_id = auth.organization_id;
    let result_id = blocking(&state.conn, move |conn| {
        conn.transaction::<Uuid, ServiceError, _>(|conn| {
            let matrix = find_matrix(conn, id, org_id)?;
            if matrix.status == status::DELETED {
                return Err(ServiceError::NotFound("Matrix not found".into()));
            }
            if matrix_in_active_cycle(conn, id)? {
                return Err(ServiceError::Conflict(
                    "Matrix is used by an active evaluation cycle and cannot be edited".into(),
                ));
            }

            let entries: Vec<WeightedParameterInput> = match req.parameters {
                Some(entries) => {
                    check_parameters_exist(conn, org_id, &entries)?;
                    entries
                }
                None => matrix_parameters::table
                    .filter(matrix_parameters::matrix_id.eq(id))
                    .load::<MatrixParameter>(conn)?
                    .into_iter()
                    .map(|p| WeightedParameterInput {
                        parameter_id: p.parameter_id,
                        weightage: p.weightage,
                    })
                    .collect(),
            };
            let sum = validate_weightages(&entries)?;

            let name = match req.name {
                Some(name) if name.trim().is_empty() => {
                    return Err(ServiceError::Validation("Matrix name is required".into()))
                }
                Some(name) => name.trim().to_string(),
                None => matrix.name.clone(),
            };
            let description = req.description.or_else(|| matrix.description.clone());

            if matrix.status == status::DRAFT {
                // In-place overwrite.
                let new_status = resolve_status(req.status.as_deref(), sum)?;
                diesel::update(performance_matrices::table.find(id))
                    .set((
                        performance_matrices::name.eq(&name),
                        performance_matrices::description.eq(description.clone()),
                        performance_matrices::status.eq(new_status),
                        performance_matrices::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                diesel::delete(
                    matrix_parameters::table.filter(matrix_parameters::matrix_id.eq(id)),
                )
                .execute(conn)?;
                insert_parameter_rows(conn, id, &entries)?;
                Ok(id)
            } else {
                // Version-by-copy: archive the current row, insert the
                // successor under a new id. An active predecessor hands its
                // status to the successor when the sum still allows it.
                let requested = req.status.clone().or_else(|| {
                    (matrix.status == status::ACTIVE).then(|| status::ACTIVE.to_string())
                });
                let new_status = resolve_status(requested.as_deref(), sum)?;

                diesel::update(performance_matrices::table.find(id))
                    .set((
                        performance_matrices::status.eq(status::ARCHIVED),
                        performance_matrices::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;

                let now = Utc::now();
                let successor = PerformanceMatrix {
                    id: Uuid::new_v4(),
                    organization_id: org_id,
                    name,
                    description,
                    status: new_status.to_string(),
                    version: matrix.version + 1,
                    previous_version_id: Some(matrix.id),
                    created_by: matrix.created_by,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(performance_matrices::table)
                    .values(&successor)
                    .execute(conn)?;
                insert_parameter_rows(conn, successor.id, &entries)?;
                Ok(successor.id)
            }
        })
    })
    .await?;

    load_matrix_response(&state, result_id, org_id).await.map(Json)
}

pub async fn delete_matrix(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    auth.require_admin()?;
    let org_id = auth.organization_id;
    blocking(&state.conn, move |conn| {
        let matrix = find_matrix(conn, id, org_id)?;
        if matrix.status == status::DELETED {
            return Err(ServiceError::NotFound("Matrix not found".into()));
        }
        if matrix_in_active_cycle(conn, id)? {
            return Err(ServiceError::Conflict(
                "Matrix is used by an active evaluation cycle and cannot be deleted".into(),
            ));
        }
        diesel::update(performance_matrices::table.find(id))
            .set((
                performance_matrices::status.eq(status::DELETED),
                performance_matrices::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Matrix {} deleted", id);
    Ok(Json(SuccessResponse::new("Matrix deleted")))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn find_matrix(
    conn: &mut PgConnection,
    id: Uuid,
    org_id: Uuid,
) -> Result<PerformanceMatrix, ServiceError> {
    performance_matrices::table
        .filter(performance_matrices::id.eq(id))
        .filter(performance_matrices::organization_id.eq(org_id))
        .first::<PerformanceMatrix>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Matrix not found".into()))
}

/// The usage guard: a dedicated existence query, deliberately not a DB
/// constraint. Cycle status compares case-insensitively.
pub fn matrix_in_active_cycle(conn: &mut PgConnection, matrix_id: Uuid) -> Result<bool, ServiceError> {
    Ok(diesel::dsl::select(diesel::dsl::exists(
        cycle_team_assignments::table
            .inner_join(evaluation_cycles::table)
            .filter(cycle_team_assignments::matrix_id.eq(matrix_id))
            .filter(evaluation_cycles::status.ilike("active")),
    ))
    .get_result::<bool>(conn)?)
}

fn check_parameters_exist(
    conn: &mut PgConnection,
    org_id: Uuid,
    entries: &[WeightedParameterInput],
) -> Result<(), ServiceError> {
    let wanted: Vec<Uuid> = entries.iter().map(|e| e.parameter_id).collect();
    let found: i64 = parameters_table::table
        .filter(parameters_table::id.eq_any(&wanted))
        .filter(
            parameters_table::organization_id
                .eq(org_id)
                .or(parameters_table::organization_id.is_null()),
        )
        .count()
        .get_result(conn)?;
    if found != wanted.len() as i64 {
        return Err(ServiceError::NotFound(
            "One or more parameters do not exist".into(),
        ));
    }
    Ok(())
}

fn insert_parameter_rows(
    conn: &mut PgConnection,
    matrix_id: Uuid,
    entries: &[WeightedParameterInput],
) -> Result<(), ServiceError> {
    let rows: Vec<MatrixParameter> = entries
        .iter()
        .map(|e| MatrixParameter {
            id: Uuid::new_v4(),
            matrix_id,
            parameter_id: e.parameter_id,
            weightage: e.weightage,
        })
        .collect();
    diesel::insert_into(matrix_parameters::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

async fn load_matrix_response(
    state: &Arc<AppState>,
    id: Uuid,
    org_id: Uuid,
) -> Result<MatrixResponse, ServiceError> {
    blocking(&state.conn, move |conn| {
        let matrix = find_matrix(conn, id, org_id)?;
        if matrix.status == status::DELETED {
            return Err(ServiceError::NotFound("Matrix not found".into()));
        }
        let parameters: Vec<(Uuid, String, i32)> = matrix_parameters::table
            .inner_join(parameters_table::table)
            .filter(matrix_parameters::matrix_id.eq(id))
            .select((
                matrix_parameters::parameter_id,
                parameters_table::name,
                matrix_parameters::weightage,
            ))
            .order(parameters_table::name.asc())
            .load(conn)?;

        let total_weightage = parameters.iter().map(|(_, _, w)| *w).sum();
        Ok(MatrixResponse {
            id: matrix.id,
            name: matrix.name,
            description: matrix.description,
            status: matrix.status,
            version: matrix.version,
            previous_version_id: matrix.previous_version_id,
            parameters: parameters
                .into_iter()
                .map(|(parameter_id, name, weightage)| MatrixParameterDetail {
                    parameter_id,
                    name,
                    weightage,
                })
                .collect(),
            total_weightage,
            created_at: matrix.created_at,
            updated_at: matrix.updated_at,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(weights: &[i32]) -> Vec<WeightedParameterInput> {
        weights
            .iter()
            .map(|w| WeightedParameterInput {
                parameter_id: Uuid::new_v4(),
                weightage: *w,
            })
            .collect()
    }

    #[test]
    fn test_weightage_sum_at_most_100() {
        assert_eq!(validate_weightages(&entries(&[60, 40])).unwrap(), 100);
        assert_eq!(validate_weightages(&entries(&[30, 20])).unwrap(), 50);
        assert!(validate_weightages(&entries(&[60, 50])).is_err());
    }

    #[test]
    fn test_weightage_bounds() {
        assert!(validate_weightages(&entries(&[0, 50])).is_err());
        assert!(validate_weightages(&entries(&[101])).is_err());
        assert!(validate_weightages(&entries(&[])).is_err());
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let id = Uuid::new_v4();
        let dup = vec![
            WeightedParameterInput {
                parameter_id: id,
                weightage: 50,
            },
            WeightedParameterInput {
                parameter_id: id,
                weightage: 50,
            },
        ];
        assert!(validate_weightages(&dup).is_err());
    }

    #[test]
    fn test_active_requires_exact_100() {
        // Requesting active with a partial sum silently stays draft.
        assert_eq!(resolve_status(Some("active"), 100).unwrap(), status::ACTIVE);
        assert_eq!(resolve_status(Some("active"), 90).unwrap(), status::DRAFT);
        assert_eq!(resolve_status(Some("Active"), 100).unwrap(), status::ACTIVE);
        assert_eq!(resolve_status(None, 100).unwrap(), status::DRAFT);
        assert_eq!(resolve_status(Some("draft"), 100).unwrap(), status::DRAFT);
    }

    #[test]
    fn test_archived_cannot_be_requested() {
        assert!(resolve_status(Some("archived"), 100).is_err());
        assert!(resolve_status(Some("deleted"), 100).is_err());
    }

    #[test]
    fn test_create_request_parse() {
        let json = r#"{
            "name": "Engineering Review",
            "parameters": [
                {"parameter_id": "123e4567-e89b-12d3-a456-426614174000", "weightage": 60},
                {"parameter_id": "123e4567-e89b-12d3-a456-426614174001", "weightage": 40}
            ],
            "status": "active"
        }"#;
        let req: CreateMatrixRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.parameters.len(), 2);
        assert_eq!(validate_weightages(&req.parameters).unwrap(), 100);
    }
}
