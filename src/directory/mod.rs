pub mod departments;
pub mod employees;
pub mod teams;

use crate::shared::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn configure_directory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/departments", get(departments::list_departments))
        .route("/api/departments", post(departments::create_department))
        .route("/api/departments/:id", get(departments::get_department))
        .route("/api/departments/:id", put(departments::update_department))
        .route("/api/departments/:id", delete(departments::delete_department))
        .route("/api/employees", get(employees::list_employees))
        .route("/api/employees", post(employees::create_employee))
        .route("/api/employees/:id", get(employees::get_employee))
        .route("/api/employees/:id", put(employees::update_employee))
        .route("/api/employees/:id", delete(employees::delete_employee))
        .route("/api/teams", get(teams::list_teams))
        .route("/api/teams", post(teams::create_team))
        .route("/api/teams/:id", get(teams::get_team))
        .route("/api/teams/:id", put(teams::update_team))
        .route("/api/teams/:id", delete(teams::delete_team))
        .route("/api/teams/:id/members", get(teams::list_members))
        .route("/api/teams/:id/members", post(teams::add_member))
        .route(
            "/api/teams/:id/members/:employee_id",
            delete(teams::remove_member),
        )
}
