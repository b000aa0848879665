use crate::security::jwt::Claims;
use crate::security::password::{hash_password, verify_password};
use crate::shared::error::ServiceError;
use crate::shared::models::{roles, Employee, EmployeeProfile, Organization};
use crate::shared::schema::{employees, organizations};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub employee: EmployeeProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ServiceError::Validation(
            "Email and password are required".into(),
        ));
    }

    let employee: Employee = blocking(&state.conn, move |conn| {
        employees::table
            .filter(employees::email.eq(&email))
            .filter(employees::deleted_at.is_null())
            .first::<Employee>(conn)
            .optional()?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid email or password".into()))
    })
    .await?;

    if !employee.is_active {
        return Err(ServiceError::Unauthorized("Account is deactivated".into()));
    }

    if !verify_password(&req.password, &employee.password_hash) {
        return Err(ServiceError::Unauthorized(
            "Invalid email or password".into(),
        ));
    }

    let claims = Claims::new(
        employee.id,
        &employee.email,
        &employee.role,
        employee.organization_id,
        state.config.auth.token_expiry_hours,
    );
    let token = state
        .jwt
        .generate_token(&claims)
        .map_err(|e| ServiceError::Internal(format!("token generation failed: {e}")))?;

    info!("Employee {} logged in", employee.id);
    Ok(Json(LoginResponse {
        success: true,
        token,
        employee: employee.into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub organization_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Tenant onboarding: creates the organization and its first admin in one
/// transaction, then signs the admin in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let organization_name = req.organization_name.trim().to_string();
    if organization_name.is_empty() {
        return Err(ServiceError::Validation(
            "Organization name is required".into(),
        ));
    }
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation("A valid email is required".into()));
    }
    if req.password.len() < 8 {
        return Err(ServiceError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "First and last name are required".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let slug = slugify(&organization_name);

    let employee = blocking(&state.conn, move |conn| {
        conn.transaction::<Employee, ServiceError, _>(|conn| {
            let email_taken = diesel::dsl::select(diesel::dsl::exists(
                employees::table.filter(employees::email.eq(&email)),
            ))
            .get_result::<bool>(conn)?;
            if email_taken {
                return Err(ServiceError::Conflict(format!(
                    "Email '{}' is already registered",
                    email
                )));
            }
            let slug_taken = diesel::dsl::select(diesel::dsl::exists(
                organizations::table.filter(organizations::slug.eq(&slug)),
            ))
            .get_result::<bool>(conn)?;
            if slug_taken {
                return Err(ServiceError::Conflict(format!(
                    "Organization '{}' is already registered",
                    organization_name
                )));
            }

            let now = Utc::now();
            let organization = Organization {
                id: Uuid::new_v4(),
                name: organization_name,
                slug,
                created_at: now,
            };
            diesel::insert_into(organizations::table)
                .values(&organization)
                .execute(conn)?;

            let employee = Employee {
                id: Uuid::new_v4(),
                organization_id: organization.id,
                department_id: None,
                email,
                password_hash,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                role: roles::ADMIN.to_string(),
                position: None,
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
    })
    .await?;

    let claims = Claims::new(
        employee.id,
        &employee.email,
        &employee.role,
        employee.organization_id,
        state.config.auth.token_expiry_hours,
    );
    let token = state
        .jwt
        .generate_token(&claims)
        .map_err(|e| ServiceError::Internal(format!("token generation failed: {e}")))?;

    info!(
        "Organization {} registered with admin {}",
        employee.organization_id, employee.id
    );
    Ok(Json(LoginResponse {
        success: true,
        token,
        employee: employee.into(),
    }))
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_parse() {
        let json = r#"{"email": "ana@example.com", "password": "hunter22"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.email, "ana@example.com");
        assert_eq!(req.password, "hunter22");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Acme -- Corp!  "), "acme-corp");
        assert_eq!(slugify("Perfomix"), "perfomix");
        assert_eq!(slugify("!!!"), "");
    }
}
