use crate::security::jwt::extract_bearer_token;
use crate::shared::error::ServiceError;
use crate::shared::models::roles;
use crate::shared::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

/// The authenticated employee, decoded from the Bearer token and inserted
/// into request extensions by `authentication_middleware`.
#[derive(Debug, Clone)]
pub struct AuthenticatedEmployee {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub organization_id: Uuid,
}

impl AuthenticatedEmployee {
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.has_role(roles::ADMIN) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Admin access required".into()))
        }
    }

    pub fn require_manager(&self) -> Result<(), ServiceError> {
        if self.has_role(roles::LINE_MANAGER) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Line manager access required".into(),
            ))
        }
    }
}

/// Validates the Bearer token and attaches the employee context. Routes
/// behind this layer can rely on the `AuthenticatedEmployee` extractor.
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        return unauthorized("Missing authorization token");
    };

    let claims = match state.jwt.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(&format!("Invalid token: {e}")),
    };

    let (Ok(id), Ok(organization_id)) = (claims.employee_id(), claims.org_id()) else {
        return unauthorized("Malformed token claims");
    };

    request.extensions_mut().insert(AuthenticatedEmployee {
        id,
        email: claims.email,
        role: claims.role,
        organization_id,
    });

    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "message": message,
    });
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", "Bearer")],
        Json(body),
    )
        .into_response()
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedEmployee
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedEmployee>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(role: &str) -> AuthenticatedEmployee {
        AuthenticatedEmployee {
            id: Uuid::new_v4(),
            email: "x@example.com".into(),
            role: role.into(),
            organization_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_role_gates() {
        assert!(employee(roles::ADMIN).require_admin().is_ok());
        assert!(employee(roles::STAFF).require_admin().is_err());
        assert!(employee(roles::LINE_MANAGER).require_manager().is_ok());
        assert!(employee(roles::ADMIN).require_manager().is_err());
    }
}
