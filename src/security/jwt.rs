use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access-token claims. `sub` is the employee id; `role` and
/// `organization_id` travel with the token so request handling never has to
/// re-read them per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub email: String,
    pub role: String,
    pub organization_id: String,
}

impl Claims {
    pub fn new(
        employee_id: Uuid,
        email: &str,
        role: &str,
        organization_id: Uuid,
        expiry_hours: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: employee_id.to_string(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
            iat: now.timestamp(),
            email: email.to_string(),
            role: role.to_string(),
            organization_id: organization_id.to_string(),
        }
    }

    pub fn employee_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid employee ID in claims: {e}"))
    }

    pub fn org_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.organization_id)
            .map_err(|e| anyhow!("Invalid organization ID in claims: {e}"))
    }
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters"));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode token: {e}"))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);
        validation.leeway = 60;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::from_secret("this-is-a-very-long-secret-key-for-testing-purposes-only")
            .expect("Failed to create manager")
    }

    #[test]
    fn test_token_round_trip() {
        let manager = create_test_manager();
        let employee_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let claims = Claims::new(employee_id, "ana@example.com", "line-manager", org_id, 24);
        let token = manager.generate_token(&claims).expect("Failed to encode");

        let decoded = manager.validate_token(&token).expect("Validation failed");
        assert_eq!(decoded.employee_id().unwrap(), employee_id);
        assert_eq!(decoded.org_id().unwrap(), org_id);
        assert_eq!(decoded.email, "ana@example.com");
        assert_eq!(decoded.role, "line-manager");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let manager = create_test_manager();
        assert!(manager.validate_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::from_secret("another-very-long-secret-key-used-by-someone-else")
            .expect("Failed to create manager");

        let claims = Claims::new(Uuid::new_v4(), "x@example.com", "staff", Uuid::new_v4(), 1);
        let token = other.generate_token(&claims).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtManager::from_secret("too-short").is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }
}
