use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use scholar_core::errors::ScholarError;
use scholar_core::{Identity, UserRole};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("No access token")]
    MissingToken,

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Access token has no subject")]
    MissingSubject,
}

impl From<IdentityError> for ScholarError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingSecret => ScholarError::general_error(err.to_string()),
            other => ScholarError::not_authenticated(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IdentityOptions {
    /// HMAC secret the backend signs access tokens with.
    pub jwt_secret: Option<String>,
    /// Expected `aud`; not checked when `None`.
    pub audience: Option<String>,
}

/// Verifies backend access tokens and turns them into identities.
#[derive(Clone)]
pub struct IdentityProvider {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl IdentityProvider {
    pub fn new(options: IdentityOptions) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match options.audience.as_deref() {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            key: options
                .jwt_secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }

    /// Verified claims of `token`.
    pub fn verify_claims(&self, token: &str) -> Result<Value, IdentityError> {
        let key = self.key.as_ref().ok_or(IdentityError::MissingSecret)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        decode::<Value>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let claims = self.verify_claims(token)?;
        let identity = identity_from_claims(&claims)?;
        debug!(user_id = %identity.id, role = %identity.role, "access token verified");
        Ok(identity)
    }
}

/// `sub` becomes the id. The role is read from `app_metadata.role`, then
/// `user_role`; anything else is a guest. `user_metadata` is writable by the
/// user and never consulted.
pub fn identity_from_claims(claims: &Value) -> Result<Identity, IdentityError> {
    let id = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(IdentityError::MissingSubject)?;

    let role = [
        claims.pointer("/app_metadata/role"),
        claims.get("user_role"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .find_map(|r| r.parse::<UserRole>().ok())
    .unwrap_or(UserRole::Guest);

    Ok(Identity::new(id, role))
}

/// `Bearer <token>` → `<token>`.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn sign(claims: Value) -> String {
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn provider(audience: Option<&str>) -> IdentityProvider {
        IdentityProvider::new(IdentityOptions {
            jwt_secret: Some(SECRET.to_string()),
            audience: audience.map(str::to_string),
        })
    }

    #[test]
    fn role_comes_from_app_metadata_first() {
        let token = sign(json!({
            "sub": "u1",
            "exp": exp(),
            "aud": "authenticated",
            "app_metadata": {"role": "school_admin"},
            "user_metadata": {"role": "teacher"}
        }));
        let identity = provider(Some("authenticated")).verify(&token).unwrap();
        assert_eq!(identity, Identity::new("u1", UserRole::SchoolAdmin));
    }

    #[test]
    fn user_editable_metadata_cannot_grant_a_role() {
        let claims = json!({"sub": "u1", "user_metadata": {"role": "super_admin"}});
        assert_eq!(identity_from_claims(&claims).unwrap().role, UserRole::Guest);

        let claims = json!({
            "sub": "u1",
            "user_metadata": {"role": "super_admin"},
            "user_role": "teacher"
        });
        assert_eq!(identity_from_claims(&claims).unwrap().role, UserRole::Teacher);
    }

    #[test]
    fn unknown_roles_fall_through_to_guest() {
        let claims = json!({"sub": "u2", "app_metadata": {"role": "janitor"}});
        assert_eq!(identity_from_claims(&claims).unwrap().role, UserRole::Guest);

        let claims = json!({"sub": "u3", "user_role": "super_admin"});
        assert_eq!(identity_from_claims(&claims).unwrap().role, UserRole::SuperAdmin);
    }

    #[test]
    fn tampered_and_expired_tokens_are_rejected() {
        let p = provider(None);
        let good = sign(json!({"sub": "u1", "exp": exp()}));
        let tampered = format!("{good}x");
        assert!(matches!(p.verify(&tampered), Err(IdentityError::InvalidToken(_))));

        let expired = sign(json!({"sub": "u1", "exp": chrono::Utc::now().timestamp() - 3600}));
        assert!(matches!(p.verify(&expired), Err(IdentityError::InvalidToken(_))));

        let wrong_aud = sign(json!({"sub": "u1", "exp": exp(), "aud": "other"}));
        assert!(provider(Some("authenticated")).verify(&wrong_aud).is_err());
    }

    #[test]
    fn missing_secret_is_a_server_error() {
        let p = IdentityProvider::new(IdentityOptions::default());
        let err = p.verify("abc").unwrap_err();
        assert_eq!(err, IdentityError::MissingSecret);
        assert_eq!(ScholarError::from(err).code(), 500);
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
    }
}
