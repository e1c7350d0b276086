//! HS256 identity token validation.
//!
//! Tokens are issued by the external identity provider; this server only
//! verifies them with the shared secret. [`generate_access_token`] exists
//! for tests and local tooling.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use skinscan_core::types::UserId;

/// Claims read from an identity token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's identity-provider id.
    pub sub: UserId,
    /// Contact address, used to match checkout events to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Configuration for identity token validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the identity provider.
    pub secret: String,
    /// Expected `aud` claim. Audience is not checked when unset.
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var        | Required | Default |
    /// |----------------|----------|---------|
    /// | `JWT_SECRET`   | **yes**  | --      |
    /// | `JWT_AUDIENCE` | no       | unset   |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let audience = std::env::var("JWT_AUDIENCE").ok().filter(|s| !s.is_empty());

        Self { secret, audience }
    }
}

/// Sign a token for `user_id` valid for `ttl_secs`.
pub fn generate_access_token(
    user_id: UserId,
    email: Option<&str>,
    ttl_secs: i64,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.map(str::to_string),
        exp: now + ttl_secs,
        iat: now,
        aud: config.audience.clone(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode a token, returning the embedded [`Claims`].
///
/// Checks the signature and expiry, and the audience when one is configured.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            audience: None,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = test_config();
        let user = Uuid::new_v4();
        let token = generate_access_token(user, Some("ada@example.com"), 900, &config)
            .expect("token generation should succeed");

        let claims = validate_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        // Well beyond the default 60-second leeway.
        let token = generate_access_token(Uuid::new_v4(), None, -300, &config).unwrap();
        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn test_different_secrets_fail() {
        let config_a = test_config();
        let config_b = JwtConfig {
            secret: "secret-bravo".to_string(),
            audience: None,
        };

        let token = generate_access_token(Uuid::new_v4(), None, 900, &config_a).unwrap();
        assert!(validate_token(&token, &config_b).is_err());
    }

    #[test]
    fn test_audience_is_enforced_when_configured() {
        let issuer = JwtConfig {
            audience: Some("authenticated".into()),
            ..test_config()
        };
        let token = generate_access_token(Uuid::new_v4(), None, 900, &issuer).unwrap();

        // Unconfigured audience accepts any aud claim.
        assert!(validate_token(&token, &test_config()).is_ok());
        assert!(validate_token(&token, &issuer).is_ok());

        let other = JwtConfig {
            audience: Some("service_role".into()),
            ..test_config()
        };
        assert!(validate_token(&token, &other).is_err());
    }
}
