use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// The access flag: holding a valid token is what "logged in" means
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // login email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>, // only present when an expiry is configured
    pub iat: i64,
}

/// Issues a token for `email`. Without `expiration_hours` the token stays
/// valid until the client discards it.
pub fn create_token(email: &str, secret: &str, expiration_hours: Option<i64>) -> AppResult<String> {
    let now = Utc::now();

    let claims = Claims {
        sub: email.to_string(),
        exp: expiration_hours.map(|hours| (now + Duration::hours(hours)).timestamp()),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    // `exp` is checked when the token carries one, but not required
    let mut validation = Validation::default();
    validation.set_required_spec_claims::<&str>(&[]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("admin@petride.com", "secret", Some(1)).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "admin@petride.com");
        assert!(claims.exp.unwrap() > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("admin@petride.com", "secret", None).unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("admin@petride.com", "secret", Some(-2)).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn token_without_expiry_never_lapses() {
        let token = create_token("admin@petride.com", "secret", None).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert!(claims.exp.is_none());
    }

    #[test]
    fn old_token_without_expiry_still_verifies() {
        let issued = Utc::now() - Duration::days(400);
        let claims = Claims {
            sub: "admin@petride.com".to_string(),
            exp: None,
            iat: issued.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert_eq!(verify_token(&token, "secret").unwrap().iat, issued.timestamp());
    }
}
