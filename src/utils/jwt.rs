use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::{Identity, UserRole},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Result<Identity> {
        let user_id = self
            .sub
            .parse::<i32>()
            .map_err(|_| AppError::Unauthorized("Unauthorized".to_string()))?;

        Ok(Identity {
            user_id,
            role: self.role,
        })
    }
}

pub fn generate_token(secret: &str, user_id: i32, role: UserRole) -> Result<String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(30))
        .ok_or_else(|| AppError::InternalError("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Token generation failed: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_carry_identity() {
        let token = generate_token("secret", 42, UserRole::Admin).unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(
            claims.identity().unwrap(),
            Identity {
                user_id: 42,
                role: UserRole::Admin
            }
        );
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = generate_token("secret", 42, UserRole::Customer).unwrap();
        let err = verify_token("other", &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let claims = Claims {
            sub: "abc".to_string(),
            role: UserRole::Admin,
            exp: 0,
        };
        assert!(claims.identity().is_err());
    }
}
