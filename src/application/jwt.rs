//! Access-token validation. Tokens are minted by the external credential
//! service; this side only ever checks them and extracts the principal.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Parses the `sub` claim into the principal id; tokens from the credential
/// service always carry a UUID there.
pub fn principal_id(claims: &Claims) -> AppResult<Uuid> {
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::SecretString;

    fn secret() -> SecretString {
        SecretString::new("test-secret-do-not-use".to_string().into())
    }

    /// Stand-in for the external credential service.
    fn mint(user_id: Uuid, secret: &SecretString, ttl_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_tokens_from_the_credential_service() {
        let user_id = Uuid::new_v4();
        let token = mint(user_id, &secret(), 300);
        let claims = verify(&token, &secret()).unwrap();
        assert_eq!(principal_id(&claims).unwrap(), user_id);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint(Uuid::new_v4(), &secret(), 300);
        let other = SecretString::new("another-secret".to_string().into());
        assert!(matches!(
            verify(&token, &other),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_tokens() {
        let token = mint(Uuid::new_v4(), &secret(), -120);
        assert!(verify(&token, &secret()).is_err());
    }

    #[test]
    fn rejects_a_non_uuid_subject() {
        let claims = Claims {
            sub: "service-account".into(),
            iat: 0,
            exp: i64::MAX,
        };
        assert!(matches!(
            principal_id(&claims),
            Err(AppError::Unauthorized)
        ));
    }
}
