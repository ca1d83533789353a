use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // expiration timestamp
    pub iat: i64,    // issued at
}

const BCRYPT_COST: u32 = 10;

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, BCRYPT_COST)
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, hash)
    }

    /// Hash a confession's secret code. Any collision-resistant one-way
    /// function satisfies the edit/delete guard; bcrypt is what we already
    /// carry for passwords.
    pub fn hash_secret_code(&self, code: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(code, BCRYPT_COST)
    }

    /// Verify a plaintext secret code against the hash stored on a
    /// confession.
    pub fn verify_secret_code(&self, code: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(code, hash)
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Generate the anonymous identity pair for a first-seen user:
    /// a stable `USER_xxxx` id and a matching `User_xxxx` display name.
    pub fn generate_anonymous_identity() -> (String, String) {
        let tag: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(4)
            .collect();
        (format!("USER_{}", tag), format!("User_{}", tag))
    }
}
