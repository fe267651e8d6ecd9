use anyhow::{Context, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::models::{CreateUserParams, User};

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (username)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
    pub jti: String, // Token id
}

/// Usernames are plain ASCII letters and digits
fn validate_alphanum(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanum"))
    }
}

/// User Registration Request
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[schema(example = "alice")]
    #[validate(length(min = 3, max = 32), custom(function = "validate_alphanum"))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(length(min = 6))]
    pub password: String,
    #[schema(example = "Alice Doe")]
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    #[validate(email)]
    pub email: String,
}

/// User Login Request
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[schema(example = "alice")]
    #[validate(length(min = 3, max = 32), custom(function = "validate_alphanum"))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(length(min = 6))]
    pub password: String,
}

/// Public user profile
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Login Response (JWT)
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC hash string
pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| anyhow!("Invalid hash format: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UserAuthService {
    ledger: Ledger,
    jwt_secret: String,
    token_ttl: Duration,
}

impl UserAuthService {
    pub fn new(ledger: Ledger, jwt_secret: String, token_ttl_hours: i64) -> Self {
        Self {
            ledger,
            jwt_secret,
            token_ttl: Duration::hours(token_ttl_hours),
        }
    }

    /// Register a new user
    pub async fn register(&self, req: CreateUserRequest) -> Result<User, AuthError> {
        // 1. Hash password
        let hashed_password = hash_password(&req.password)?;

        // 2. Insert
        let mut conn = self.ledger.acquire().await?;
        let user = conn
            .create_user(CreateUserParams {
                username: req.username,
                full_name: req.full_name,
                email: req.email,
                hashed_password,
            })
            .await?;

        tracing::info!(username = %user.username, "User registered");
        Ok(user)
    }

    /// Login user and issue JWT
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AuthError> {
        // 1. Find user
        let mut conn = self.ledger.acquire().await?;
        let user = conn.get_user(&req.username).await?;

        // 2. Verify password
        if !verify_password(&req.password, &user.hashed_password)? {
            return Err(AuthError::InvalidCredentials);
        }

        // 3. Generate JWT
        let (access_token, claims) = self.issue_token(&user.username)?;
        let access_token_expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0)
            .context("token expiry out of range")?;

        Ok(LoginResponse {
            access_token,
            access_token_expires_at,
            user: user.into(),
        })
    }

    /// Sign a token for `username`
    pub fn issue_token(&self, username: &str) -> anyhow::Result<(String, Claims)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.token_ttl)
            .context("token expiry out of range")?;

        let claims = Claims {
            sub: username.to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to generate token")?;

        Ok((token, claims))
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> anyhow::Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}
