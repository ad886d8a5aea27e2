//! Authentication and user registration service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{LoginRequest, LoginResponse, NewUser, RegisterRequest, User, UserClaims, UserInfo},
    repository::UserStore,
};

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Register a new account
    pub async fn register(&self, req: RegisterRequest) -> AppResult<UserInfo> {
        req.validate()?;

        if self.users.username_exists(&req.username).await? {
            return Err(AppError::Conflict("username already exists".to_string()));
        }

        let password = self.hash_password(&req.password)?;
        let user = self
            .users
            .insert(&NewUser {
                username: req.username,
                email: req.email,
                password,
                full_name: req.full_name,
            })
            .await?;

        tracing::info!("Registered user id={} username={}", user.id, user.username);
        Ok(user.into())
    }

    /// Authenticate by username and return a signed token
    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        req.validate()?;

        let invalid = || AppError::Authentication("invalid username or password".to_string());

        let user = self
            .users
            .get_by_username(&req.username)
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(&user, &req.password)? {
            tracing::info!("Rejected login for username={}", req.username);
            return Err(invalid());
        }

        let token = self.create_token_for_user(&user)?;
        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.token_lifetime_secs(),
            user: user.into(),
        })
    }

    /// Profile of an authenticated principal
    pub async fn get_by_id(&self, id: i64) -> AppResult<UserInfo> {
        Ok(self.users.get_by_id(id).await?.into())
    }

    /// Validate a bearer token against the configured secret
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("invalid token".to_string()))
    }

    fn token_lifetime_secs(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            exp: now + self.token_lifetime_secs(),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
