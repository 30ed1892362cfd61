//! Account registration, login and bearer-token authentication.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};

use storage::repository::{
    NewUser, StorageError, TokenRecord, TokenRepository, UserRecord, UserRepository,
};

use crate::Clock;
use crate::error::AuthError;

const TOKEN_VALIDITY_DAYS: i64 = 7;

/// Registration input before validation.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to the username when absent.
    pub full_name: Option<String>,
}

/// A logged-in user together with their bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Password and token management over the user and token repositories.
///
/// Passwords are stored as salted Argon2id PHC strings; tokens are opaque
/// random 256-bit hex strings with a fixed validity window.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenRepository>) -> Self {
        Self {
            clock,
            users,
            tokens,
        }
    }

    /// Create an account and log it in.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, `AlreadyRegistered` when
    /// the username or email is taken, or a storage error. No partial state
    /// is retained on failure.
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError> {
        let username = validate_username(&input.username)?;
        let email = validate_email(&input.email)?;
        validate_password(&input.password)?;
        let full_name = validate_full_name(input.full_name.as_deref(), &username)?;

        let password_hash = hash_password(&input.password)?;
        let user = self
            .users
            .create_user(&NewUser {
                username,
                email,
                password_hash,
                full_name,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| match e {
                StorageError::Conflict => AuthError::AlreadyRegistered,
                other => AuthError::Storage(other),
            })?;

        self.issue_session(user).await
    }

    /// Log in with a username **or** email plus password.
    ///
    /// # Errors
    ///
    /// Returns the same `InvalidCredentials` for an unknown login and a
    /// wrong password, or a storage error.
    pub async fn login(&self, login: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self
            .users
            .find_by_login(login.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;
        self.issue_session(user).await
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for unknown or expired tokens.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AuthError> {
        let record = self
            .tokens
            .find_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if record.expires_at <= self.clock.now() {
            return Err(AuthError::InvalidToken);
        }
        self.users
            .get_user(record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Invalidate a token. Unknown tokens are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error only.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.tokens.delete_token(token).await?;
        Ok(())
    }

    async fn issue_session(&self, user: UserRecord) -> Result<AuthSession, AuthError> {
        let issued_at = self.clock.now();
        let expires_at = issued_at + Duration::days(TOKEN_VALIDITY_DAYS);
        let token = generate_token();
        self.tokens
            .store_token(&TokenRecord {
                token: token.clone(),
                user_id: user.id,
                issued_at,
                expires_at,
            })
            .await?;
        Ok(AuthSession {
            user,
            token,
            expires_at,
        })
    }
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

fn validate_username(raw: &str) -> Result<String, AuthError> {
    let username = raw.trim();
    if username.chars().count() < 3 || username.chars().count() > 50 {
        return Err(AuthError::InvalidUsername);
    }
    Ok(username.to_string())
}

fn validate_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    let domain_ok = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
    if local.is_empty() || !domain_ok || email.contains(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email.to_ascii_lowercase())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 6 {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

fn validate_full_name(full_name: Option<&str>, username: &str) -> Result<String, AuthError> {
    match full_name.map(str::trim) {
        None | Some("") => Ok(username.to_string()),
        Some(name) if name.chars().count() > 100 => Err(AuthError::FullNameTooLong),
        Some(name) => Ok(name.to_string()),
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn generate_token() -> String {
    let hi: u128 = rand::random();
    let lo: u128 = rand::random();
    format!("{hi:032x}{lo:032x}")
}
