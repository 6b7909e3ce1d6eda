use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use super::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

impl RegisterRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let email = normalize_email(&self.email)?;
        let username = normalize_register_username(&self.username)?;
        validate_password(&self.password)?;
        Ok(Self {
            username,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

impl LoginRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::Validation {
                field: "email",
                message: "must not be empty",
            });
        }

        if self.password.is_empty() {
            return Err(DomainError::Validation {
                field: "password",
                message: "must not be empty",
            });
        }
        Ok(Self {
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResetPasswordRequest {
    pub(crate) user_id: i64,
    pub(crate) token: String,
    pub(crate) password: String,
}

impl ResetPasswordRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        validate_password(&self.password)?;
        if self.token.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "token",
                message: "must not be empty",
            });
        }
        Ok(Self {
            user_id: self.user_id,
            token: self.token.trim().to_string(),
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct User {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn new(
        id: i64,
        username: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if id <= 0 {
            return Err(DomainError::Validation {
                field: "id",
                message: "must be > 0",
            });
        }
        let username = normalize_register_username(&username.into())?;
        let email = normalize_email(&email.into())?;

        Ok(Self {
            id,
            username,
            email,
            created_at,
        })
    }
}

pub(crate) fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(DomainError::Validation {
            field: "email",
            message: "must be a valid email",
        });
    }
    Ok(email)
}

fn normalize_register_username(username: &str) -> Result<String, DomainError> {
    let username = username.trim();
    let len = username.chars().count();
    if !(3..=64).contains(&len) {
        return Err(DomainError::Validation {
            field: "username",
            message: "must be 3..64 chars",
        });
    }
    // '@' is reserved so usernames never look like emails
    if username.contains('@') {
        return Err(DomainError::Validation {
            field: "username",
            message: "must not contain '@'",
        });
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    let password_len = password.chars().count();
    if !(8..=128).contains(&password_len) {
        return Err(DomainError::Validation {
            field: "password",
            message: "must be 8..128 chars",
        });
    }
    Ok(())
}
