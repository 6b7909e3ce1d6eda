use std::fmt::Write as _;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::data::reset_token_repository::{ResetToken, ResetTokenRepository};
use crate::data::user_repository::{NewUser, UserRepository};
use crate::domain::error::DomainError;
use crate::domain::user::{LoginRequest, RegisterRequest, ResetPasswordRequest, User};
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::mailer::{Mailer, OutgoingMail};

#[derive(Debug, Clone)]
pub(crate) struct AuthResult {
    pub(crate) user: User,
    pub(crate) access_token: String,
}

#[derive(Debug, Clone)]
pub(crate) struct PasswordResetConfig {
    pub(crate) token_ttl: Duration,
    /// Front-end origin the reset link points at.
    pub(crate) app_url: String,
}

pub(crate) struct AuthService<R, T, M>
where
    R: UserRepository,
    T: ResetTokenRepository,
    M: Mailer,
{
    repo: R,
    tokens: T,
    mailer: M,
    jwt: JwtService,
    reset: PasswordResetConfig,
}

impl<R, T, M> AuthService<R, T, M>
where
    R: UserRepository,
    T: ResetTokenRepository,
    M: Mailer,
{
    const DUMMY_PASSWORD_HASH: &'static str = "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$gwN6hT1sNdk9kI95f7n2Gl3fL0qRmBf2Ffkj2r90/0M";
    const RESET_TOKEN_BYTES: usize = 32;

    pub(crate) fn new(
        repo: R,
        tokens: T,
        mailer: M,
        jwt: JwtService,
        reset: PasswordResetConfig,
    ) -> Self {
        Self {
            repo,
            tokens,
            mailer,
            jwt,
            reset,
        }
    }

    pub(crate) async fn register(&self, req: RegisterRequest) -> Result<AuthResult, DomainError> {
        let req = req.validate()?;

        if self.repo.find_by_username(&req.username).await?.is_some() {
            return Err(DomainError::AlreadyExists { field: "username" });
        }
        if self.repo.find_by_email(&req.email).await?.is_some() {
            return Err(DomainError::AlreadyExists { field: "email" });
        }

        let password_hash = self.hash_password(&req.password)?;
        let new_user = Self::into_new_user(req, password_hash);
        let user = self.repo.create_user(new_user).await?;
        info!(user_id = user.id, "user registered");

        self.issue(user)
    }

    pub(crate) async fn login(&self, req: LoginRequest) -> Result<AuthResult, DomainError> {
        let req = req.validate()?;

        let user_creds = match self.repo.find_by_email(&req.email).await? {
            Some(user_creds) => user_creds,
            None => {
                // keep the timing of unknown emails close to a real verification
                match self.verify_password(&req.password, Self::DUMMY_PASSWORD_HASH) {
                    Ok(()) | Err(DomainError::InvalidCredentials) => {}
                    Err(err) => return Err(err),
                }
                return Err(DomainError::InvalidCredentials);
            }
        };

        self.verify_password(&req.password, &user_creds.password_hash)?;
        self.issue(user_creds.user)
    }

    pub(crate) async fn me(&self, user_id: i64) -> Result<User, DomainError> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user id: {user_id}")))
    }

    /// Always succeeds for unknown emails so callers cannot probe accounts.
    pub(crate) async fn forgot_password(&self, email: &str) -> Result<(), DomainError> {
        let email = email.trim().to_lowercase();
        let Some(creds) = self.repo.find_by_email(&email).await? else {
            return Ok(());
        };
        let user_id = creds.user.id;

        let raw_token = Self::generate_reset_token();
        let token_hash = self.hash_password(&raw_token)?;
        self.tokens
            .replace_token(ResetToken {
                user_id,
                token_hash,
                expires_at: Utc::now() + self.reset.token_ttl,
            })
            .await?;

        let link = format!(
            "{}/reset-password?token={raw_token}&userId={user_id}",
            self.reset.app_url
        );
        self.mailer
            .send(OutgoingMail {
                to: creds.user.email,
                subject: "Forgot Password Reset".to_string(),
                body: format!("Click here to reset your password: {link}"),
            })
            .await?;

        info!(user_id, "password reset token issued");
        Ok(())
    }

    pub(crate) async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<AuthResult, DomainError> {
        let req = req.validate()?;

        let stored = self
            .tokens
            .take_token(req.user_id)
            .await?
            .ok_or(DomainError::Validation {
                field: "token",
                message: "invalid or expired password reset token",
            })?;

        if stored.is_expired(Utc::now()) {
            return Err(DomainError::Validation {
                field: "token",
                message: "invalid or expired password reset token",
            });
        }

        match self.verify_password(&req.token, &stored.token_hash) {
            Ok(()) => {}
            Err(DomainError::InvalidCredentials) => {
                warn!(user_id = req.user_id, "password reset token mismatch");
                self.tokens.restore_token(stored).await?;
                return Err(DomainError::Validation {
                    field: "token",
                    message: "tokens do not match",
                });
            }
            Err(err) => return Err(err),
        }

        let user = self
            .repo
            .find_by_id(req.user_id)
            .await?
            .ok_or(DomainError::Validation {
                field: "token",
                message: "user does not exist",
            })?;

        let password_hash = self.hash_password(&req.password)?;
        self.repo
            .update_password_hash(user.id, &password_hash)
            .await?;
        info!(user_id = user.id, "password reset");

        self.issue(user)
    }

    pub(crate) fn hash_password(&self, raw_password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Self::argon2()?
            .hash_password(raw_password.as_bytes(), &salt)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Ok(password_hash.to_string())
    }

    pub(crate) fn verify_password(
        &self,
        raw_password: &str,
        password_hash: &str,
    ) -> Result<(), DomainError> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Self::argon2()?
            .verify_password(raw_password.as_bytes(), &parsed_hash)
            .map_err(|err| match err {
                PasswordHashError::Password => DomainError::InvalidCredentials,
                _ => DomainError::Unexpected(err.to_string()),
            })?;

        Ok(())
    }

    fn issue(&self, user: User) -> Result<AuthResult, DomainError> {
        let access_token = self
            .jwt
            .generate_token(user.id, &user.username)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;

        Ok(AuthResult { user, access_token })
    }

    fn into_new_user(req: RegisterRequest, password_hash: String) -> NewUser {
        NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        }
    }

    fn generate_reset_token() -> String {
        let mut bytes = [0u8; Self::RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        bytes.iter().fold(
            String::with_capacity(Self::RESET_TOKEN_BYTES * 2),
            |mut hex, byte| {
                let _ = write!(hex, "{byte:02x}");
                hex
            },
        )
    }

    fn argon2() -> Result<Argon2<'static>, DomainError> {
        let params = Params::new(19 * 1024, 2, 1, None)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}
