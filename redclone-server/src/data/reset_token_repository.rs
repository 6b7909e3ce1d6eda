use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct ResetToken {
    pub(crate) user_id: i64,
    pub(crate) token_hash: String,
    pub(crate) expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub(crate) trait ResetTokenRepository: Send + Sync {
    /// Stores `token`, dropping any token previously issued to the same user.
    async fn replace_token(&self, token: ResetToken) -> Result<(), DomainError>;
    /// Removes and returns the user's token in one step, so at most one
    /// caller can ever hold it.
    async fn take_token(&self, user_id: i64) -> Result<Option<ResetToken>, DomainError>;
    /// Puts a taken token back unless a newer one was issued meanwhile.
    async fn restore_token(&self, token: ResetToken) -> Result<(), DomainError>;
}
