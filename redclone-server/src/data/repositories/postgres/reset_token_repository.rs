use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::reset_token_repository::{ResetToken, ResetTokenRepository};
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct PostgresResetTokenRepository {
    pool: PgPool,
}

impl PostgresResetTokenRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl ResetTokenRepository for PostgresResetTokenRepository {
    async fn replace_token(&self, token: ResetToken) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_token_db_error)?;

        Ok(())
    }

    async fn take_token(&self, user_id: i64) -> Result<Option<ResetToken>, DomainError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            DELETE FROM password_reset_tokens
            WHERE user_id = $1
            RETURNING user_id, token_hash, expires_at
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_token_db_error)?;

        Ok(row.map(|r| ResetToken {
            user_id: r.user_id,
            token_hash: r.token_hash,
            expires_at: r.expires_at,
        }))
    }

    async fn restore_token(&self, token: ResetToken) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_token_db_error)?;

        Ok(())
    }
}

fn map_token_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23503")
    {
        return DomainError::NotFound("user".to_string());
    }
    DomainError::Unexpected(err.to_string())
}
