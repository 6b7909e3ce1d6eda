use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::post_repository::{POST_COLUMNS, PostRow, map_row_to_post};
use crate::data::vote_ledger::VoteLedger;
use crate::domain::error::DomainError;
use crate::domain::vote::{CastVoteResult, Vote, VoteDirection, VoteOutcome, plan_vote};

/// Bounds for a single vote transaction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransactionPolicy {
    pub(crate) timeout: Duration,
    pub(crate) max_attempts: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct PostgresVoteLedger {
    pool: PgPool,
    policy: TransactionPolicy,
}

impl PostgresVoteLedger {
    pub(crate) fn new(pool: PgPool, policy: TransactionPolicy) -> Self {
        Self { pool, policy }
    }

    async fn try_cast_vote(
        &self,
        user_id: i64,
        post_id: i64,
        direction: VoteDirection,
    ) -> Result<CastVoteResult, AttemptError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // row lock makes concurrent votes on the same post queue up here
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AttemptError::Fatal(DomainError::post_not_found(post_id)));
        }

        let existing: Option<i16> =
            sqlx::query_scalar("SELECT value FROM votes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        let plan = plan_vote(existing, direction);
        match plan.outcome {
            VoteOutcome::Created => {
                sqlx::query("INSERT INTO votes (user_id, post_id, value) VALUES ($1, $2, $3)")
                    .bind(user_id)
                    .bind(post_id)
                    .bind(plan.value)
                    .execute(&mut *tx)
                    .await?;
            }
            VoteOutcome::Reversed => {
                sqlx::query("UPDATE votes SET value = $3 WHERE user_id = $1 AND post_id = $2")
                    .bind(user_id)
                    .bind(post_id)
                    .bind(plan.value)
                    .execute(&mut *tx)
                    .await?;
            }
            VoteOutcome::Unchanged => {}
        }

        let sql = format!(
            "UPDATE posts SET points = points + $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .bind(plan.points_delta)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let post = map_row_to_post(row).map_err(AttemptError::Fatal)?;
        Ok(CastVoteResult {
            post,
            outcome: plan.outcome,
        })
    }
}

enum AttemptError {
    Retryable(sqlx::Error),
    Fatal(DomainError),
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, racing duplicate insert
                Some("40001") | Some("40P01") | Some("23505") => {
                    return AttemptError::Retryable(err);
                }
                Some("23503") => {
                    return AttemptError::Fatal(DomainError::NotFound("user".to_string()));
                }
                _ => {}
            }
        }
        AttemptError::Fatal(DomainError::Unexpected(err.to_string()))
    }
}

#[async_trait]
impl VoteLedger for PostgresVoteLedger {
    async fn cast_vote(
        &self,
        user_id: i64,
        post_id: i64,
        direction: VoteDirection,
    ) -> Result<CastVoteResult, DomainError> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let outcome = tokio::time::timeout(
                self.policy.timeout,
                self.try_cast_vote(user_id, post_id, direction),
            )
            .await;

            match outcome {
                Ok(Ok(result)) => {
                    debug!(user_id, post_id, attempt, "vote transaction committed");
                    return Ok(result);
                }
                Ok(Err(AttemptError::Fatal(err))) => return Err(err),
                Ok(Err(AttemptError::Retryable(err))) => {
                    warn!(user_id, post_id, attempt, error = %err, "vote transaction conflict");
                }
                Err(_) => {
                    warn!(
                        user_id,
                        post_id,
                        attempt,
                        timeout_ms = self.policy.timeout.as_millis() as u64,
                        "vote transaction timed out"
                    );
                    return Err(DomainError::TransactionAborted);
                }
            }
        }

        Err(DomainError::TransactionAborted)
    }

    async fn find_votes(&self, user_id: i64, post_ids: &[i64]) -> Result<Vec<Vote>, DomainError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64, i64, i16)> = sqlx::query_as(
            r#"
            SELECT user_id, post_id, value
            FROM votes
            WHERE user_id = $1 AND post_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| DomainError::Unexpected(err.to_string()))?;

        rows.into_iter()
            .map(|(user_id, post_id, value)| {
                Vote::new(user_id, post_id, value)
                    .map_err(|err| DomainError::Unexpected(err.to_string()))
            })
            .collect()
    }
}
