use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::vote::{CastVoteResult, Vote, VoteDirection};

#[async_trait]
pub(crate) trait VoteLedger: Send + Sync {
    /// Records the vote and applies the matching point delta to the post as
    /// one atomic unit. Fails with `NotFound` for a missing post and with
    /// `TransactionAborted` when the unit could not be committed.
    async fn cast_vote(
        &self,
        user_id: i64,
        post_id: i64,
        direction: VoteDirection,
    ) -> Result<CastVoteResult, DomainError>;

    /// Active votes of `user_id` on any of `post_ids`.
    async fn find_votes(&self, user_id: i64, post_ids: &[i64]) -> Result<Vec<Vote>, DomainError>;
}
