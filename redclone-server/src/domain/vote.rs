use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::post::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum VoteDirection {
    Upvote,
    Downvote,
}

impl VoteDirection {
    pub(crate) fn magnitude(self) -> i16 {
        match self {
            VoteDirection::Upvote => 1,
            VoteDirection::Downvote => -1,
        }
    }
}

/// One row of the ledger: the active vote of `user_id` on `post_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Vote {
    pub(crate) user_id: i64,
    pub(crate) post_id: i64,
    pub(crate) value: i16,
}

impl Vote {
    pub(crate) fn new(user_id: i64, post_id: i64, value: i16) -> Result<Self, DomainError> {
        if value != 1 && value != -1 {
            return Err(DomainError::Validation {
                field: "value",
                message: "must be 1 or -1",
            });
        }
        Ok(Self {
            user_id,
            post_id,
            value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoteOutcome {
    /// First vote of this user on the post.
    Created,
    /// Same direction as the existing vote; nothing is written.
    Unchanged,
    /// Existing vote flipped to the opposite direction.
    Reversed,
}

impl VoteOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            VoteOutcome::Created => "created",
            VoteOutcome::Unchanged => "unchanged",
            VoteOutcome::Reversed => "reversed",
        }
    }
}

/// Ledger write and point delta required to apply a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VotePlan {
    pub(crate) outcome: VoteOutcome,
    pub(crate) value: i16,
    pub(crate) points_delta: i64,
}

/// Decides how a vote changes the ledger given the value currently stored
/// for the (user, post) pair.
pub(crate) fn plan_vote(existing: Option<i16>, direction: VoteDirection) -> VotePlan {
    let value = direction.magnitude();
    match existing {
        None => VotePlan {
            outcome: VoteOutcome::Created,
            value,
            points_delta: i64::from(value),
        },
        Some(current) if current == value => VotePlan {
            outcome: VoteOutcome::Unchanged,
            value,
            points_delta: 0,
        },
        // undo the old vote and apply the new one in a single delta
        Some(_) => VotePlan {
            outcome: VoteOutcome::Reversed,
            value,
            points_delta: 2 * i64::from(value),
        },
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CastVoteResult {
    pub(crate) post: Post,
    pub(crate) outcome: VoteOutcome,
}
