use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::feed::{FeedKey, FeedQuery};
use crate::domain::post::Post;

#[derive(Debug, Clone)]
pub(crate) struct NewPost {
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) user_id: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct PostPatch {
    pub(crate) title: String,
    pub(crate) text: String,
}

#[async_trait]
pub(crate) trait PostRepository: Send + Sync {
    async fn create_post(&self, input: NewPost) -> Result<Post, DomainError>;
    async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn update_post_owned(
        &self,
        post_id: i64,
        owner_id: i64,
        patch: PostPatch,
    ) -> Result<Option<Post>, DomainError>;
    async fn delete_post_owned(&self, post_id: i64, owner_id: i64) -> Result<bool, DomainError>;
    /// Posts in feed order (newest first), restricted by the query cursor.
    async fn list_feed(&self, query: FeedQuery) -> Result<Vec<Post>, DomainError>;
    async fn total_posts(&self) -> Result<i64, DomainError>;
    async fn oldest_post_key(&self) -> Result<Option<FeedKey>, DomainError>;
}
