use std::collections::HashMap;

use tracing::{debug, info};

use crate::application::loaders::RequestContext;
use crate::data::post_repository::{NewPost, PostPatch, PostRepository};
use crate::data::user_repository::UserRepository;
use crate::data::vote_ledger::VoteLedger;
use crate::domain::error::DomainError;
use crate::domain::feed::{FeedCursor, FeedPage, FeedQuery};
use crate::domain::post::{CreatePostRequest, Post, UpdatePostRequest};
use crate::domain::user::User;
use crate::domain::vote::{VoteDirection, VoteOutcome};

/// A post as seen by the acting user.
#[derive(Debug, Clone)]
pub(crate) struct PostView {
    pub(crate) post: Post,
    pub(crate) author: Option<User>,
    /// 0 when anonymous or not voted, otherwise the stored magnitude.
    pub(crate) vote_type: i16,
}

#[derive(Debug, Clone)]
pub(crate) struct FeedPageView {
    pub(crate) posts: Vec<PostView>,
    pub(crate) total_count: i64,
    pub(crate) has_more: bool,
    pub(crate) cursor: Option<FeedCursor>,
}

#[derive(Debug, Clone)]
pub(crate) struct VoteResult {
    pub(crate) post: PostView,
    pub(crate) outcome: VoteOutcome,
}

pub(crate) struct PostService<P, V, U>
where
    P: PostRepository,
    V: VoteLedger,
    U: UserRepository,
{
    posts: P,
    votes: V,
    users: U,
}

impl<P, V, U> PostService<P, V, U>
where
    P: PostRepository,
    V: VoteLedger,
    U: UserRepository,
{
    pub(crate) fn new(posts: P, votes: V, users: U) -> Self {
        Self {
            posts,
            votes,
            users,
        }
    }

    pub(crate) async fn create_post(
        &self,
        ctx: &RequestContext,
        req: CreatePostRequest,
    ) -> Result<PostView, DomainError> {
        let user_id = ctx.require_user()?;
        let req = req.validate()?;

        let new_post = NewPost {
            title: req.title,
            text: req.text,
            user_id,
        };
        let post = self.posts.create_post(new_post).await?;
        info!(post_id = post.id, user_id, "post created");

        self.decorate_one(ctx, post).await
    }

    pub(crate) async fn get_post(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> Result<PostView, DomainError> {
        let post = self.load_post(id).await?;
        self.decorate_one(ctx, post).await
    }

    pub(crate) async fn update_post(
        &self,
        ctx: &RequestContext,
        post_id: i64,
        req: UpdatePostRequest,
    ) -> Result<PostView, DomainError> {
        let user_id = ctx.require_user()?;
        let req = req.validate()?;

        let original = self.load_post(post_id).await?;
        if !original.is_owned_by(user_id) {
            return Err(DomainError::Forbidden);
        }

        let patch = PostPatch {
            title: req.title,
            text: req.text,
        };
        let post = self
            .posts
            .update_post_owned(post_id, user_id, patch)
            .await?
            .ok_or_else(|| DomainError::post_not_found(post_id))?;
        info!(post_id, user_id, "post updated");

        self.decorate_one(ctx, post).await
    }

    pub(crate) async fn delete_post(
        &self,
        ctx: &RequestContext,
        post_id: i64,
    ) -> Result<(), DomainError> {
        let user_id = ctx.require_user()?;

        let original = self.load_post(post_id).await?;
        if !original.is_owned_by(user_id) {
            return Err(DomainError::Forbidden);
        }

        let deleted = self.posts.delete_post_owned(post_id, user_id).await?;
        if !deleted {
            return Err(DomainError::post_not_found(post_id));
        }
        info!(post_id, user_id, "post deleted");
        Ok(())
    }

    /// One window of the newest-first feed.
    pub(crate) async fn get_page(
        &self,
        ctx: &RequestContext,
        limit: Option<i64>,
        cursor: Option<FeedCursor>,
    ) -> Result<FeedPageView, DomainError> {
        let query = FeedQuery::new(limit, cursor);
        let window = self.posts.list_feed(query).await?;
        let total_count = self.posts.total_posts().await?;
        let oldest = self.posts.oldest_post_key().await?;

        let page = FeedPage::assemble(window, total_count, oldest);
        debug!(
            limit = query.limit,
            returned = page.posts.len(),
            has_more = page.has_more,
            "feed page loaded"
        );

        Ok(FeedPageView {
            posts: self.decorate(ctx, page.posts).await?,
            total_count: page.total_count,
            has_more: page.has_more,
            cursor: page.cursor,
        })
    }

    pub(crate) async fn vote(
        &self,
        ctx: &RequestContext,
        post_id: i64,
        direction: VoteDirection,
    ) -> Result<VoteResult, DomainError> {
        let user_id = ctx.require_user()?;

        let result = self.votes.cast_vote(user_id, post_id, direction).await?;
        info!(
            post_id,
            user_id,
            outcome = result.outcome.as_str(),
            points = result.post.points,
            "vote cast"
        );

        // every outcome leaves the ledger holding the requested direction
        ctx.vote_types
            .prime((user_id, post_id), direction.magnitude());
        let post = self.decorate_one(ctx, result.post).await?;

        Ok(VoteResult {
            post,
            outcome: result.outcome,
        })
    }

    async fn load_post(&self, id: i64) -> Result<Post, DomainError> {
        self.posts
            .get_post(id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(id))
    }

    async fn decorate_one(&self, ctx: &RequestContext, post: Post) -> Result<PostView, DomainError> {
        self.decorate(ctx, vec![post])
            .await?
            .pop()
            .ok_or_else(|| DomainError::Unexpected("decorated post missing".to_string()))
    }

    /// Attaches authors and the acting user's vote types, one batch per loader.
    async fn decorate(
        &self,
        ctx: &RequestContext,
        posts: Vec<Post>,
    ) -> Result<Vec<PostView>, DomainError> {
        let author_ids: Vec<i64> = posts.iter().map(|post| post.user_id).collect();
        let authors = ctx
            .users
            .load_many(&author_ids, |ids| async move {
                self.users.find_by_ids(&ids).await.map(|users| {
                    users
                        .into_iter()
                        .map(|user| (user.id, user))
                        .collect::<Vec<_>>()
                })
            })
            .await?;

        let vote_types = match ctx.acting_user_id() {
            Some(user_id) => {
                let keys: Vec<(i64, i64)> = posts.iter().map(|post| (user_id, post.id)).collect();
                ctx.vote_types
                    .load_many(&keys, |keys| async move {
                        let post_ids: Vec<i64> = keys.iter().map(|(_, post_id)| *post_id).collect();
                        self.votes.find_votes(user_id, &post_ids).await.map(|votes| {
                            votes
                                .into_iter()
                                .map(|vote| ((vote.user_id, vote.post_id), vote.value))
                                .collect::<Vec<_>>()
                        })
                    })
                    .await?
            }
            None => HashMap::new(),
        };

        Ok(posts
            .into_iter()
            .map(|post| {
                let vote_type = ctx
                    .acting_user_id()
                    .and_then(|user_id| vote_types.get(&(user_id, post.id)).copied())
                    .unwrap_or(0);
                PostView {
                    author: authors.get(&post.user_id).cloned(),
                    vote_type,
                    post,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::PostService;
    use crate::application::loaders::RequestContext;
    use crate::data::post_repository::{NewPost, PostPatch, PostRepository};
    use crate::data::user_repository::{NewUser, UserCredentials, UserRepository};
    use crate::data::vote_ledger::VoteLedger;
    use crate::domain::error::DomainError;
    use crate::domain::feed::{FeedCursor, FeedKey, FeedQuery};
    use crate::domain::post::{CreatePostRequest, Post, UpdatePostRequest};
    use crate::domain::user::User;
    use crate::domain::vote::{CastVoteResult, Vote, VoteDirection, VoteOutcome, plan_vote};

    #[derive(Default)]
    struct StoreState {
        posts: Vec<Post>,
        votes: HashMap<(i64, i64), i16>,
        users: Vec<User>,
        next_post_id: i64,
    }

    /// In-memory posts, ledger and users behind one async lock, so every
    /// ledger call is atomic the way a serializable transaction is.
    #[derive(Clone, Default)]
    struct MemoryStore {
        state: Arc<tokio::sync::Mutex<StoreState>>,
        user_fetches: Arc<AtomicUsize>,
        vote_fetches: Arc<AtomicUsize>,
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    impl MemoryStore {
        fn with_users(ids: &[i64]) -> Self {
            let store = Self::default();
            {
                let mut state = store.state.try_lock().expect("fresh store is unlocked");
                state.users = ids
                    .iter()
                    .map(|id| {
                        User::new(*id, format!("user{id}"), format!("user{id}@example.com"), base_time())
                            .expect("sample user must be valid")
                    })
                    .collect();
            }
            store
        }

        async fn points_of(&self, post_id: i64) -> i64 {
            let state = self.state.lock().await;
            state
                .posts
                .iter()
                .find(|post| post.id == post_id)
                .map(|post| post.points)
                .expect("post must exist")
        }

        async fn ledger_sum(&self, post_id: i64) -> i64 {
            let state = self.state.lock().await;
            state
                .votes
                .iter()
                .filter(|((_, p), _)| *p == post_id)
                .map(|(_, value)| i64::from(*value))
                .sum()
        }
    }

    #[async_trait]
    impl PostRepository for MemoryStore {
        async fn create_post(&self, input: NewPost) -> Result<Post, DomainError> {
            let mut state = self.state.lock().await;
            if state.posts.iter().any(|post| post.title == input.title) {
                return Err(DomainError::AlreadyExists { field: "title" });
            }
            state.next_post_id += 1;
            let id = state.next_post_id;
            let at = base_time() + Duration::minutes(id);
            let post = Post::new(id, input.title, input.text, input.user_id, 0, at, at)?;
            state.posts.push(post.clone());
            Ok(post)
        }

        async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError> {
            let state = self.state.lock().await;
            Ok(state.posts.iter().find(|post| post.id == id).cloned())
        }

        async fn update_post_owned(
            &self,
            post_id: i64,
            owner_id: i64,
            patch: PostPatch,
        ) -> Result<Option<Post>, DomainError> {
            let mut state = self.state.lock().await;
            let Some(post) = state
                .posts
                .iter_mut()
                .find(|post| post.id == post_id && post.user_id == owner_id)
            else {
                return Ok(None);
            };
            post.title = patch.title;
            post.text = patch.text;
            Ok(Some(post.clone()))
        }

        async fn delete_post_owned(&self, post_id: i64, owner_id: i64) -> Result<bool, DomainError> {
            let mut state = self.state.lock().await;
            let before = state.posts.len();
            state
                .posts
                .retain(|post| !(post.id == post_id && post.user_id == owner_id));
            let deleted = state.posts.len() < before;
            if deleted {
                state.votes.retain(|(_, p), _| *p != post_id);
            }
            Ok(deleted)
        }

        async fn list_feed(&self, query: FeedQuery) -> Result<Vec<Post>, DomainError> {
            let state = self.state.lock().await;
            let mut posts: Vec<Post> = state
                .posts
                .iter()
                .filter(|post| {
                    query
                        .cursor
                        .is_none_or(|cursor| cursor.admits(FeedKey::from(*post)))
                })
                .cloned()
                .collect();
            posts.sort_by_key(|post| std::cmp::Reverse(FeedKey::from(post)));
            posts.truncate(query.limit as usize);
            Ok(posts)
        }

        async fn total_posts(&self) -> Result<i64, DomainError> {
            Ok(self.state.lock().await.posts.len() as i64)
        }

        async fn oldest_post_key(&self) -> Result<Option<FeedKey>, DomainError> {
            let state = self.state.lock().await;
            Ok(state.posts.iter().map(FeedKey::from).min())
        }
    }

    #[async_trait]
    impl VoteLedger for MemoryStore {
        async fn cast_vote(
            &self,
            user_id: i64,
            post_id: i64,
            direction: VoteDirection,
        ) -> Result<CastVoteResult, DomainError> {
            let mut state = self.state.lock().await;
            if !state.posts.iter().any(|post| post.id == post_id) {
                return Err(DomainError::post_not_found(post_id));
            }
            let existing = state.votes.get(&(user_id, post_id)).copied();
            // give a concurrent caller the chance to interleave if it could
            tokio::task::yield_now().await;

            let plan = plan_vote(existing, direction);
            if plan.outcome != VoteOutcome::Unchanged {
                state.votes.insert((user_id, post_id), plan.value);
            }
            let post = state
                .posts
                .iter_mut()
                .find(|post| post.id == post_id)
                .ok_or_else(|| DomainError::post_not_found(post_id))?;
            post.points += plan.points_delta;

            Ok(CastVoteResult {
                post: post.clone(),
                outcome: plan.outcome,
            })
        }

        async fn find_votes(&self, user_id: i64, post_ids: &[i64]) -> Result<Vec<Vote>, DomainError> {
            self.vote_fetches.fetch_add(1, Ordering::SeqCst);
            let state = self.state.lock().await;
            post_ids
                .iter()
                .filter_map(|post_id| {
                    state
                        .votes
                        .get(&(user_id, *post_id))
                        .map(|value| Vote::new(user_id, *post_id, *value))
                })
                .collect()
        }
    }

    #[async_trait]
    impl UserRepository for MemoryStore {
        async fn create_user(&self, _input: NewUser) -> Result<User, DomainError> {
            Err(DomainError::Unexpected("not used".to_string()))
        }

        async fn find_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<UserCredentials>, DomainError> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<UserCredentials>, DomainError> {
            Ok(None)
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
            let state = self.state.lock().await;
            Ok(state.users.iter().find(|user| user.id == id).cloned())
        }

        async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DomainError> {
            self.user_fetches.fetch_add(1, Ordering::SeqCst);
            let state = self.state.lock().await;
            Ok(state
                .users
                .iter()
                .filter(|user| ids.contains(&user.id))
                .cloned()
                .collect())
        }

        async fn update_password_hash(&self, _id: i64, _hash: &str) -> Result<bool, DomainError> {
            Ok(false)
        }
    }

    type TestService = PostService<MemoryStore, MemoryStore, MemoryStore>;

    fn service(store: &MemoryStore) -> TestService {
        PostService::new(store.clone(), store.clone(), store.clone())
    }

    async fn seed_posts(service: &TestService, author: i64, count: usize) -> Vec<i64> {
        let ctx = RequestContext::for_user(author);
        let mut ids = Vec::new();
        for i in 1..=count {
            let req = CreatePostRequest {
                title: format!("post {i}"),
                text: format!("body {i}"),
            };
            let view = service
                .create_post(&ctx, req)
                .await
                .expect("create_post must succeed");
            ids.push(view.post.id);
        }
        ids
    }

    #[tokio::test]
    async fn create_post_requires_acting_user() {
        let store = MemoryStore::with_users(&[1]);
        let service = service(&store);

        let req = CreatePostRequest {
            title: "title".to_string(),
            text: "text".to_string(),
        };
        let err = service
            .create_post(&RequestContext::anonymous(), req)
            .await
            .expect_err("anonymous create must fail");
        assert!(matches!(err, DomainError::Unauthenticated));
    }

    #[tokio::test]
    async fn create_post_normalizes_and_attaches_author() {
        let store = MemoryStore::with_users(&[10]);
        let service = service(&store);

        let req = CreatePostRequest {
            title: "  title  ".to_string(),
            text: "  text  ".to_string(),
        };
        let view = service
            .create_post(&RequestContext::for_user(10), req)
            .await
            .expect("create_post must succeed");

        assert_eq!(view.post.title, "title");
        assert_eq!(view.post.text, "text");
        assert_eq!(view.post.points, 0);
        assert_eq!(view.vote_type, 0);
        assert_eq!(view.author.map(|author| author.id), Some(10));
    }

    #[tokio::test]
    async fn get_post_returns_not_found_when_missing() {
        let store = MemoryStore::with_users(&[1]);
        let err = service(&store)
            .get_post(&RequestContext::anonymous(), 42)
            .await
            .expect_err("post must be missing");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_post_by_non_owner_is_forbidden() {
        let store = MemoryStore::with_users(&[1, 2]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;

        let req = UpdatePostRequest {
            title: "hijack".to_string(),
            text: "hijack".to_string(),
        };
        let err = service
            .update_post(&RequestContext::for_user(2), ids[0], req)
            .await
            .expect_err("must be forbidden");
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[tokio::test]
    async fn update_post_by_owner_applies_patch() {
        let store = MemoryStore::with_users(&[1]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;

        let req = UpdatePostRequest {
            title: "  new title ".to_string(),
            text: "new body".to_string(),
        };
        let view = service
            .update_post(&RequestContext::for_user(1), ids[0], req)
            .await
            .expect("update must succeed");
        assert_eq!(view.post.title, "new title");
        assert_eq!(view.post.text, "new body");
    }

    #[tokio::test]
    async fn delete_post_checks_existence_then_ownership() {
        let store = MemoryStore::with_users(&[1, 2]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;

        let err = service
            .delete_post(&RequestContext::for_user(2), ids[0])
            .await
            .expect_err("non-owner must be rejected");
        assert!(matches!(err, DomainError::Forbidden));

        service
            .delete_post(&RequestContext::for_user(1), ids[0])
            .await
            .expect("owner delete must succeed");

        let err = service
            .delete_post(&RequestContext::for_user(1), ids[0])
            .await
            .expect_err("second delete must fail");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn vote_on_missing_post_is_not_found() {
        let store = MemoryStore::with_users(&[1]);
        let err = service(&store)
            .vote(&RequestContext::for_user(1), 99, VoteDirection::Upvote)
            .await
            .expect_err("vote must fail");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn vote_requires_acting_user() {
        let store = MemoryStore::with_users(&[1]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;

        let err = service
            .vote(&RequestContext::anonymous(), ids[0], VoteDirection::Upvote)
            .await
            .expect_err("anonymous vote must fail");
        assert!(matches!(err, DomainError::Unauthenticated));
    }

    #[tokio::test]
    async fn repeated_vote_is_idempotent_and_reversal_moves_two() {
        let store = MemoryStore::with_users(&[1, 2]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;
        let post_id = ids[0];

        let first = service
            .vote(&RequestContext::for_user(2), post_id, VoteDirection::Upvote)
            .await
            .expect("vote must succeed");
        assert_eq!(first.outcome, VoteOutcome::Created);
        assert_eq!(first.post.post.points, 1);
        assert_eq!(first.post.vote_type, 1);

        let repeat = service
            .vote(&RequestContext::for_user(2), post_id, VoteDirection::Upvote)
            .await
            .expect("repeat vote must succeed");
        assert_eq!(repeat.outcome, VoteOutcome::Unchanged);
        assert_eq!(repeat.post.post.points, 1);

        let reversed = service
            .vote(&RequestContext::for_user(2), post_id, VoteDirection::Downvote)
            .await
            .expect("reversal must succeed");
        assert_eq!(reversed.outcome, VoteOutcome::Reversed);
        assert_eq!(reversed.post.post.points, first.post.post.points - 2);
        assert_eq!(reversed.post.vote_type, -1);
    }

    #[tokio::test]
    async fn points_match_ledger_after_mixed_votes() {
        let store = MemoryStore::with_users(&[1, 2, 3, 4]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 2).await;

        let script = [
            (2, 0, VoteDirection::Upvote),
            (3, 0, VoteDirection::Downvote),
            (2, 0, VoteDirection::Downvote),
            (4, 1, VoteDirection::Upvote),
            (4, 1, VoteDirection::Upvote),
            (3, 0, VoteDirection::Upvote),
            (2, 1, VoteDirection::Downvote),
        ];
        for (user_id, post_idx, direction) in script {
            service
                .vote(&RequestContext::for_user(user_id), ids[post_idx], direction)
                .await
                .expect("vote must succeed");
        }

        for post_id in ids {
            assert_eq!(store.points_of(post_id).await, store.ledger_sum(post_id).await);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_opposite_votes_leave_zero_points() {
        let store = MemoryStore::with_users(&[1, 2, 3]);
        let service = Arc::new(service(&store));
        let ids = seed_posts(&service, 1, 1).await;
        let post_id = ids[0];

        let up = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .vote(&RequestContext::for_user(2), post_id, VoteDirection::Upvote)
                    .await
                    .map(|_| ())
            })
        };
        let down = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .vote(&RequestContext::for_user(3), post_id, VoteDirection::Downvote)
                    .await
                    .map(|_| ())
            })
        };

        up.await.expect("task must join").expect("upvote must succeed");
        down.await.expect("task must join").expect("downvote must succeed");

        assert_eq!(store.points_of(post_id).await, 0);
        assert_eq!(store.ledger_sum(post_id).await, 0);
    }

    #[tokio::test]
    async fn feed_pages_walk_newest_to_oldest() {
        let store = MemoryStore::with_users(&[1]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 5).await;
        let ctx = RequestContext::anonymous();

        let first = service
            .get_page(&ctx, Some(2), None)
            .await
            .expect("page must load");
        let first_ids: Vec<i64> = first.posts.iter().map(|view| view.post.id).collect();
        assert_eq!(first_ids, vec![ids[4], ids[3]]);
        assert!(first.has_more);
        assert_eq!(first.total_count, 5);
        let cursor = first.cursor.expect("cursor must be set");
        assert_eq!(cursor.created_at, first.posts[1].post.created_at);

        // timestamp-only cursor, the way a client that ignores cursor_id resumes
        let second = service
            .get_page(
                &ctx,
                Some(2),
                Some(FeedCursor {
                    created_at: cursor.created_at,
                    id: None,
                }),
            )
            .await
            .expect("page must load");
        let second_ids: Vec<i64> = second.posts.iter().map(|view| view.post.id).collect();
        assert_eq!(second_ids, vec![ids[2], ids[1]]);
        assert!(second.has_more);

        let third = service
            .get_page(&ctx, Some(2), second.cursor)
            .await
            .expect("page must load");
        let third_ids: Vec<i64> = third.posts.iter().map(|view| view.post.id).collect();
        assert_eq!(third_ids, vec![ids[0]]);
        assert!(!third.has_more);
    }

    #[tokio::test]
    async fn feed_limit_is_clamped_to_one_hundred() {
        let store = MemoryStore::with_users(&[1]);
        let service = service(&store);
        seed_posts(&service, 1, 120).await;

        let page = service
            .get_page(&RequestContext::anonymous(), Some(1000), None)
            .await
            .expect("page must load");
        assert_eq!(page.posts.len(), 100);
        assert_eq!(page.total_count, 120);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn empty_feed_has_no_cursor() {
        let store = MemoryStore::with_users(&[1]);
        let page = service(&store)
            .get_page(&RequestContext::anonymous(), None, None)
            .await
            .expect("page must load");
        assert!(page.posts.is_empty());
        assert!(!page.has_more);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn feed_batches_author_and_vote_lookups() {
        let store = MemoryStore::with_users(&[1, 2]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 4).await;
        service
            .vote(&RequestContext::for_user(2), ids[1], VoteDirection::Downvote)
            .await
            .expect("vote must succeed");
        store.user_fetches.store(0, Ordering::SeqCst);
        store.vote_fetches.store(0, Ordering::SeqCst);

        let ctx = RequestContext::for_user(2);
        let page = service
            .get_page(&ctx, Some(10), None)
            .await
            .expect("page must load");
        let again = service
            .get_page(&ctx, Some(10), None)
            .await
            .expect("page must load");

        assert_eq!(store.user_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.vote_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(page.posts.len(), 4);
        assert_eq!(again.posts.len(), 4);

        let vote_types: HashMap<i64, i16> = page
            .posts
            .iter()
            .map(|view| (view.post.id, view.vote_type))
            .collect();
        assert_eq!(vote_types[&ids[1]], -1);
        assert_eq!(vote_types[&ids[0]], 0);
        assert!(page.posts.iter().all(|view| view.author.is_some()));
    }

    #[tokio::test]
    async fn anonymous_feed_reports_zero_vote_type() {
        let store = MemoryStore::with_users(&[1, 2]);
        let service = service(&store);
        let ids = seed_posts(&service, 1, 1).await;
        service
            .vote(&RequestContext::for_user(2), ids[0], VoteDirection::Upvote)
            .await
            .expect("vote must succeed");
        let fetches_before = store.vote_fetches.load(Ordering::SeqCst);

        let page = service
            .get_page(&RequestContext::anonymous(), None, None)
            .await
            .expect("page must load");
        assert_eq!(page.posts[0].vote_type, 0);
        assert_eq!(page.posts[0].post.points, 1);
        assert_eq!(store.vote_fetches.load(Ordering::SeqCst), fetches_before);
    }
}
