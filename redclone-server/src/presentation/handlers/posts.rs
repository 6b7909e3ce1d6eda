use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::post_service::{FeedPageView, PostView};
use crate::domain::feed::FeedCursor;
use crate::domain::post::{CreatePostRequest, UpdatePostRequest};
use crate::domain::vote::VoteDirection;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::extract::{ApiJson, ApiPath, ApiQuery};
use crate::presentation::handlers::auth::UserDto;
use crate::presentation::middleware::auth::{AuthenticatedUser, MaybeUser};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct CreatePostDto {
    #[validate(length(min = 1, max = 255))]
    pub(crate) title: String,
    #[validate(length(min = 1))]
    pub(crate) text: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct UpdatePostDto {
    #[validate(length(min = 1, max = 255))]
    pub(crate) title: String,
    #[validate(length(min = 1))]
    pub(crate) text: String,
}

/// Feed window query. `limit` is clamped rather than rejected.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct FeedParams {
    pub(crate) limit: Option<i64>,
    pub(crate) cursor: Option<DateTime<Utc>>,
    pub(crate) cursor_id: Option<i64>,
}

impl FeedParams {
    fn feed_cursor(&self) -> Option<FeedCursor> {
        self.cursor.map(|created_at| FeedCursor {
            created_at,
            id: self.cursor_id,
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub(crate) enum VoteDirectionDto {
    Upvote,
    Downvote,
}

impl From<VoteDirectionDto> for VoteDirection {
    fn from(dto: VoteDirectionDto) -> Self {
        match dto {
            VoteDirectionDto::Upvote => VoteDirection::Upvote,
            VoteDirectionDto::Downvote => VoteDirection::Downvote,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct VoteDto {
    pub(crate) direction: VoteDirectionDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct PostDto {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) text_snippet: String,
    pub(crate) points: i64,
    /// The caller's vote on this post: 1, -1, or 0.
    pub(crate) vote_type: i16,
    pub(crate) user_id: i64,
    pub(crate) author: Option<UserDto>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl PostDto {
    fn for_viewer(view: PostView, viewer: Option<i64>) -> Self {
        let text_snippet = view.post.text_snippet();
        Self {
            id: view.post.id,
            title: view.post.title,
            text: view.post.text,
            text_snippet,
            points: view.post.points,
            vote_type: view.vote_type,
            user_id: view.post.user_id,
            author: view.author.map(|user| UserDto::for_viewer(user, viewer)),
            created_at: view.post.created_at,
            updated_at: view.post.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct PaginatedPostsDto {
    pub(crate) posts: Vec<PostDto>,
    pub(crate) total_count: i64,
    pub(crate) has_more: bool,
    /// `created_at` of the oldest post in this window; pass back as `cursor`.
    pub(crate) cursor: Option<DateTime<Utc>>,
    pub(crate) cursor_id: Option<i64>,
}

impl PaginatedPostsDto {
    fn for_viewer(page: FeedPageView, viewer: Option<i64>) -> Self {
        Self {
            posts: page
                .posts
                .into_iter()
                .map(|view| PostDto::for_viewer(view, viewer))
                .collect(),
            total_count: page.total_count,
            has_more: page.has_more,
            cursor: page.cursor.map(|cursor| cursor.created_at),
            cursor_id: page.cursor.and_then(|cursor| cursor.id),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct VoteResponseDto {
    pub(crate) success: bool,
    pub(crate) post: PostDto,
}

#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "posts",
    params(
        ("limit" = Option<i64>, Query, description = "Items per page, clamped to 1..=100 (default 20)"),
        ("cursor" = Option<String>, Query, description = "RFC 3339 timestamp from the previous page"),
        ("cursor_id" = Option<i64>, Query, description = "Post id from the previous page")
    ),
    responses(
        (status = 200, description = "Feed window", body = PaginatedPostsDto),
        (status = 400, description = "Malformed query"),
        (status = 401, description = "Invalid token"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiQuery(params): ApiQuery<FeedParams>,
) -> AppResult<Json<PaginatedPostsDto>> {
    let ctx = viewer.context();
    let page = state
        .post_service
        .get_page(&ctx, params.limit, params.feed_cursor())
        .await?;

    Ok(Json(PaginatedPostsDto::for_viewer(page, viewer.0)))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    tag = "posts",
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "Post found", body = PostDto),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Invalid token"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<PostDto>> {
    let ctx = viewer.context();
    let view = state.post_service.get_post(&ctx, id).await?;

    Ok(Json(PostDto::for_viewer(view, viewer.0)))
}

#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "posts",
    security(
        ("bearer_auth" = [])
    ),
    request_body = CreatePostDto,
    responses(
        (status = 201, description = "Post created", body = PostDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Title already in use"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn create_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(dto): ApiJson<CreatePostDto>,
) -> AppResult<(StatusCode, Json<PostDto>)> {
    dto.validate()?;
    let req = CreatePostRequest {
        title: dto.title,
        text: dto.text,
    };

    let view = state.post_service.create_post(&auth.context(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(PostDto::for_viewer(view, Some(auth.user_id))),
    ))
}

#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    tag = "posts",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    request_body = UpdatePostDto,
    responses(
        (status = 200, description = "Post updated", body = PostDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Title already in use"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn update_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(dto): ApiJson<UpdatePostDto>,
) -> AppResult<Json<PostDto>> {
    dto.validate()?;
    let req = UpdatePostRequest {
        title: dto.title,
        text: dto.text,
    };

    let view = state
        .post_service
        .update_post(&auth.context(), id, req)
        .await?;
    Ok(Json(PostDto::for_viewer(view, Some(auth.user_id))))
}

#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "posts",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn delete_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.post_service.delete_post(&auth.context(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/vote",
    tag = "posts",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    request_body = VoteDto,
    responses(
        (status = 200, description = "Vote recorded; repeating a vote leaves points unchanged", body = VoteResponseDto),
        (status = 400, description = "Malformed id or direction"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Transaction aborted, safe to retry"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn vote(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(dto): ApiJson<VoteDto>,
) -> AppResult<Json<VoteResponseDto>> {
    let result = state
        .post_service
        .vote(&auth.context(), id, dto.direction.into())
        .await?;

    Ok(Json(VoteResponseDto {
        success: true,
        post: PostDto::for_viewer(result.post, Some(auth.user_id)),
    }))
}
