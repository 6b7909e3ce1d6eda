use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::post_repository::{NewPost, PostPatch, PostRepository};
use crate::domain::error::DomainError;
use crate::domain::feed::{FeedKey, FeedQuery};
use crate::domain::post::Post;

#[derive(Debug, Clone)]
pub(crate) struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct PostRow {
    id: i64,
    title: String,
    text: String,
    user_id: i64,
    points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FeedKeyRow {
    id: i64,
    created_at: DateTime<Utc>,
}

pub(super) const POST_COLUMNS: &str = "id, title, text, user_id, points, created_at, updated_at";

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create_post(&self, input: NewPost) -> Result<Post, DomainError> {
        let sql = format!(
            "INSERT INTO posts (title, text, user_id) VALUES ($1, $2, $3) RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&input.title)
            .bind(&input.text)
            .bind(input.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        map_row_to_post(row)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post).transpose()
    }

    async fn update_post_owned(
        &self,
        post_id: i64,
        owner_id: i64,
        patch: PostPatch,
    ) -> Result<Option<Post>, DomainError> {
        let sql = format!(
            r#"
            UPDATE posts
            SET title = $3,
                text = $4,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {POST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .bind(owner_id)
            .bind(&patch.title)
            .bind(&patch.text)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post).transpose()
    }

    async fn delete_post_owned(&self, post_id: i64, owner_id: i64) -> Result<bool, DomainError> {
        // votes on the post go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_feed(&self, query: FeedQuery) -> Result<Vec<Post>, DomainError> {
        let cursor_at = query.cursor.map(|cursor| cursor.created_at);
        let cursor_id = query.cursor.and_then(|cursor| cursor.id);

        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE $1::timestamptz IS NULL
               OR created_at < $1
               OR ($2::bigint IS NOT NULL AND created_at = $1 AND id < $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(cursor_at)
            .bind(cursor_id)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        rows.into_iter().map(map_row_to_post).collect()
    }

    async fn total_posts(&self) -> Result<i64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        Ok(count)
    }

    async fn oldest_post_key(&self) -> Result<Option<FeedKey>, DomainError> {
        let row = sqlx::query_as::<_, FeedKeyRow>(
            r#"
            SELECT id, created_at
            FROM posts
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_post_db_error)?;

        Ok(row.map(|row| FeedKey {
            created_at: row.created_at,
            id: row.id,
        }))
    }
}

pub(super) fn map_row_to_post(row: PostRow) -> Result<Post, DomainError> {
    Post::new(
        row.id,
        row.title,
        row.text,
        row.user_id,
        row.points,
        row.created_at,
        row.updated_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_post_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23503") => return DomainError::NotFound("user".to_string()),
            Some("23505") if db_err.constraint() == Some("posts_title_key") => {
                return DomainError::AlreadyExists { field: "title" };
            }
            _ => {}
        }
    }
    DomainError::Unexpected(err.to_string())
}
