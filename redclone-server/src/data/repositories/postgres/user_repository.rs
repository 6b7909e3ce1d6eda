use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::user_repository::{NewUser, UserCredentials, UserRepository};
use crate::domain::error::DomainError;
use crate::domain::user::User;

#[derive(Debug, Clone)]
pub(crate) struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_credentials(
        &self,
        column: CredentialsLookup,
        value: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let sql = format!(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE {} = $1
            "#,
            column.as_str()
        );
        let row = sqlx::query_as::<_, UserCredentialsRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        match row {
            Some(r) => {
                let user = User::new(r.id, r.username, r.email, r.created_at)
                    .map_err(|err| DomainError::Unexpected(err.to_string()))?;
                Ok(Some(UserCredentials {
                    user,
                    password_hash: r.password_hash,
                }))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy)]
enum CredentialsLookup {
    Username,
    Email,
}

impl CredentialsLookup {
    fn as_str(self) -> &'static str {
        match self {
            CredentialsLookup::Username => "username",
            CredentialsLookup::Email => "email",
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserCredentialsRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, input: NewUser) -> Result<User, DomainError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_db_error)?;

        map_row_to_user(row)
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        self.find_credentials(CredentialsLookup::Username, username)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DomainError> {
        self.find_credentials(CredentialsLookup::Email, email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_user_db_error)?;

        row.map(map_row_to_user).transpose()
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_user_db_error)?;

        rows.into_iter().map(map_row_to_user).collect()
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_user_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}

fn map_row_to_user(row: UserRow) -> Result<User, DomainError> {
    User::new(row.id, row.username, row.email, row.created_at)
        .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_user_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23505")
    {
        let field = match db_err.constraint() {
            Some("users_username_key") => "username",
            Some("users_email_key") => "email",
            _ => "user",
        };
        return DomainError::AlreadyExists { field };
    }
    DomainError::Unexpected(err.to_string())
}
