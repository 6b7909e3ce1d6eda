use sqlx::PgPool;
use std::sync::Arc;

use crate::application::auth_service::AuthService;
use crate::application::post_service::PostService;
use crate::data::repositories::postgres::post_repository::PostgresPostRepository;
use crate::data::repositories::postgres::reset_token_repository::PostgresResetTokenRepository;
use crate::data::repositories::postgres::user_repository::PostgresUserRepository;
use crate::data::repositories::postgres::vote_ledger::PostgresVoteLedger;
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::mailer::LogMailer;

pub(crate) mod app_error;
pub(crate) mod extract;
pub(crate) mod handlers;
pub(crate) mod http_handlers;
pub(crate) mod middleware;
pub(crate) mod openapi;
pub(crate) mod routes;

pub(crate) type AppAuthService =
    AuthService<PostgresUserRepository, PostgresResetTokenRepository, LogMailer>;
pub(crate) type AppPostService =
    PostService<PostgresPostRepository, PostgresVoteLedger, PostgresUserRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: PgPool,
    pub(crate) auth_service: Arc<AppAuthService>,
    pub(crate) post_service: Arc<AppPostService>,
    pub(crate) jwt: Arc<JwtService>,
}

impl AppState {
    pub(crate) fn new(
        pool: PgPool,
        auth_service: Arc<AppAuthService>,
        post_service: Arc<AppPostService>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self {
            pool,
            auth_service,
            post_service,
            jwt,
        }
    }
}
