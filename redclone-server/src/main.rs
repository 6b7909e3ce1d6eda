use std::sync::Arc;

use anyhow::Result;

mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use application::auth_service::{AuthService, PasswordResetConfig};
use application::post_service::PostService;
use data::repositories::postgres::post_repository::PostgresPostRepository;
use data::repositories::postgres::reset_token_repository::PostgresResetTokenRepository;
use data::repositories::postgres::user_repository::PostgresUserRepository;
use data::repositories::postgres::vote_ledger::{PostgresVoteLedger, TransactionPolicy};
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::jwt::JwtService;
use infrastructure::logging::init_logging;
use infrastructure::mailer::LogMailer;
use infrastructure::settings::Settings;
use presentation::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    init_logging(&settings.log_level)?;

    let pool = create_pool(&settings.database_url, settings.db_max_connections).await?;
    run_migrations(&pool).await?;

    let jwt = JwtService::new(&settings.jwt_secret, settings.jwt_ttl_seconds);
    let users = PostgresUserRepository::new(pool.clone());

    let auth_service = AuthService::new(
        users.clone(),
        PostgresResetTokenRepository::new(pool.clone()),
        LogMailer,
        jwt.clone(),
        PasswordResetConfig {
            token_ttl: chrono::Duration::seconds(settings.reset_token_ttl_secs),
            app_url: settings.app_url.clone(),
        },
    );

    let vote_ledger = PostgresVoteLedger::new(
        pool.clone(),
        TransactionPolicy {
            timeout: settings.vote_tx_timeout(),
            max_attempts: settings.vote_tx_max_attempts,
        },
    );
    let post_service = PostService::new(
        PostgresPostRepository::new(pool.clone()),
        vote_ledger,
        users,
    );

    let state = AppState::new(
        pool,
        Arc::new(auth_service),
        Arc::new(post_service),
        Arc::new(jwt),
    );

    server::run_http(&settings, state).await
}
