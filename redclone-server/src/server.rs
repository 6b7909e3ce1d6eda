use std::time::Duration;

use anyhow::Result;
use axum::{Router, extract::DefaultBodyLimit, http::StatusCode};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::infrastructure::settings::Settings;
use crate::presentation::middleware::cors::apply_cors;
use crate::presentation::middleware::trace::apply_trace;
use crate::presentation::openapi::ApiDoc;
use crate::presentation::{AppState, http_handlers};

pub(crate) async fn run_http(settings: &Settings, state: AppState) -> Result<()> {
    let app = build_app(settings, state)?;

    let listener = TcpListener::bind(&settings.http_addr).await?;

    info!("HTTP server listening on {}", settings.http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Router {
    http_handlers::routes(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Router plus the request limits, tracing and CORS layers.
pub(crate) fn build_app(settings: &Settings, state: AppState) -> Result<Router> {
    let app = apply_limits(build_router(state), settings);
    let app = apply_trace(app);
    apply_cors(app, settings)
}

fn apply_limits(router: Router, settings: &Settings) -> Router {
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            settings.http_request_body_limit_bytes,
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(settings.http_request_timeout_secs),
        ))
        .layer(ConcurrencyLimitLayer::new(settings.http_concurrency_limit))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
