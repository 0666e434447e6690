//! Pollhub server entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use pollhub_api::{AppState, auth_middleware, router as api_router};
use pollhub_common::{Config, LocalStorage, StorageService, config::LogFormat};
use pollhub_core::{
    AuthEventPublisherService, AuthService, DefaultOrganizationValidator,
    LoggingAuthEventPublisher, MediaService, OrganizationService, PollChoiceService, PollService,
    ServiceMaintenance, TokenCodec, UserService, run_maintenance,
};
use pollhub_db::repositories::{
    OrganizationMemberRepository, OrganizationRepository, PollChoiceMediaRepository,
    PollChoiceRepository, PollRepository, PollVoteRepository, RefreshTokenRepository,
    UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Extra room for multipart framing and text fields on top of file payloads.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pollhub=debug,tower_http=debug".into());

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    init_tracing(config.logging.format);

    info!("Starting pollhub server...");

    // Connect to database
    let db = pollhub_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    pollhub_db::migrate(&db).await?;
    info!("Migrations completed");

    // Prepare media storage
    tokio::fs::create_dir_all(&config.storage.path).await?;
    let storage: StorageService = Arc::new(LocalStorage::new(
        config.storage.path.clone(),
        config.storage_base_url(),
    ));
    info!(path = %config.storage.path.display(), "Media storage ready");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let refresh_token_repo = RefreshTokenRepository::new(Arc::clone(&db));
    let organization_repo = OrganizationRepository::new(Arc::clone(&db));
    let member_repo = OrganizationMemberRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let choice_repo = PollChoiceRepository::new(Arc::clone(&db));
    let media_repo = PollChoiceMediaRepository::new(Arc::clone(&db));
    let vote_repo = PollVoteRepository::new(Arc::clone(&db));

    // Initialize services
    let events: AuthEventPublisherService = Arc::new(LoggingAuthEventPublisher);
    let media_service = MediaService::new(
        storage,
        config.storage.max_file_size,
        config.storage.max_files_per_request,
    );

    let auth_service = AuthService::new(
        user_repo.clone(),
        refresh_token_repo,
        TokenCodec::from_config(&config.auth),
        events.clone(),
    );
    let user_service = UserService::new(user_repo.clone(), events);
    let organization_service = OrganizationService::new(
        organization_repo.clone(),
        member_repo.clone(),
        user_repo,
        Arc::new(DefaultOrganizationValidator),
        config.auth.invite_ttl_days,
    );
    let poll_service = PollService::new(
        poll_repo.clone(),
        choice_repo.clone(),
        media_repo.clone(),
        vote_repo,
        organization_repo,
        member_repo.clone(),
        media_service.clone(),
    );
    let poll_choice_service = PollChoiceService::new(
        poll_repo,
        choice_repo,
        media_repo,
        member_repo,
        media_service.clone(),
    );

    // Start maintenance loop
    if config.maintenance.enabled {
        let tasks = Arc::new(ServiceMaintenance::new(
            poll_service.clone(),
            organization_service.clone(),
        ));
        let period = Duration::from_secs(config.maintenance.interval_secs.max(1));
        tokio::spawn(run_maintenance(tasks, period));
    }

    // Create app state
    let state = AppState {
        auth_service,
        user_service,
        organization_service,
        poll_service,
        poll_choice_service,
        media_service,
    };

    let body_limit = config
        .storage
        .max_file_size
        .saturating_mul(config.storage.max_files_per_request)
        .saturating_add(MULTIPART_OVERHEAD);

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .nest_service("/uploads", ServeDir::new(&config.storage.path))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
