//! PeerDesk API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication (bearer JWT to `Actor`)
//! - Request routing to the journal operations
//! - Observability (logging, metrics)

mod extract;
mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use peerdesk_common::{
    auth::JwtManager,
    config::AppConfig,
    db,
    errors::AppError,
    lifecycle::JournalService,
    manuscripts::{self, ManuscriptStore},
    metrics, notifications,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub journal: JournalService,
    pub manuscripts: Arc<dyn ManuscriptStore>,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting PeerDesk API Gateway v{}",
        peerdesk_common::VERSION
    );

    // Initialize metrics
    install_metrics_exporter(&config)?;
    metrics::register_metrics();

    let jwt_secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret is required".to_string(),
        })?;
    let jwt = Arc::new(JwtManager::new(jwt_secret, config.auth.jwt_expiration_secs));

    // Collaborators selected by configuration
    let store = db::create_store(&config.database).await?;
    let manuscripts = manuscripts::create_manuscript_store(&config.manuscripts).await?;
    let dispatcher = notifications::create_dispatcher(&config.notifications)?;

    info!(
        store = store.backend(),
        manuscripts = manuscripts.backend_name(),
        "Journal collaborators ready"
    );

    let state = AppState {
        config: config.clone(),
        journal: JournalService::new(store, dispatcher),
        manuscripts,
        jwt,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Serve Prometheus metrics on their own port (0 disables)
fn install_metrics_exporter(config: &AppConfig) -> anyhow::Result<()> {
    let port = config.observability.metrics_port;
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .install()?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let upload_limit = DefaultBodyLimit::max(state.config.manuscripts.max_bytes);

    // API routes
    let api_routes = Router::new()
        // Manuscript endpoints
        .route(
            "/manuscripts",
            post(handlers::manuscripts::upload).layer(upload_limit),
        )
        .route("/manuscripts/{reference}", get(handlers::manuscripts::download))

        // User directory
        .route("/users/{id}", put(handlers::users::register_user))

        // Submission endpoints
        .route("/submissions", post(handlers::submissions::create_submission))
        .route(
            "/submissions/{id}",
            get(handlers::submissions::get_submission)
                .delete(handlers::submissions::delete_submission),
        )
        .route("/submissions/{id}/status", post(handlers::submissions::update_status))
        .route(
            "/submissions/{id}/manuscript",
            put(handlers::submissions::replace_manuscript),
        )

        // Review endpoints
        .route("/submissions/{id}/reviewers", post(handlers::reviews::assign_reviewer))
        .route(
            "/submissions/{id}/reviews",
            post(handlers::reviews::submit_review).get(handlers::reviews::list_reviews),
        )
        .route(
            "/submissions/{id}/reviews/summary",
            get(handlers::reviews::review_summary),
        )
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
