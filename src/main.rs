use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use waitingroom_backend::auth::{AuthConfig, AuthVerifier, JwksVerifier, LocalAuthService};
use waitingroom_backend::config::{AppConfig, AuthMode};
use waitingroom_backend::downstream::DownstreamProxy;
use waitingroom_backend::guardrails::{IdempotencyCache, PrincipalRateLimiter};
use waitingroom_backend::state::AppState;
use waitingroom_backend::store::ScriptRunner;
use waitingroom_backend::{api, guardrails, logging, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    logging::init(&config.environment);
    config.log_summary();

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = redis_client.get_connection_manager().await?;
    let scripts = Arc::new(ScriptRunner::new());

    let sqlite_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", config.sqlite_path))
        .await?;

    let auth_verifier = match config.auth_mode {
        AuthMode::External => {
            let jwks_url = config
                .jwt_jwks_url
                .clone()
                .expect("validated by AppConfig::from_env");
            let verifier = JwksVerifier::new(
                reqwest::Client::new(),
                jwks_url,
                config.jwt_issuer.clone(),
                config.jwt_audience.clone(),
                config.jwks_cache_ttl,
            );
            AuthVerifier::External(Arc::new(verifier))
        }
        AuthMode::Local => {
            let secret = config
                .jwt_local_secret
                .clone()
                .expect("validated by AppConfig::from_env");
            let service = LocalAuthService::new(sqlite_pool.clone(), secret);
            service.migrate().await?;
            AuthVerifier::Local(Arc::new(service))
        }
    };

    let auth_config = Arc::new(AuthConfig {
        verifier: auth_verifier,
        dev_bypass_tokens: config.dev_auth_bypass_tokens.clone(),
    });

    let rate_limiter = PrincipalRateLimiter::new(
        redis_conn.clone(),
        scripts.clone(),
        config.principal_rate_limit_rps,
        config.principal_rate_limit_burst,
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let downstream = Arc::new(DownstreamProxy::new(
        http_client,
        config.reservation_service_url.clone(),
        config.payment_service_url.clone(),
    ));

    let prometheus_handle = metrics::install_recorder();
    let idempotency_cache = IdempotencyCache::new(redis_conn.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
        redis: redis_conn,
        scripts,
        auth: auth_config.clone(),
        rate_limiter: rate_limiter.clone(),
        idempotency_cache: idempotency_cache.clone(),
        downstream,
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(middleware::from_fn_with_state(
            idempotency_cache,
            guardrails::idempotency_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            guardrails::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            auth_config,
            waitingroom_backend::auth::auth_middleware,
        ))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "waiting room backend listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
