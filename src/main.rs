use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use spheres_backend::api::{self, AppState, AuthMode};
use spheres_backend::auth::Validator;
use spheres_backend::config::Config;
use spheres_backend::engine::game::Game;
use spheres_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let auth = if config.skip_auth {
        tracing::warn!("ALLOW_INSECURE_AUTH is set; running without token validation");
        AuthMode::Insecure
    } else {
        let validator = Validator::new(
            &config.cognito_region,
            &config.cognito_user_pool_id,
            &config.cognito_app_client_id,
        )
        .await
        .expect("Failed to initialize token validator");
        tracing::info!(
            region = %config.cognito_region,
            user_pool = %config.cognito_user_pool_id,
            "Cognito token validation enabled"
        );
        AuthMode::Cognito(Arc::new(validator))
    };

    let game = Game::new(config.width, config.height, config.resource_tiles);
    tracing::info!(
        width = config.width,
        height = config.height,
        resource_tiles = config.resource_tiles,
        tick_ms = config.tick_ms,
        "game world created"
    );

    // Spawn the fixed-interval tick loop driving the simulation.
    let ticker = game.clone();
    let tick_ms = config.tick_ms;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let started = Instant::now();
            let snapshot = ticker.tick();
            metrics::TICKS_TOTAL.inc();
            metrics::TICK_DURATION_MS.observe(started.elapsed().as_secs_f64() * 1000.0);
            metrics::ACTIVE_RESOURCES.set(snapshot.resources.len() as i64);
        }
    });

    let cors = match &config.cors_allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>().expect("Invalid CORS origin"))
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    let app = api::router(AppState { game, auth }).layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Spheres backend listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
