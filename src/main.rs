use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizduel::{abuse, app, config::ServerConfig, questions};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizduel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizduel...");

    let config = ServerConfig::from_env();
    tracing::info!(
        answering_seconds = config.game.answering_seconds,
        voting_seconds = config.game.voting_seconds,
        contestants_per_round = config.game.contestants_per_round,
        "Game config loaded"
    );

    let bank = match &config.questions_path {
        Some(path) => match questions::load_from_file(path) {
            Ok(bank) => bank,
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("No QUIZ_QUESTIONS_PATH set, using the built-in question bank");
            questions::default_bank()
        }
    };

    let state = Arc::new(app::AppState::new(&config, bank));

    // Spawn background task sweeping stale chat rate limit entries
    abuse::spawn_cleanup(state.chat_limiter.clone());

    let router = app::build_router(state, &config.static_dir);

    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("Server error: {}", e);
    }
}
