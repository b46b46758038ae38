use anyhow::Result;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tenx_cards::{
    api::{create_router, AppState},
    config::Config,
    ai_strategies::{GenerationStrategy, MockStrategy, OpenRouterStrategy, RetryPolicy},
    database::Database,
    flashcard_service::FlashcardService,
    generation_service::GenerationService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let _guard = setup_logging()?;

    let config = Config::from_env()?;
    config.validate()?;

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let strategy = if config.ai.mock_mode {
        info!("Mock mode enabled - AI calls and rate limiting are bypassed");
        GenerationStrategy::Mock(MockStrategy::new())
    } else {
        GenerationStrategy::OpenRouter(OpenRouterStrategy::new(
            config.ai.api_key.clone(),
            config.ai.base_url.clone(),
            config.ai.model.clone(),
            Duration::from_millis(config.ai.timeout_ms),
        )?)
    };

    let retry_policy = RetryPolicy {
        max_retries: config.ai.max_retries,
        initial_backoff: Duration::from_millis(config.ai.retry_initial_backoff_ms),
        backoff_multiplier: 2,
    };

    let state = AppState {
        generation_service: GenerationService::new(db.clone(), strategy)
            .with_retry_policy(retry_policy),
        flashcard_service: FlashcardService::new(db),
    };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logging() -> Result<WorkerGuard> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create logs directory if it doesn't exist
    fs::create_dir_all("logs").unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    let default_log_level = "info,tenx_cards=debug";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_level));

    // Daily-rotated file output alongside the console
    let file_appender = tracing_appender::rolling::daily("logs", "tenx-cards.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized - writing to logs/tenx-cards.log with daily rotation");

    Ok(guard)
}
