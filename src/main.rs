use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intellicourse::api::router;
use intellicourse::config::AppConfig;
use intellicourse::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "intellicourse=debug,tower_http=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(pool, config)?;

    let course_ai = state.course_ai.clone();
    if course_ai.is_configured() {
        tokio::spawn(async move {
            match course_ai.list_models().await {
                Ok(models) => {
                    let usable: Vec<_> = models
                        .iter()
                        .filter(|m| m.supports_generate_content())
                        .map(|m| m.name.as_str())
                        .collect();
                    info!("Models supporting generateContent: {:?}", usable);
                }
                Err(e) => warn!("Model discovery failed: {}", e),
            }
        });
    }

    let app = router(state);

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
