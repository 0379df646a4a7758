use symptom_triage_service::{AppConfig, create_app};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "symptom_triage_service=debug,triage_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let port = config.port;
    info!(
        lookup_table = %config.lookup_table_path.display(),
        ocr_backend = ?config.ocr_backend,
        "Starting Symptom Triage Service"
    );

    let app = create_app(config)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Symptom Triage Service listening on 0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
