use dotenvy::dotenv;
use std::env;
use ticketing_core::config::{database, settings};
use ticketing_core::core::settlement;
use ticketing_core::errors::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings (config.toml is optional)
    let settings = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    if settings.gateway.verification_key().is_none() {
        warn!("Notification signatures will not be verified");
    }

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Optionally replay gateway notifications, one JSON object per line
    let Some(path) = env::args().nth(1) else {
        info!("No notification file given, nothing to replay.");
        return Ok(());
    };

    let contents = std::fs::read_to_string(&path)
        .inspect_err(|e| error!("Failed to read {}: {}", path, e))?;

    let (mut applied, mut failed) = (0_usize, 0_usize);
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match settlement::handle_notification(&db, &settings, line.as_bytes()).await {
            Ok(ack) => {
                applied += 1;
                info!(line = index + 1, order_id = %ack.order_id, status = ack.status.as_str(), "Acknowledged");
            }
            Err(e) => {
                failed += 1;
                warn!(line = index + 1, reason = e.reason(), error = %e, "Notification not applied");
            }
        }
    }

    info!(applied, failed, "Replay finished");
    Ok(())
}
