use chrono::Local;
use dotenvy::dotenv;
use pocketbook::{
    config::{database, seed},
    core::{report::account_summary_lines, user::get_user_by_username},
    errors::Result,
};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load seed data (shared account types, default tags)
    let seed = seed::load_default_config()
        .inspect_err(|e| error!("Failed to load seed configuration: {}", e))?;

    // 4. Connect, create the schema and seed it
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::initialize(&db, &seed)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Summarize the configured user's accounts
    let Ok(username) = env::var("POCKETBOOK_USER") else {
        info!("POCKETBOOK_USER not set; nothing to summarize.");
        return Ok(());
    };
    let Some(user) = get_user_by_username(&db, &username).await? else {
        warn!(username = %username, "User not found");
        return Ok(());
    };

    let today = Local::now().date_naive();
    for line in account_summary_lines(&db, user.id, today).await? {
        info!("{line}");
    }
    Ok(())
}
