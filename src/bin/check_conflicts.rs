//! Conflict report binary - prints variant status and invariant-field
//! conflicts for resumes as JSON lines.
//!
//! Usage:
//!   cargo run --bin conflicts                # all resumes in the database
//!   cargo run --bin conflicts -- jane adam   # specific resume keys
//!
//! Environment:
//! - CV_DATABASE_PATH (defaults to data/cv.db)

use anyhow::Result;
use cv_sync::{config, db::Database, sync::SyncEngine};
use tracing::info;

fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conflicts=info".parse()?),
        )
        .init();

    let config = config::Config::from_env()?;
    let db = Database::new(&config.database_path)?;
    let engine = SyncEngine::new(db.clone())?;

    let mut keys: Vec<String> = std::env::args().skip(1).collect();
    if keys.is_empty() {
        keys = db.list_resume_keys()?;
    }

    let mut total = 0usize;
    for key in &keys {
        let status = engine.get_variant_status(key)?;
        println!("{}", serde_json::to_string(&status)?);

        for conflict in engine.detect_conflicts(key)? {
            total += 1;
            println!("{}", serde_json::to_string(&conflict)?);
        }
    }

    info!("Checked {} resumes, found {} conflicts", keys.len(), total);
    Ok(())
}
