//! One-shot invariant-field update binary - applies a single field change
//! across all language variants of a resume and prints the result as JSON.
//!
//! Usage:
//!   cargo run --bin sync-field -- <resume_key> <entity_type> <entity_id> <field> <value> [source_lang]
//!
//! The value is parsed as JSON when possible and falls back to a plain
//! string, so `3.7` becomes a number and `jane@example.com` a string.
//!
//! Environment:
//! - CV_DATABASE_PATH (defaults to data/cv.db)

use anyhow::{Context, Result};
use cv_sync::{config, db::Database, i18n::Language, sync::SyncEngine};

fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sync_field=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 5 {
        anyhow::bail!(
            "Usage: sync-field <resume_key> <entity_type> <entity_id> <field> <value> [source_lang]"
        );
    }

    let resume_key = &args[0];
    let entity_type = &args[1];
    let entity_id: i64 = args[2]
        .parse()
        .context("entity_id must be an integer")?;
    let field = &args[3];
    let new_value = args[4]
        .parse::<serde_json::Value>()
        .unwrap_or_else(|_| serde_json::Value::String(args[4].clone()));
    let source_lang = match args.get(5) {
        Some(code) => Language::from_code(code)?,
        None => Language::canonical(),
    };

    let config = config::Config::from_env()?;
    let db = Database::new(&config.database_path)?;
    let engine = SyncEngine::new(db)?;

    let result =
        engine.sync_invariant_field(resume_key, entity_type, entity_id, field, &new_value, source_lang)?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
