use anyhow::{Context, Result};
use cv_sync::i18n::{KeyMapping, Language, LanguageRegistry};
use cv_sync::{config, i18n, translator};
use std::fs;
use std::path::Path;
use tracing::{error, info};

fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cv_sync=info".parse()?),
        )
        .init();

    info!("Starting resume translation batch");

    // Load configuration from environment
    let config = config::Config::from_env()?;

    // Load the canonical key mapping table once
    let mapping = KeyMapping::load(&config.mapping_file)?;
    info!(
        "Loaded {} canonical keys from {}",
        mapping.len(),
        config.mapping_file
    );

    fs::create_dir_all(&config.output_dir)
        .context(format!("Failed to create {}", config.output_dir))?;

    let mut translated = 0usize;
    let mut failed = 0usize;

    for entry in fs::read_dir(&config.input_dir)
        .context(format!("Failed to read input dir {}", config.input_dir))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        // One file's failure must not abort the rest of the batch
        match translate_file(&path, &mapping, &config) {
            Ok(count) => translated += count,
            Err(e) => {
                failed += 1;
                error!("Failed to translate {}: {:#}", path.display(), e);
            }
        }
    }

    info!(
        "Done: {} translated documents written, {} source files failed",
        translated, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Translate one resume file into every other enabled language.
///
/// Returns the number of documents written.
fn translate_file(path: &Path, mapping: &KeyMapping, config: &config::Config) -> Result<usize> {
    let source_lang = i18n::language_from_filename(path);
    let raw = fs::read_to_string(path).context("Failed to read resume file")?;
    let doc: serde_json::Value = serde_json::from_str(&raw).context("Resume is not valid JSON")?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Resume filename is not valid UTF-8")?;
    let base = i18n::strip_language_suffix(stem);

    let mut written = 0usize;
    for lang in LanguageRegistry::get().list_enabled() {
        if lang.code == source_lang.code() {
            continue;
        }
        let target = Language::from_code(lang.code)?;
        let out = translator::translate(&doc, target, mapping, config.collision_policy)
            .with_context(|| format!("Translating to {}", target))?;

        let out_path = Path::new(&config.output_dir).join(format!("{}-{}.json", base, target));
        fs::write(&out_path, serde_json::to_string_pretty(&out)?)
            .context(format!("Failed to write {}", out_path.display()))?;
        info!("Wrote {}", out_path.display());
        written += 1;
    }

    Ok(written)
}
