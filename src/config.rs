use crate::translator::CollisionPolicy;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Paths
    pub mapping_file: String,
    pub database_path: String,
    pub input_dir: String,
    pub output_dir: String,

    // Translation
    pub collision_policy: CollisionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Paths
            mapping_file: std::env::var("CV_MAPPING_FILE")
                .unwrap_or_else(|_| "data/key_mappings.json".to_string()),
            database_path: std::env::var("CV_DATABASE_PATH")
                .unwrap_or_else(|_| "data/cv.db".to_string()),
            input_dir: std::env::var("CV_INPUT_DIR").unwrap_or_else(|_| "data/resumes".to_string()),
            output_dir: std::env::var("CV_OUTPUT_DIR")
                .unwrap_or_else(|_| "data/translated".to_string()),

            // Translation
            collision_policy: std::env::var("CV_COLLISION_POLICY")
                .unwrap_or_else(|_| "error".to_string())
                .parse()
                .context("CV_COLLISION_POLICY is not a valid policy")?,
        })
    }
}
