use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve where the database lives. An explicit `--db` path wins over the
    /// per-user data directory.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        if let Some(db_path) = db_override {
            let data_dir = db_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            if !data_dir.as_os_str().is_empty() {
                std::fs::create_dir_all(&data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
            }
            return Ok(Config { db_path, data_dir });
        }

        let proj_dirs = ProjectDirs::from("", "", "contactsync")
            .context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("contactsync.db");

        Ok(Config { db_path, data_dir })
    }
}
