use std::path::{Path, PathBuf};

use crate::config;
use crate::error::{HeaderError, Result};

pub fn current_exe_path() -> Result<PathBuf> {
    std::env::current_exe().map_err(|e| HeaderError::io("cannot determine current executable", e))
}

/// Directory the header model is cached in when no explicit path is given.
///
/// `HEADER_TOOLS_MODEL_DIR` wins when set; otherwise `models/` next to the executable.
pub fn default_models_dir() -> Result<PathBuf> {
    let env_dir = std::env::var(config::model::MODEL_DIR_ENV).ok();
    let exe = current_exe_path()?;
    Ok(models_dir_from(env_dir.as_deref(), &exe))
}

fn models_dir_from(env_dir: Option<&str>, exe: &Path) -> PathBuf {
    if let Some(dir) = env_dir.filter(|s| !s.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    exe.parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join(config::model::MODELS_DIR_NAME)
}

/// Default location of the cached header model (`<models dir>/FT_headers.bin.gz`).
/// The models directory is created if missing.
pub fn default_model_path() -> Result<PathBuf> {
    model_path_in(&default_models_dir()?)
}

/// `<dir>/FT_headers.bin.gz`, creating `dir` if missing.
fn model_path_in(dir: &Path) -> Result<PathBuf> {
    ensure_dir(dir)?;
    Ok(dir.join(config::model::MODEL_FILE_NAME))
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    // create_dir_all already treats an existing directory as success.
    std::fs::create_dir_all(dir)
        .map_err(|e| HeaderError::io(format!("failed to create dir {}", dir.display()), e))
}
