use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("podcaster").join("podcaster.db"))
}

pub fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join("podcaster").join("config.toml"))
}
