//! Initialize the configuration directory: create ~/.linerelay, a default config, and the system instruction file.
//!
//! The seeded `system_instruction.md` is a copy of the bundled default so it can be edited in place.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_SYSTEM_INSTRUCTION, SYSTEM_INSTRUCTION_FILE};

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Seeds `system_instruction.md` from the bundled default if missing.
///
/// Existing files are never overwritten.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let instruction = config_dir.join(SYSTEM_INSTRUCTION_FILE);
    if !instruction.exists() {
        std::fs::write(&instruction, DEFAULT_SYSTEM_INSTRUCTION)
            .with_context(|| format!("writing system instruction to {}", instruction.display()))?;
        log::info!("wrote default system instruction to {}", instruction.display());
    } else {
        log::debug!("system instruction already exists at {}, skipping", instruction.display());
    }

    Ok(config_dir.to_path_buf())
}
