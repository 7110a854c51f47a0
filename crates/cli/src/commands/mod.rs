//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::Result;
use contracts::FusionBlueprint;

use crate::error::CliError;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load and validate a blueprint, mapping failures onto `CliError`
fn load_blueprint(path: &Path) -> Result<FusionBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_invalid(format!("{}: {}", path.display(), e)).into())
}
