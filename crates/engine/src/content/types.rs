use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct ContentPlanRequest {
    /// Mod ids under `mods/`, applied after `base` in this order.
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContentPlanError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("base content directory does not exist: {expected_dir}")]
    BaseContentMissing { expected_dir: PathBuf },
}
