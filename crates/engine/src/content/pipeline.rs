use thiserror::Error;
use tracing::info;

use crate::AppPaths;

use super::compiler::{compile_def_database, ContentCompileError};
use super::database::DefDatabase;
use super::types::ContentPlanRequest;

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

pub fn build_def_database(
    app_paths: &AppPaths,
    request: &ContentPlanRequest,
) -> Result<DefDatabase, ContentPipelineError> {
    let database = compile_def_database(app_paths, request)?;
    info!(
        enabled_mods = request.enabled_mods.len(),
        player_defs = database.player_defs().len(),
        hazard_defs = database.hazard_defs().len(),
        base_content_dir = %app_paths.base_content_dir.display(),
        "content_database_built"
    );
    for def in database.hazard_defs() {
        info!(
            def_name = %def.def_name,
            kind = def.kind.as_token(),
            damage_per_tick = def.damage_per_tick,
            tick_interval_seconds = def.tick_interval_seconds,
            immunity = ?def.immunity,
            overlay = def.overlay,
            "content_hazard_def"
        );
    }
    Ok(database)
}
