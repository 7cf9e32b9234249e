use std::path::{Path, PathBuf};

use engine::{resolve_app_paths, AppPaths, ContentPlanRequest, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, RunOutcomeHandle};
use super::scenario::{Scenario, ScenarioError};

const ENABLED_MODS_ENV_VAR: &str = "ESCAPE_ENABLED_MODS";
const SCENARIO_ENV_VAR: &str = "ESCAPE_SCENARIO";
const DEFAULT_SCENARIO_FILE: &str = "default_run.json";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load scenario: {0}")]
    Scenario(#[from] ScenarioError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) outcome: RunOutcomeHandle,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Escape Startup ===");

    let app_paths = resolve_app_paths()?;
    let scenario_path = resolve_scenario_path(
        &app_paths,
        std::env::var(SCENARIO_ENV_VAR).ok().as_deref(),
    );
    let scenario = Scenario::load(&scenario_path)?;
    info!(
        path = %scenario_path.display(),
        scenario = %scenario.name,
        hazards = scenario.hazards.len(),
        pickups = scenario.pickups.len(),
        "scenario_loaded"
    );

    let (scene, outcome) = gameplay::build_escape_scene(scenario);
    let config = LoopConfig {
        content_plan_request: ContentPlanRequest {
            enabled_mods: parse_enabled_mods(
                std::env::var(ENABLED_MODS_ENV_VAR).ok().as_deref(),
            ),
        },
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        scene,
        outcome,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default()
}

/// Relative overrides resolve against the project root; the default lives in
/// `assets/scenarios/`.
fn resolve_scenario_path(app_paths: &AppPaths, raw: Option<&str>) -> PathBuf {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let path = Path::new(value);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                app_paths.root.join(path)
            }
        }
        None => app_paths.scenarios_dir.join(DEFAULT_SCENARIO_FILE),
    }
}
