fn format_mm_ss(elapsed_seconds: f64) -> String {
    let total = if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
        elapsed_seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn resolve_level_defs(world: &SceneWorld, scenario: &Scenario) -> Result<LevelDefs, String> {
    let defs = world
        .def_database()
        .ok_or_else(|| "DefDatabase not set on SceneWorld before scene load".to_string())?;
    scenario
        .validate_against_defs(defs)
        .map_err(|error| error.to_string())?;

    let player = defs
        .player_def_by_name(&scenario.player_def)
        .cloned()
        .ok_or_else(|| format!("missing PlayerDef '{}'", scenario.player_def))?;
    let hazards = scenario
        .hazards
        .iter()
        .map(|placement| {
            defs.hazard_def_by_name(&placement.def)
                .cloned()
                .ok_or_else(|| format!("missing HazardDef '{}'", placement.def))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LevelDefs { player, hazards })
}

/// Defs a level needs, cloned out of the world so the scene can spawn
/// entities while holding them.
struct LevelDefs {
    player: engine::PlayerDef,
    hazards: Vec<HazardDef>,
}
