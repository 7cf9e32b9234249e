use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{DefDatabase, Pose, TriggerVolume, Vec3};
use serde::Deserialize;
use thiserror::Error;

pub(crate) const DEFAULT_PLAYER_DEF: &str = "escape.player";

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("failed to read scenario file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Parse(String),
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
}

impl ScenarioError {
    fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> Self {
        Self::invalid(path, format!("expected {expected}, got {actual}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) enum PickupKind {
    Coin,
    Keycard,
    GasMask,
}

impl PickupKind {
    pub(crate) fn as_token(self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Keycard => "keycard",
            Self::GasMask => "gas_mask",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HazardPlacement {
    pub(crate) id: String,
    pub(crate) def: String,
    pub(crate) center: Vec3,
    pub(crate) half_extents: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PickupPlacement {
    pub(crate) id: String,
    pub(crate) kind: PickupKind,
    pub(crate) position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DoorPlacement {
    pub(crate) id: String,
    #[serde(default = "default_true")]
    pub(crate) requires_keycard: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExitPlacement {
    pub(crate) center: Vec3,
    pub(crate) half_extents: Vec3,
    #[serde(default)]
    pub(crate) requires_open_door: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum TimelineAction {
    MoveTo { position: Vec3 },
    Interact { target: String },
    Damage { amount: u32, source: String },
    InstantKill { source: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TimelineStep {
    pub(crate) at_seconds: f64,
    pub(crate) action: TimelineAction,
}

/// Level layout plus the scripted input that drives one headless run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) name: String,
    #[serde(default = "default_player_def")]
    pub(crate) player_def: String,
    /// Initial placement. Falls back to the player def's spawn pose.
    #[serde(default)]
    pub(crate) start: Option<Pose>,
    #[serde(default)]
    pub(crate) hazards: Vec<HazardPlacement>,
    #[serde(default)]
    pub(crate) pickups: Vec<PickupPlacement>,
    #[serde(default)]
    pub(crate) doors: Vec<DoorPlacement>,
    pub(crate) exit: ExitPlacement,
    #[serde(default)]
    pub(crate) timeline: Vec<TimelineStep>,
}

fn default_true() -> bool {
    true
}

fn default_player_def() -> String {
    DEFAULT_PLAYER_DEF.to_string()
}

impl Scenario {
    pub(crate) fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, ScenarioError> {
        let scenario = parse_scenario_json(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub(crate) fn coin_count(&self) -> u32 {
        self.pickups
            .iter()
            .filter(|pickup| pickup.kind == PickupKind::Coin)
            .count() as u32
    }

    pub(crate) fn exit_volume(&self) -> TriggerVolume {
        TriggerVolume::new(self.exit.center, self.exit.half_extents)
    }

    pub(crate) fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::invalid("name", "must not be empty"));
        }
        if self.player_def.trim().is_empty() {
            return Err(ScenarioError::invalid("player_def", "must not be empty"));
        }
        if let Some(start) = self.start {
            if !start.position.is_finite() || !start.yaw_degrees.is_finite() {
                return Err(ScenarioError::invalid("start", "must be finite"));
            }
        }

        let mut hazard_ids = HashSet::new();
        for (idx, hazard) in self.hazards.iter().enumerate() {
            let path = format!("hazards[{idx}]");
            require_id(&hazard.id, &format!("{path}.id"), &mut hazard_ids)?;
            if hazard.def.trim().is_empty() {
                return Err(ScenarioError::invalid(format!("{path}.def"), "must not be empty"));
            }
            validate_box(hazard.center, hazard.half_extents, &path)?;
        }

        let mut pickup_ids = HashSet::new();
        for (idx, pickup) in self.pickups.iter().enumerate() {
            let path = format!("pickups[{idx}]");
            require_id(&pickup.id, &format!("{path}.id"), &mut pickup_ids)?;
            if !pickup.position.is_finite() {
                return Err(ScenarioError::invalid(format!("{path}.position"), "must be finite"));
            }
        }
        if self.coin_count() == 0 {
            return Err(ScenarioError::expected_actual(
                "pickups",
                "at least one Coin",
                "none",
            ));
        }

        let mut door_ids = HashSet::new();
        for (idx, door) in self.doors.iter().enumerate() {
            require_id(&door.id, &format!("doors[{idx}].id"), &mut door_ids)?;
        }

        validate_box(self.exit.center, self.exit.half_extents, "exit")?;
        if let Some(door) = &self.exit.requires_open_door {
            if !door_ids.contains(door.as_str()) {
                return Err(ScenarioError::invalid(
                    "exit.requires_open_door",
                    format!("unknown door '{door}'"),
                ));
            }
        }

        let mut previous_at = 0.0f64;
        for (idx, step) in self.timeline.iter().enumerate() {
            let path = format!("timeline[{idx}]");
            if !step.at_seconds.is_finite() || step.at_seconds < 0.0 {
                return Err(ScenarioError::expected_actual(
                    format!("{path}.at_seconds"),
                    "a finite value >= 0",
                    step.at_seconds,
                ));
            }
            if step.at_seconds < previous_at {
                return Err(ScenarioError::expected_actual(
                    format!("{path}.at_seconds"),
                    format!(">= {previous_at}"),
                    step.at_seconds,
                ));
            }
            previous_at = step.at_seconds;

            match &step.action {
                TimelineAction::MoveTo { position } if !position.is_finite() => {
                    return Err(ScenarioError::invalid(
                        format!("{path}.action.position"),
                        "must be finite",
                    ));
                }
                TimelineAction::Interact { target } if !door_ids.contains(target.as_str()) => {
                    return Err(ScenarioError::invalid(
                        format!("{path}.action.target"),
                        format!("unknown door '{target}'"),
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Checks the def names this scenario references once content is
    /// compiled.
    pub(crate) fn validate_against_defs(&self, defs: &DefDatabase) -> Result<(), ScenarioError> {
        if defs.player_def_by_name(&self.player_def).is_none() {
            return Err(ScenarioError::invalid(
                "player_def",
                format!("unknown PlayerDef '{}'", self.player_def),
            ));
        }
        for (idx, hazard) in self.hazards.iter().enumerate() {
            if defs.hazard_def_by_name(&hazard.def).is_none() {
                return Err(ScenarioError::invalid(
                    format!("hazards[{idx}].def"),
                    format!("unknown HazardDef '{}'", hazard.def),
                ));
            }
        }
        Ok(())
    }
}

fn parse_scenario_json(raw: &str) -> Result<Scenario, ScenarioError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer) {
        Ok(scenario) => Ok(scenario),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(ScenarioError::Parse(format!("parse scenario json: {source}")))
            } else {
                Err(ScenarioError::Parse(format!(
                    "parse scenario json at {path}: {source}"
                )))
            }
        }
    }
}

fn require_id<'a>(
    id: &'a str,
    path: &str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), ScenarioError> {
    if id.trim().is_empty() {
        return Err(ScenarioError::invalid(path, "must not be empty"));
    }
    if !seen.insert(id) {
        return Err(ScenarioError::invalid(path, format!("duplicate id '{id}'")));
    }
    Ok(())
}

fn validate_box(center: Vec3, half_extents: Vec3, path: &str) -> Result<(), ScenarioError> {
    if !center.is_finite() {
        return Err(ScenarioError::invalid(format!("{path}.center"), "must be finite"));
    }
    let positive = |value: f32| value.is_finite() && value > 0.0;
    if !(positive(half_extents.x) && positive(half_extents.y) && positive(half_extents.z)) {
        return Err(ScenarioError::invalid(
            format!("{path}.half_extents"),
            "every component must be finite and > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn sample_json() -> Value {
        json!({
            "name": "sample",
            "hazards": [
                {
                    "id": "gas_hall",
                    "def": "hazard.gas",
                    "center": { "x": 5.0, "y": 0.0, "z": 0.0 },
                    "half_extents": { "x": 1.0, "y": 2.0, "z": 1.0 }
                }
            ],
            "pickups": [
                { "id": "coin_1", "kind": "Coin", "position": { "x": 1.0, "y": 0.0, "z": 0.0 } },
                { "id": "card", "kind": "Keycard", "position": { "x": 2.0, "y": 0.0, "z": 0.0 } }
            ],
            "doors": [ { "id": "vault" } ],
            "exit": {
                "center": { "x": 20.0, "y": 0.0, "z": 0.0 },
                "half_extents": { "x": 1.0, "y": 2.0, "z": 1.0 },
                "requires_open_door": "vault"
            },
            "timeline": [
                { "at_seconds": 0.5, "action": { "type": "move_to", "position": { "x": 1.0, "y": 0.0, "z": 0.0 } } },
                { "at_seconds": 1.0, "action": { "type": "interact", "target": "vault" } },
                { "at_seconds": 2.0, "action": { "type": "damage", "amount": 10, "source": "fall" } }
            ]
        })
    }

    fn parse(value: &Value) -> Result<Scenario, ScenarioError> {
        Scenario::from_json_str(&value.to_string())
    }

    #[test]
    fn sample_parses_with_defaults() {
        let scenario = parse(&sample_json()).expect("parse");
        assert_eq!(scenario.player_def, DEFAULT_PLAYER_DEF);
        assert!(scenario.start.is_none());
        assert!(scenario.doors[0].requires_keycard);
        assert_eq!(scenario.coin_count(), 1);
        assert_eq!(
            scenario.timeline[1].action,
            TimelineAction::Interact {
                target: "vault".to_string()
            }
        );
    }

    #[test]
    fn parse_error_reports_json_path() {
        let mut value = sample_json();
        value["pickups"][1]["kind"] = json!("Crowbar");

        let err = parse(&value).expect_err("bad kind");
        let message = err.to_string();
        assert!(message.contains("pickups[1].kind"), "{message}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut value = sample_json();
        value["exit"]["colour"] = json!("green");

        let err = parse(&value).expect_err("unknown field");
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[test]
    fn zero_extent_is_invalid() {
        let mut value = sample_json();
        value["hazards"][0]["half_extents"]["y"] = json!(0.0);

        let err = parse(&value).expect_err("flat box");
        assert!(err.to_string().contains("hazards[0].half_extents"));
    }

    #[test]
    fn scenario_without_coins_is_invalid() {
        let mut value = sample_json();
        value["pickups"] = json!([]);

        let err = parse(&value).expect_err("no coins");
        assert!(err.to_string().contains("at least one Coin"));
    }

    #[test]
    fn duplicate_hazard_ids_are_invalid() {
        let mut value = sample_json();
        let hazard = value["hazards"][0].clone();
        value["hazards"] = json!([hazard.clone(), hazard]);

        let err = parse(&value).expect_err("duplicate");
        assert!(err.to_string().contains("hazards[1].id"));
    }

    #[test]
    fn timeline_must_not_go_backwards() {
        let mut value = sample_json();
        value["timeline"][2]["at_seconds"] = json!(0.25);

        let err = parse(&value).expect_err("backwards");
        assert!(err.to_string().contains("timeline[2].at_seconds"));
    }

    #[test]
    fn interact_with_unknown_door_is_invalid() {
        let mut value = sample_json();
        value["timeline"][1]["action"]["target"] = json!("hatch");

        let err = parse(&value).expect_err("unknown door");
        assert!(err.to_string().contains("timeline[1].action.target"));
    }

    #[test]
    fn exit_gate_must_name_a_door() {
        let mut value = sample_json();
        value["exit"]["requires_open_door"] = json!("hatch");

        let err = parse(&value).expect_err("unknown door");
        assert!(err.to_string().contains("exit.requires_open_door"));
    }

    #[test]
    fn unknown_hazard_def_is_rejected_against_defs() {
        let scenario = parse(&sample_json()).expect("parse");
        let err = scenario
            .validate_against_defs(&DefDatabase::default())
            .expect_err("empty db");
        assert!(err.to_string().contains("player_def"));
    }

    #[test]
    fn shipped_default_run_parses() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("scenarios")
            .join("default_run.json");
        let scenario = Scenario::load(&path).expect("default run");
        assert!(scenario.coin_count() > 0);
    }
}
