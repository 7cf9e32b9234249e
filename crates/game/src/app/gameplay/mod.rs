use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use engine::{
    EntityId, HazardDef, HazardKind, ImmunityRule, OccupancyEvent, Pose, Scene, SceneCommand,
    SceneWorld, Transform, TriggerId, TriggerTracker, TriggerVolume, Vec3,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::scenario::{PickupKind, Scenario, TimelineAction};

const PICKUP_RADIUS_UNITS: f32 = 0.75;
const COIN_SCORE_WEIGHT: f64 = 700.0;
const DEATH_PENALTY_PER_DEATH: f64 = 40.0;
const DEATH_PENALTY_CAP: f64 = 200.0;
const TIME_GRACE_SECONDS: f64 = 150.0;
const TIME_SOFT_LIMIT_SECONDS: f64 = 300.0;
const TIME_SOFT_PENALTY_RATE: f64 = 0.66;
const TIME_SOFT_PENALTY_CAP: f64 = 99.0;
const TIME_HARD_PENALTY_BASE: f64 = 150.0;
const TIME_HARD_PENALTY_RATE: f64 = 2.0;
const SCORE_BASE: f64 = 999.0;
const SCORE_MAX: u32 = 999;

include!("types.rs");
include!("health.rs");
include!("hazards.rs");
include!("scoring.rs");
include!("world_items.rs");
include!("scene_impl.rs");
include!("util.rs");

pub(crate) fn build_escape_scene(scenario: Scenario) -> (Box<dyn Scene>, RunOutcomeHandle) {
    let outcome = RunOutcomeHandle::default();
    let scene = EscapeScene::new(scenario, outcome.clone());
    (Box::new(scene), outcome)
}
