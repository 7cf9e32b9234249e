mod loop_runner;
mod metrics;
mod scene;
mod trigger;

pub use loop_runner::{
    run_headless, run_headless_with_defs, AppError, LoopConfig, LoopPacing, RunEnd, RunSummary,
    REALTIME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    Entity, EntityId, Pose, Scene, SceneCommand, SceneWorld, Transform, Vec3,
};
pub use trigger::{OccupancyEvent, TriggerId, TriggerTracker, TriggerVolume};
