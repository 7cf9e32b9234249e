use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    build_def_database, resolve_app_paths, ContentPipelineError, ContentPlanRequest, DefDatabase,
    StartupError,
};

use super::metrics::MetricsAccumulator;
use super::scene::{SceneCommand, SceneRuntime};
use super::{LoopMetricsSnapshot, MetricsHandle, Scene};

pub const REALTIME_ENV_VAR: &str = "ESCAPE_REALTIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPacing {
    /// Every frame advances exactly one fixed step; nothing sleeps.
    Simulated,
    /// Frame deltas come from the wall clock and the loop sleeps between
    /// ticks.
    Realtime,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_simulated: Duration,
    pub pacing: LoopPacing,
    pub content_plan_request: ContentPlanRequest,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_simulated: Duration::from_secs(900),
            pacing: LoopPacing::Simulated,
            content_plan_request: ContentPlanRequest::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    SceneQuit,
    TimeCap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub simulated_seconds: f64,
    pub ended_by: RunEnd,
    pub final_metrics: LoopMetricsSnapshot,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to build content database: {0}")]
    ContentPipeline(#[from] ContentPipelineError),
}

pub fn run_headless(config: LoopConfig, scene: Box<dyn Scene>) -> Result<RunSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        "startup"
    );
    let def_database = build_def_database(&app_paths, &config.content_plan_request)?;
    Ok(run_headless_with_defs(
        config,
        scene,
        def_database,
        MetricsHandle::default(),
    ))
}

pub fn run_headless_with_defs(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    def_database: DefDatabase,
    metrics_handle: MetricsHandle,
) -> RunSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let tick_cap = tick_cap_for(config.max_simulated, fixed_dt);
    let pacing = resolve_pacing(config.pacing);

    let mut runtime = SceneRuntime::new(scene);
    runtime.set_def_database(def_database);
    runtime.load();
    info!(
        entity_count = runtime.world().entity_count(),
        title = runtime.debug_title().unwrap_or_default(),
        "scene_loaded"
    );
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        tick_cap,
        pacing = ?pacing,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, last_frame_instant);
    let mut ticks_run = 0u64;

    let ended_by = 'frames: loop {
        let now = Instant::now();
        let raw_frame_dt = match pacing {
            LoopPacing::Simulated => fixed_dt,
            LoopPacing::Realtime => now.saturating_duration_since(last_frame_instant),
        };
        last_frame_instant = now;

        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        accumulator = step_plan.remaining_accumulator;
        for _ in 0..step_plan.ticks_to_run {
            let tick_start = Instant::now();
            let command = runtime.update(fixed_dt_seconds);
            metrics_accumulator.record_tick(tick_start.elapsed(), fixed_dt);
            ticks_run = ticks_run.saturating_add(1);

            if command == SceneCommand::Quit {
                break 'frames RunEnd::SceneQuit;
            }
            if ticks_run >= tick_cap {
                warn!(tick_cap, "simulated_time_cap_reached");
                break 'frames RunEnd::TimeCap;
            }
        }

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_cost_ms = snapshot.tick_cost_ms,
                simulated_seconds = snapshot.simulated_seconds,
                entity_count = runtime.world().entity_count(),
                "loop_metrics"
            );
        }

        if pacing == LoopPacing::Realtime {
            let elapsed = Instant::now().saturating_duration_since(now);
            let sleep = compute_pacing_sleep(elapsed, fixed_dt);
            if sleep > Duration::ZERO {
                thread::sleep(sleep);
            }
        }
    };

    let final_metrics = metrics_accumulator.flush(Instant::now());
    metrics_handle.publish(final_metrics);
    let simulated_seconds = runtime.world().elapsed_seconds();
    runtime.shutdown();
    info!(ticks_run, simulated_seconds, ended_by = ?ended_by, "shutdown");

    RunSummary {
        ticks_run,
        simulated_seconds,
        ended_by,
        final_metrics,
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn tick_cap_for(max_simulated: Duration, fixed_dt: Duration) -> u64 {
    let step_nanos = fixed_dt.as_nanos().max(1);
    let ticks = max_simulated.as_nanos().div_ceil(step_nanos);
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}

fn compute_pacing_sleep(elapsed: Duration, target: Duration) -> Duration {
    if elapsed < target {
        target - elapsed
    } else {
        Duration::ZERO
    }
}

fn resolve_pacing(config_pacing: LoopPacing) -> LoopPacing {
    match env::var(REALTIME_ENV_VAR) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => LoopPacing::Realtime,
            "0" | "false" | "no" => LoopPacing::Simulated,
            _ => {
                warn!(
                    env_var = REALTIME_ENV_VAR,
                    value = value.as_str(),
                    "invalid realtime env var value; falling back to config"
                );
                config_pacing
            }
        },
        Err(env::VarError::NotPresent) => config_pacing,
        Err(err) => {
            warn!(
                env_var = REALTIME_ENV_VAR,
                error = %err,
                "unable to read realtime env var; falling back to config"
            );
            config_pacing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::{SceneWorld, Transform};

    struct QuitAfter {
        remaining: u32,
    }

    impl Scene for QuitAfter {
        fn load(&mut self, world: &mut SceneWorld) {
            world.spawn(Transform::default(), "marker");
        }

        fn update(&mut self, _fixed_dt_seconds: f32, _world: &mut SceneWorld) -> SceneCommand {
            if self.remaining == 0 {
                return SceneCommand::Quit;
            }
            self.remaining -= 1;
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    fn simulated_config(target_tps: u32, max_simulated: Duration) -> LoopConfig {
        LoopConfig {
            target_tps,
            max_simulated,
            pacing: LoopPacing::Simulated,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn tick_cap_rounds_up_and_never_hits_zero() {
        let fixed_dt = Duration::from_millis(100);
        assert_eq!(tick_cap_for(Duration::from_millis(250), fixed_dt), 3);
        assert_eq!(tick_cap_for(Duration::ZERO, fixed_dt), 1);
    }

    #[test]
    fn pacing_sleep_is_zero_when_over_budget() {
        let target = Duration::from_millis(16);
        assert_eq!(
            compute_pacing_sleep(Duration::from_millis(20), target),
            Duration::ZERO
        );
        assert_eq!(
            compute_pacing_sleep(Duration::from_millis(6), target),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn simulated_run_stops_when_scene_quits() {
        let summary = run_headless_with_defs(
            simulated_config(10, Duration::from_secs(60)),
            Box::new(QuitAfter { remaining: 4 }),
            DefDatabase::default(),
            MetricsHandle::default(),
        );

        assert_eq!(summary.ended_by, RunEnd::SceneQuit);
        assert_eq!(summary.ticks_run, 5);
    }

    #[test]
    fn simulated_run_stops_at_time_cap() {
        let summary = run_headless_with_defs(
            simulated_config(10, Duration::from_secs(2)),
            Box::new(QuitAfter { remaining: u32::MAX }),
            DefDatabase::default(),
            MetricsHandle::default(),
        );

        assert_eq!(summary.ended_by, RunEnd::TimeCap);
        assert_eq!(summary.ticks_run, 20);
    }
}
