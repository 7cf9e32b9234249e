use std::process::ExitCode;

use engine::run_headless;
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::gameplay::RunOutcome;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let summary = match run_headless(app.config, app.scene) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match app.outcome.get() {
        RunOutcome::Scored(report) => {
            for line in &report.lines {
                info!(line = %line, "run_summary");
            }
            info!(
                score = report.score,
                ticks_run = summary.ticks_run,
                simulated_seconds = summary.simulated_seconds,
                "run_finished"
            );
            ExitCode::SUCCESS
        }
        RunOutcome::Rejected(message) => {
            error!(error = %message, "run_rejected");
            ExitCode::FAILURE
        }
        RunOutcome::Unfinished => {
            warn!(
                ticks_run = summary.ticks_run,
                simulated_seconds = summary.simulated_seconds,
                ended_by = ?summary.ended_by,
                "run_unfinished"
            );
            ExitCode::SUCCESS
        }
    }
}
