use std::process::ExitCode;

use engine::run_app;
use tracing::error;

use super::bootstrap::AppWiring;

pub(crate) fn run(wiring: AppWiring) -> ExitCode {
    if let Err(err) = run_app(wiring.config, wiring.paths, wiring.app) {
        error!(error = %err, "app_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
