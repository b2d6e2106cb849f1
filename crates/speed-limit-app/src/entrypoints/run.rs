use super::logging::setup_logging;
use super::metadata::log_version_info;
use crate::app::SpeedLimitApp;
use crate::app::settings::Settings;
use std::process::ExitCode;

/// Setup and create the app
pub fn setup_app() -> SpeedLimitApp {
    setup_logging();
    log_version_info();
    SpeedLimitApp::new(Settings::from_cli())
}

/// Native entry point
pub fn run_native() -> ExitCode {
    let app = setup_app();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        let mut stdout = tokio::io::stdout();
        match app.run(&mut stdout).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Speed limit session failed: {e}");
                ExitCode::FAILURE
            }
        }
    })
}
