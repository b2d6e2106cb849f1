use std::process::ExitCode;

// The binary uses the library, not duplicate modules
fn main() -> ExitCode {
    speed_limit_app::run_native()
}
