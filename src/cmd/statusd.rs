use std::process::ExitCode;

// returning from main drops the runtime, which kills an in-flight collector
#[tokio::main]
async fn main() -> ExitCode {
    ExitCode::from(statusd::daemon::run().await)
}
