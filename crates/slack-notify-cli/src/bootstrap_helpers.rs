use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Escapes a message for a GitHub Actions workflow command.
pub(crate) fn escape_workflow_command_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub(crate) fn running_in_github_actions() -> bool {
    std::env::var("GITHUB_ACTIONS")
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Emits the single failure diagnostic for this run.
pub(crate) fn report_failure(error: &anyhow::Error) {
    let message = format!("{error:#}");
    if running_in_github_actions() {
        println!("::error::{}", escape_workflow_command_data(&message));
    } else {
        eprintln!("error: {message}");
    }
}
