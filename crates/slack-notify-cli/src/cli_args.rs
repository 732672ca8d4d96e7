use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "slack-notify",
    about = "Mirror GitHub issue and pull request activity into threaded Slack messages",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used to read and update issues, pull requests and comments"
    )]
    pub(crate) github_token: String,

    #[arg(
        long = "slack-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token with chat:write and files:write scopes"
    )]
    pub(crate) slack_token: String,

    #[arg(
        long = "slack-channel",
        env = "SLACK_CHANNEL",
        help = "Slack channel id or name that receives root notifications"
    )]
    pub(crate) slack_channel: String,

    #[arg(
        long = "github-repo",
        env = "GITHUB_REPOSITORY",
        help = "Repository in owner/repo format, used when the event payload has no repository"
    )]
    pub(crate) github_repo: Option<String>,

    #[arg(
        long = "event-name",
        env = "GITHUB_EVENT_NAME",
        help = "Triggering GitHub event name (issues, issue_comment, pull_request, pull_request_review_comment)"
    )]
    pub(crate) event_name: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the webhook payload JSON written by GitHub Actions"
    )]
    pub(crate) event_path: PathBuf,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "Base URL for the GitHub REST API"
    )]
    pub(crate) github_api_base: String,

    #[arg(
        long = "slack-api-base",
        env = "SLACK_NOTIFY_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Base URL for the Slack Web API"
    )]
    pub(crate) slack_api_base: String,

    #[arg(
        long = "image-host-prefix",
        env = "SLACK_NOTIFY_IMAGE_HOST_PREFIX",
        default_value = "https://private-user-images.githubusercontent.com/",
        help = "Only images whose URL starts with this prefix are attached; empty attaches every image"
    )]
    pub(crate) image_host_prefix: String,

    #[arg(
        long = "skip-images",
        env = "SLACK_NOTIFY_SKIP_IMAGES",
        default_value_t = false,
        help = "Do not download or upload embedded images"
    )]
    pub(crate) skip_images: bool,

    #[arg(
        long = "users-config",
        env = "SLACK_NOTIFY_USERS_CONFIG",
        conflicts_with = "users_config_inline",
        help = "TOML file mapping GitHub logins to Slack member ids ([[users]] github/slack)"
    )]
    pub(crate) users_config: Option<PathBuf>,

    #[arg(
        long = "users-config-inline",
        env = "SLACK_NOTIFY_USERS",
        help = "Inline TOML user mapping, same format as --users-config"
    )]
    pub(crate) users_config_inline: Option<String>,

    #[arg(
        long = "request-timeout-ms",
        env = "SLACK_NOTIFY_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for GitHub and Slack API calls"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "SLACK_NOTIFY_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable API failures (429, 5xx, transport errors)"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "SLACK_NOTIFY_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff"
    )]
    pub(crate) retry_base_delay_ms: u64,
}
