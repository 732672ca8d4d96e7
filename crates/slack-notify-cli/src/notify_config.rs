//! Validated runtime configuration assembled from CLI flags and environment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use slack_notify_core::event::RepoRef;
use slack_notify_core::mentions::UserDirectory;
use slack_notify_runtime::DispatcherConfig;

use crate::cli_args::Cli;

#[derive(Debug, Clone)]
pub(crate) struct NotifyConfig {
    pub(crate) github_token: String,
    pub(crate) slack_token: String,
    pub(crate) slack_channel: String,
    pub(crate) repo: Option<RepoRef>,
    pub(crate) event_name: String,
    pub(crate) event_path: PathBuf,
    pub(crate) github_api_base: String,
    pub(crate) slack_api_base: String,
    pub(crate) image_host_prefix: Option<String>,
    pub(crate) skip_images: bool,
    pub(crate) users: UserDirectory,
    pub(crate) request_timeout_ms: u64,
    pub(crate) retry_max_attempts: usize,
    pub(crate) retry_base_delay_ms: u64,
}

fn required(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} must not be empty");
    }
    Ok(trimmed.to_string())
}

fn load_users(cli: &Cli) -> Result<UserDirectory> {
    let raw = match (&cli.users_config, &cli.users_config_inline) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read users config {}", path.display()))?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => return Ok(UserDirectory::default()),
    };
    if raw.trim().is_empty() {
        return Ok(UserDirectory::default());
    }
    UserDirectory::from_toml_str(&raw).context("invalid users config")
}

impl NotifyConfig {
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        let repo = cli
            .github_repo
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(RepoRef::parse)
            .transpose()?;
        let image_host_prefix = Some(cli.image_host_prefix.trim())
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string);

        Ok(Self {
            github_token: required(&cli.github_token, "--github-token")?,
            slack_token: required(&cli.slack_token, "--slack-token")?,
            slack_channel: required(&cli.slack_channel, "--slack-channel")?,
            repo,
            event_name: required(&cli.event_name, "--event-name")?,
            event_path: cli.event_path.clone(),
            github_api_base: required(&cli.github_api_base, "--github-api-base")?,
            slack_api_base: required(&cli.slack_api_base, "--slack-api-base")?,
            image_host_prefix,
            skip_images: cli.skip_images,
            users: load_users(cli)?,
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
    }

    pub(crate) fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            channel: self.slack_channel.clone(),
            image_host_prefix: self.image_host_prefix.clone(),
            skip_images: self.skip_images,
            users: self.users.clone(),
        }
    }
}

pub(crate) fn load_event_payload(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse event payload {}", path.display()))
}
