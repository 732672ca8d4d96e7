mod bootstrap_helpers;
mod cli_args;
mod notify_config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use slack_notify_core::event::classify_event;
use slack_notify_github::GithubApiClient;
use slack_notify_runtime::{DispatchReport, NotificationDispatcher};
use slack_notify_slack::SlackApiClient;

use crate::bootstrap_helpers::{init_tracing, report_failure};
use crate::cli_args::Cli;
use crate::notify_config::{load_event_payload, NotifyConfig};

async fn run_notify(config: &NotifyConfig) -> Result<DispatchReport> {
    let payload = load_event_payload(&config.event_path)?;
    let outcome = classify_event(&config.event_name, &payload, config.repo.as_ref())?;

    let github = GithubApiClient::new(
        config.github_api_base.clone(),
        config.github_token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;
    let slack = SlackApiClient::new(
        config.slack_api_base.clone(),
        config.slack_token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;
    let dispatcher = NotificationDispatcher::new(
        Arc::new(github),
        Arc::new(slack),
        config.dispatcher_config(),
    );
    dispatcher.handle(outcome).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = NotifyConfig::from_cli(&cli)?;
    let report = run_notify(&config).await?;
    tracing::info!(
        event = %report.event,
        actions = ?report.action_labels(),
        posted = report.posted.len(),
        uploaded_files = report.uploaded_files,
        "notification run complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_failure(&error);
            ExitCode::FAILURE
        }
    }
}
