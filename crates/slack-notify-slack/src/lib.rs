//! Slack Web API client for threaded notifications and external file uploads.

mod slack_api_client;

pub use slack_api_client::{build_post_message_payload, SlackApiClient};
