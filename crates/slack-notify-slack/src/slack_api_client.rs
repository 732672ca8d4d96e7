//! Slack Web API client helpers used by notification posting and image upload flows.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use slack_notify_core::compose::ComposedMessage;
use slack_notify_core::transport::{ChatTransport, PostedMessage, UploadTarget};
use slack_notify_core::transport_helpers::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error, RETRY_ATTEMPT_HEADER,
};

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackGetUploadUrlExternalResponse {
    ok: bool,
    upload_url: Option<String>,
    file_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackCompleteUploadExternalResponse {
    ok: bool,
    error: Option<String>,
}

/// Builds the `chat.postMessage` body: header blocks on top, body blocks in a colored attachment.
pub fn build_post_message_payload(
    channel: &str,
    message: &ComposedMessage,
    thread_ts: Option<&str>,
) -> Value {
    let mut payload = json!({
        "channel": channel,
        "text": message.fallback_text,
        "blocks": message.header_blocks,
        "attachments": [{
            "color": message.accent.hex(),
            "blocks": message.body_blocks,
        }],
        "unfurl_links": false,
        "unfurl_media": false,
    });
    if let Some(thread_ts) = thread_ts.map(str::trim).filter(|value| !value.is_empty()) {
        payload["thread_ts"] = Value::String(thread_ts.to_string());
    }
    payload
}

/// Which failures a request may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryScope {
    /// Any retryable status or transport error.
    Any,
    /// Only failures where Slack cannot have accepted the request: rate limits and
    /// connection errors. Timeouts and 5xx may already have produced a side effect.
    RejectedOnly,
}

impl RetryScope {
    fn allows_status(self, status: u16) -> bool {
        match self {
            Self::Any => is_retryable_status(status),
            Self::RejectedOnly => status == 429,
        }
    }

    fn allows_transport_error(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Any => is_retryable_transport_error(error),
            Self::RejectedOnly => error.is_connect() && !error.is_timeout(),
        }
    }
}

fn slack_error(operation: &str, error: Option<String>) -> anyhow::Error {
    anyhow!(
        "slack {operation} failed: {}",
        error.unwrap_or_else(|| "unknown error".to_string())
    )
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("slack-notify"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub async fn post_chat_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage> {
        let payload = build_post_message_payload(channel, message, thread_ts);
        let response: SlackChatMessageResponse = self
            .request_json("chat.postMessage", RetryScope::RejectedOnly, || {
                self.http
                    .post(format!("{}/chat.postMessage", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;

        if !response.ok {
            return Err(slack_error("chat.postMessage", response.error));
        }

        Ok(PostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response
                .ts
                .ok_or_else(|| anyhow!("slack chat.postMessage response missing ts"))?,
        })
    }

    pub async fn get_upload_url_external(
        &self,
        filename: &str,
        length: usize,
    ) -> Result<UploadTarget> {
        if filename.trim().is_empty() {
            bail!("slack files upload requires non-empty filename");
        }
        if length == 0 {
            bail!("slack files upload requires non-empty payload");
        }
        let length = length.to_string();
        let response: SlackGetUploadUrlExternalResponse = self
            .request_json("files.getUploadURLExternal", RetryScope::Any, || {
                self.http
                    .post(format!("{}/files.getUploadURLExternal", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .form(&[("filename", filename), ("length", length.as_str())])
            })
            .await?;
        if !response.ok {
            return Err(slack_error("files.getUploadURLExternal", response.error));
        }
        let upload_url = response
            .upload_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing upload_url"))?;
        let file_id = response
            .file_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing file_id"))?;
        Ok(UploadTarget {
            upload_url,
            file_id,
        })
    }

    pub async fn upload_to_url(&self, target: &UploadTarget, bytes: &[u8]) -> Result<()> {
        let upload_response = self
            .http
            .post(&target.upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .context("failed to upload file payload to slack external upload URL")?;
        if !upload_response.status().is_success() {
            let status = upload_response.status();
            let body = upload_response.text().await.unwrap_or_default();
            bail!(
                "slack external upload failed for file {}: status={} body={}",
                target.file_id,
                status,
                truncate_for_error(&body, 320)
            );
        }
        Ok(())
    }

    pub async fn complete_upload_external(
        &self,
        file_ids: &[String],
        channel: &str,
        thread_ts: &str,
    ) -> Result<()> {
        if file_ids.is_empty() {
            bail!("slack files.completeUploadExternal requires at least one file id");
        }
        let files = Value::Array(
            file_ids
                .iter()
                .map(|file_id| json!({ "id": file_id }))
                .collect(),
        )
        .to_string();
        let mut form = vec![("files", files), ("channel_id", channel.to_string())];
        if !thread_ts.trim().is_empty() {
            form.push(("thread_ts", thread_ts.trim().to_string()));
        }

        let response: SlackCompleteUploadExternalResponse = self
            .request_json("files.completeUploadExternal", RetryScope::Any, || {
                self.http
                    .post(format!("{}/files.completeUploadExternal", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .form(&form)
            })
            .await?;
        if !response.ok {
            return Err(slack_error("files.completeUploadExternal", response.error));
        }
        Ok(())
    }

    async fn request_json<T, F>(
        &self,
        operation: &str,
        scope: RetryScope,
        mut builder: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::debug!(operation, attempt, "slack api request succeeded");
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode slack {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && scope.allows_status(status.as_u16()) {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying slack api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && scope.allows_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl ChatTransport for SlackApiClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage> {
        self.post_chat_message(channel, message, thread_ts).await
    }

    async fn request_upload(&self, filename: &str, length: usize) -> Result<UploadTarget> {
        self.get_upload_url_external(filename, length).await
    }

    async fn send_upload(&self, target: &UploadTarget, bytes: &[u8]) -> Result<()> {
        self.upload_to_url(target, bytes).await
    }

    async fn complete_upload(
        &self,
        file_ids: &[String],
        channel: &str,
        thread_ts: &str,
    ) -> Result<()> {
        self.complete_upload_external(file_ids, channel, thread_ts)
            .await
    }
}
