use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use slack_notify_core::event::{Actor, CommentKind, TargetKind, TargetRef};
use slack_notify_core::transport::{CommentDocument, IssueTracker, TargetDocument};
use slack_notify_core::transport_helpers::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error, RETRY_ATTEMPT_HEADER,
};

/// Media type returning both the markdown `body` and the rendered `body_html`.
const GITHUB_FULL_MEDIA_TYPE: &str = "application/vnd.github.full+json";

#[derive(Debug, Clone, Deserialize)]
struct GithubTargetResponse {
    title: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
    user: Actor,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommentResponse {
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
    user: Actor,
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    download_http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(
        api_base: String,
        token: String,
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
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let timeout = Duration::from_millis(request_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to create github api client")?;
        // Image hosts get no credentials; signed URLs carry their own token.
        let download_http = reqwest::Client::builder()
            .user_agent("slack-notify")
            .timeout(timeout)
            .build()
            .context("failed to create github download client")?;
        Ok(Self {
            http,
            download_http,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn target_url(&self, target: &TargetRef) -> String {
        let collection = match target.kind {
            TargetKind::Issue => "issues",
            TargetKind::PullRequest => "pulls",
        };
        format!(
            "{}/repos/{}/{}/{}/{}",
            self.api_base, target.repo.owner, target.repo.name, collection, target.number
        )
    }

    fn comment_url(&self, target: &TargetRef, kind: CommentKind, comment_id: u64) -> String {
        let collection = match kind {
            CommentKind::Issue => "issues",
            CommentKind::Review => "pulls",
        };
        format!(
            "{}/repos/{}/{}/{}/comments/{}",
            self.api_base, target.repo.owner, target.repo.name, collection, comment_id
        )
    }

    pub async fn get_target(&self, target: &TargetRef) -> Result<TargetDocument> {
        let url = self.target_url(target);
        let operation = format!("get {} #{}", target.kind.label(), target.number);
        let response: GithubTargetResponse = self
            .request_json(&operation, || {
                self.http
                    .get(&url)
                    .header(reqwest::header::ACCEPT, GITHUB_FULL_MEDIA_TYPE)
            })
            .await?;
        Ok(TargetDocument {
            body: response.body.unwrap_or_default(),
            body_html: response.body_html.unwrap_or_default(),
            author: response.user,
            title: response.title,
            html_url: response.html_url,
        })
    }

    pub async fn patch_target_body(&self, target: &TargetRef, body: &str) -> Result<()> {
        let url = self.target_url(target);
        let operation = format!("update {} #{}", target.kind.label(), target.number);
        let payload = json!({ "body": body });
        let _: serde_json::Value = self
            .request_json(&operation, || self.http.patch(&url).json(&payload))
            .await?;
        Ok(())
    }

    pub async fn get_comment(
        &self,
        target: &TargetRef,
        kind: CommentKind,
        comment_id: u64,
    ) -> Result<CommentDocument> {
        let url = self.comment_url(target, kind, comment_id);
        let operation = match kind {
            CommentKind::Issue => "get issue comment",
            CommentKind::Review => "get review comment",
        };
        let response: GithubCommentResponse = self
            .request_json(operation, || {
                self.http
                    .get(&url)
                    .header(reqwest::header::ACCEPT, GITHUB_FULL_MEDIA_TYPE)
            })
            .await?;
        Ok(CommentDocument {
            body: response.body.unwrap_or_default(),
            body_html: response.body_html.unwrap_or_default(),
            author: response.user,
            html_url: response.html_url,
        })
    }

    pub async fn download_url_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let request = || self.download_http.get(url);
        self.request_bytes("download image", request).await
    }

    async fn request_bytes<F>(&self, operation: &str, mut request_builder: F) -> Result<Vec<u8>>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response
                            .bytes()
                            .await
                            .with_context(|| format!("failed to read github {operation} body"))?;
                        return Ok(bytes.to_vec());
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error).with_context(|| format!("github {operation} request failed"));
                }
            }
        }
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::debug!(operation, attempt, "github api request succeeded");
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying github api request"
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
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl IssueTracker for GithubApiClient {
    async fn fetch_target(&self, target: &TargetRef) -> Result<TargetDocument> {
        self.get_target(target).await
    }

    async fn update_target_body(&self, target: &TargetRef, body: &str) -> Result<()> {
        self.patch_target_body(target, body).await
    }

    async fn fetch_comment(
        &self,
        target: &TargetRef,
        kind: CommentKind,
        comment_id: u64,
    ) -> Result<CommentDocument> {
        self.get_comment(target, kind, comment_id).await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        self.download_url_bytes(url).await
    }
}
