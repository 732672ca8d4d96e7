//! Seams between the notifier runtime and the remote GitHub/Slack APIs.

use anyhow::Result;
use async_trait::async_trait;

use crate::compose::ComposedMessage;
use crate::event::{Actor, CommentKind, TargetRef};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Live view of an issue or pull request body.
pub struct TargetDocument {
    /// Raw markdown body, including any metadata block.
    pub body: String,
    /// GitHub's HTML rendering of `body`.
    pub body_html: String,
    pub author: Actor,
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDocument {
    pub body: String,
    pub body_html: String,
    pub author: Actor,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub file_id: String,
}

#[async_trait]
/// Read/update operations on issues, pull requests and their comments.
pub trait IssueTracker: Send + Sync {
    async fn fetch_target(&self, target: &TargetRef) -> Result<TargetDocument>;

    async fn update_target_body(&self, target: &TargetRef, body: &str) -> Result<()>;

    async fn fetch_comment(
        &self,
        target: &TargetRef,
        kind: CommentKind,
        comment_id: u64,
    ) -> Result<CommentDocument>;

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
/// Message posting and the external file-upload handshake.
pub trait ChatTransport: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage>;

    async fn request_upload(&self, filename: &str, length: usize) -> Result<UploadTarget>;

    async fn send_upload(&self, target: &UploadTarget, bytes: &[u8]) -> Result<()>;

    async fn complete_upload(&self, file_ids: &[String], channel: &str, thread_ts: &str)
        -> Result<()>;
}
