//! In-memory GitHub and Slack doubles that record every call in a shared journal.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use slack_notify_core::compose::ComposedMessage;
use slack_notify_core::event::{Actor, CommentKind, RepoRef, TargetKind, TargetRef};
use slack_notify_core::transport::{
    ChatTransport, CommentDocument, IssueTracker, PostedMessage, TargetDocument, UploadTarget,
};
use tokio::sync::Mutex as AsyncMutex;

pub(crate) type Journal = Arc<AsyncMutex<Vec<String>>>;

pub(crate) fn actor(login: &str) -> Actor {
    Actor {
        login: login.to_string(),
        avatar_url: Some(format!("https://avatars.example/{login}")),
        html_url: None,
    }
}

pub(crate) fn issue_target(number: u64) -> TargetRef {
    TargetRef {
        kind: TargetKind::Issue,
        repo: RepoRef {
            owner: "owner".to_string(),
            name: "repo".to_string(),
        },
        number,
        title: "Crash on start".to_string(),
        html_url: format!("https://github.com/owner/repo/issues/{number}"),
    }
}

pub(crate) fn pull_target(number: u64) -> TargetRef {
    TargetRef {
        kind: TargetKind::PullRequest,
        html_url: format!("https://github.com/owner/repo/pull/{number}"),
        ..issue_target(number)
    }
}

pub(crate) fn fake_pair(body: &str) -> (Arc<FakeIssueTracker>, Arc<FakeChatTransport>) {
    let journal: Journal = Arc::new(AsyncMutex::new(Vec::new()));
    let tracker = FakeIssueTracker {
        journal: journal.clone(),
        ..FakeIssueTracker::with_body(body)
    };
    let chat = FakeChatTransport {
        journal,
        ..FakeChatTransport::default()
    };
    (Arc::new(tracker), Arc::new(chat))
}

#[derive(Default)]
pub(crate) struct FakeIssueTracker {
    pub(crate) journal: Journal,
    body: AsyncMutex<String>,
    body_html: AsyncMutex<String>,
    comments: AsyncMutex<HashMap<u64, CommentDocument>>,
    images: AsyncMutex<HashMap<String, Vec<u8>>>,
    updates: AsyncMutex<Vec<String>>,
    fetch_target_error: AsyncMutex<Option<String>>,
}

impl FakeIssueTracker {
    pub(crate) fn with_body(body: &str) -> Self {
        Self {
            body: AsyncMutex::new(body.to_string()),
            ..Self::default()
        }
    }

    pub(crate) async fn set_body_html(&self, html: &str) {
        *self.body_html.lock().await = html.to_string();
    }

    pub(crate) async fn add_comment(&self, id: u64, author: &str, body: &str, body_html: &str) {
        self.comments.lock().await.insert(
            id,
            CommentDocument {
                body: body.to_string(),
                body_html: body_html.to_string(),
                author: actor(author),
                html_url: None,
            },
        );
    }

    pub(crate) async fn add_image(&self, url: &str, bytes: &[u8]) {
        self.images
            .lock()
            .await
            .insert(url.to_string(), bytes.to_vec());
    }

    pub(crate) async fn fail_fetch_target(&self, message: &str) {
        *self.fetch_target_error.lock().await = Some(message.to_string());
    }

    pub(crate) async fn body(&self) -> String {
        self.body.lock().await.clone()
    }

    pub(crate) async fn updates(&self) -> Vec<String> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl IssueTracker for FakeIssueTracker {
    async fn fetch_target(&self, target: &TargetRef) -> Result<TargetDocument> {
        self.journal
            .lock()
            .await
            .push(format!("fetch_target:{}", target.number));
        if let Some(message) = self.fetch_target_error.lock().await.clone() {
            bail!(message);
        }
        Ok(TargetDocument {
            body: self.body.lock().await.clone(),
            body_html: self.body_html.lock().await.clone(),
            author: actor("reporter"),
            title: target.title.clone(),
            html_url: target.html_url.clone(),
        })
    }

    async fn update_target_body(&self, target: &TargetRef, body: &str) -> Result<()> {
        self.journal
            .lock()
            .await
            .push(format!("update_target_body:{}", target.number));
        self.updates.lock().await.push(body.to_string());
        *self.body.lock().await = body.to_string();
        Ok(())
    }

    async fn fetch_comment(
        &self,
        _target: &TargetRef,
        kind: CommentKind,
        comment_id: u64,
    ) -> Result<CommentDocument> {
        self.journal
            .lock()
            .await
            .push(format!("fetch_comment:{kind:?}:{comment_id}"));
        self.comments
            .lock()
            .await
            .get(&comment_id)
            .cloned()
            .ok_or_else(|| anyhow!("comment {comment_id} not found"))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        self.journal.lock().await.push(format!("fetch_image:{url}"));
        self.images
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("image {url} not found"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedPost {
    pub(crate) channel: String,
    pub(crate) thread_ts: Option<String>,
    pub(crate) message: ComposedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCompletion {
    pub(crate) file_ids: Vec<String>,
    pub(crate) channel: String,
    pub(crate) thread_ts: String,
}

#[derive(Default)]
pub(crate) struct FakeChatTransport {
    pub(crate) journal: Journal,
    posts: AsyncMutex<Vec<RecordedPost>>,
    upload_requests: AsyncMutex<Vec<(String, usize)>>,
    sent_file_ids: AsyncMutex<Vec<String>>,
    completions: AsyncMutex<Vec<RecordedCompletion>>,
    /// 1-based index of the `send_upload` call that fails.
    fail_send_at: AsyncMutex<Option<usize>>,
}

impl FakeChatTransport {
    pub(crate) async fn fail_send_at(&self, call: usize) {
        *self.fail_send_at.lock().await = Some(call);
    }

    pub(crate) async fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().await.clone()
    }

    pub(crate) async fn upload_requests(&self) -> Vec<(String, usize)> {
        self.upload_requests.lock().await.clone()
    }

    pub(crate) async fn sent_file_ids(&self) -> Vec<String> {
        self.sent_file_ids.lock().await.clone()
    }

    pub(crate) async fn completions(&self) -> Vec<RecordedCompletion> {
        self.completions.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for FakeChatTransport {
    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage> {
        let mut posts = self.posts.lock().await;
        posts.push(RecordedPost {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            message: message.clone(),
        });
        let ts = format!("P{}", posts.len());
        self.journal.lock().await.push(format!("post_message:{ts}"));
        Ok(PostedMessage {
            channel: "C-ID".to_string(),
            ts,
        })
    }

    async fn request_upload(&self, filename: &str, length: usize) -> Result<UploadTarget> {
        let mut requests = self.upload_requests.lock().await;
        requests.push((filename.to_string(), length));
        self.journal
            .lock()
            .await
            .push(format!("request_upload:{filename}"));
        let file_id = format!("F{}", requests.len());
        Ok(UploadTarget {
            upload_url: format!("https://files.example/upload/{file_id}"),
            file_id,
        })
    }

    async fn send_upload(&self, target: &UploadTarget, _bytes: &[u8]) -> Result<()> {
        let mut sent = self.sent_file_ids.lock().await;
        let call = sent.len() + 1;
        if *self.fail_send_at.lock().await == Some(call) {
            bail!("upload of {} rejected", target.file_id);
        }
        sent.push(target.file_id.clone());
        self.journal
            .lock()
            .await
            .push(format!("send_upload:{}", target.file_id));
        Ok(())
    }

    async fn complete_upload(
        &self,
        file_ids: &[String],
        channel: &str,
        thread_ts: &str,
    ) -> Result<()> {
        self.journal
            .lock()
            .await
            .push(format!("complete_upload:{}", file_ids.join(",")));
        self.completions.lock().await.push(RecordedCompletion {
            file_ids: file_ids.to_vec(),
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
        });
        Ok(())
    }
}
