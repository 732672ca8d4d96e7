//! Maps classified GitHub events onto Slack posts and keeps the issue-body metadata in sync.
//!
//! Lifecycle per issue or pull request:
//! - `Unnotified`: no readable root handle. Any event first bootstraps a root message.
//! - `Notified`: root handle recorded. Comments reply in its thread and are recorded as
//!   sub-entries; closed/merged events post a threaded status line without touching state.
//!
//! Every save embeds into the body read at the start of the run, and always after the
//! corresponding Slack post succeeded.

use std::sync::Arc;

use anyhow::{Context, Result};
use slack_notify_core::compose::{
    compose_message, compose_status_message, AccentColor, StatusOutcome,
};
use slack_notify_core::event::{CommentEvent, EventContext, EventParseOutcome, NotifyEvent, TargetRef};
use slack_notify_core::image_extract::extract_img_srcs;
use slack_notify_core::mentions::UserDirectory;
use slack_notify_core::metadata::{
    add_comment_notification, strip_metadata_block, Metadata, NotificationHandle,
};
use slack_notify_core::transport::{ChatTransport, IssueTracker, PostedMessage};

use crate::image_uploader::{fetch_images, upload_images};
use crate::state_store::{LoadedState, NotificationStateStore};

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Channel for root messages; replies follow the channel id Slack returned for the root.
    pub channel: String,
    /// Only images whose URL starts with this prefix are attached; `None` attaches all.
    pub image_host_prefix: Option<String>,
    pub skip_images: bool,
    pub users: UserDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationState {
    Unnotified,
    Notified {
        metadata: Metadata,
        root: NotificationHandle,
    },
}

impl NotificationState {
    /// Metadata without a root handle cannot anchor a thread and counts as unnotified.
    pub fn from_metadata(metadata: Option<Metadata>) -> Self {
        match metadata {
            Some(metadata) => match metadata.issue_notification.clone() {
                Some(root) => Self::Notified { metadata, root },
                None => Self::Unnotified,
            },
            None => Self::Unnotified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    Bootstrapped,
    Replied,
    StatusPosted,
    AlreadyNotified,
    Skipped,
}

impl DispatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrapped => "bootstrapped",
            Self::Replied => "replied",
            Self::StatusPosted => "status_posted",
            Self::AlreadyNotified => "already_notified",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: String,
    pub actions: Vec<DispatchAction>,
    pub posted: Vec<PostedMessage>,
    pub uploaded_files: usize,
    pub skip_reason: Option<String>,
}

impl DispatchReport {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            ..Self::default()
        }
    }

    fn skipped(reason: String) -> Self {
        Self {
            event: "skipped".to_string(),
            actions: vec![DispatchAction::Skipped],
            skip_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn action_labels(&self) -> Vec<&'static str> {
        self.actions.iter().map(|action| action.as_str()).collect()
    }
}

pub struct NotificationDispatcher {
    tracker: Arc<dyn IssueTracker>,
    chat: Arc<dyn ChatTransport>,
    store: NotificationStateStore,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        chat: Arc<dyn ChatTransport>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store: NotificationStateStore::new(tracker.clone()),
            tracker,
            chat,
            config,
        }
    }

    pub async fn handle(&self, outcome: EventParseOutcome) -> Result<DispatchReport> {
        match outcome {
            EventParseOutcome::Event(event) => self.dispatch(&event).await,
            EventParseOutcome::Skip(reason) => {
                tracing::info!(%reason, "skipping event");
                Ok(DispatchReport::skipped(reason))
            }
        }
    }

    pub async fn dispatch(&self, event: &NotifyEvent) -> Result<DispatchReport> {
        let target = event.target();
        let loaded = self.store.load(target).await?;
        let mut report = DispatchReport::new(event.as_str());
        tracing::info!(
            event = event.as_str(),
            repo = %target.repo.as_slug(),
            number = target.number,
            "dispatching event"
        );

        let (metadata, root, bootstrapped) =
            match NotificationState::from_metadata(loaded.metadata.clone()) {
                NotificationState::Unnotified => {
                    let (metadata, root) = self.bootstrap_root(target, &loaded, &mut report).await?;
                    (metadata, root, true)
                }
                NotificationState::Notified { metadata, root } => (metadata, root, false),
            };

        match event {
            NotifyEvent::IssueOpened(_) | NotifyEvent::PullRequestOpened(_) => {
                if !bootstrapped {
                    tracing::info!(
                        number = target.number,
                        root_ts = %root.ts,
                        "root notification already exists; ignoring open event"
                    );
                    report.actions.push(DispatchAction::AlreadyNotified);
                }
            }
            NotifyEvent::IssueClosed(context) | NotifyEvent::PullRequestClosed(context) => {
                self.post_status(context, &root, StatusOutcome::Closed, &mut report)
                    .await?;
            }
            NotifyEvent::PullRequestMerged(context) => {
                self.post_status(context, &root, StatusOutcome::Merged, &mut report)
                    .await?;
            }
            NotifyEvent::IssueCommentCreated(comment)
            | NotifyEvent::PullRequestReviewCommentCreated(comment) => {
                self.reply_to_comment(comment, &metadata, &root, &loaded.document.body, &mut report)
                    .await?;
            }
        }
        Ok(report)
    }

    async fn bootstrap_root(
        &self,
        target: &TargetRef,
        loaded: &LoadedState,
        report: &mut DispatchReport,
    ) -> Result<(Metadata, NotificationHandle)> {
        let document = &loaded.document;
        let message = compose_message(
            &document.author,
            target,
            AccentColor::Green,
            &strip_metadata_block(&document.body),
            &self.config.users,
        );
        let posted = self
            .chat
            .post_message(&self.config.channel, &message, None)
            .await
            .with_context(|| format!("failed to post root notification for #{}", target.number))?;
        let root = NotificationHandle::new(posted.ts.clone(), posted.channel.clone());
        report.posted.push(posted);

        report.uploaded_files += self.attach_images(&document.body_html, &root).await?;

        let metadata = Metadata::new_root(root.clone());
        self.store.save(target, &document.body, &metadata).await?;
        tracing::info!(
            number = target.number,
            root_ts = %root.ts,
            channel = %root.channel_id,
            "posted root notification"
        );
        report.actions.push(DispatchAction::Bootstrapped);
        Ok((metadata, root))
    }

    async fn reply_to_comment(
        &self,
        event: &CommentEvent,
        metadata: &Metadata,
        root: &NotificationHandle,
        start_body: &str,
        report: &mut DispatchReport,
    ) -> Result<()> {
        let comment_id = event.comment.id;
        if metadata.comment_notification(comment_id).is_some() {
            tracing::info!(comment_id, "comment already notified; ignoring");
            report.actions.push(DispatchAction::AlreadyNotified);
            return Ok(());
        }

        let comment = self
            .tracker
            .fetch_comment(&event.target, event.comment.kind, comment_id)
            .await
            .with_context(|| format!("failed to fetch comment {comment_id}"))?;
        let link_target = TargetRef {
            html_url: comment
                .html_url
                .clone()
                .or_else(|| event.comment.html_url.clone())
                .unwrap_or_else(|| event.target.html_url.clone()),
            ..event.target.clone()
        };
        let message = compose_message(
            &comment.author,
            &link_target,
            AccentColor::Gray,
            &strip_metadata_block(&comment.body),
            &self.config.users,
        );
        let posted = self
            .chat
            .post_message(&root.channel_id, &message, Some(root.ts.as_str()))
            .await
            .with_context(|| format!("failed to post reply for comment {comment_id}"))?;
        let handle = NotificationHandle::new(posted.ts.clone(), posted.channel.clone());
        report.posted.push(posted);

        report.uploaded_files += self.attach_images(&comment.body_html, root).await?;

        let updated = add_comment_notification(metadata, comment_id, handle);
        self.store.save(&event.target, start_body, &updated).await?;
        tracing::info!(comment_id, root_ts = %root.ts, "posted comment reply");
        report.actions.push(DispatchAction::Replied);
        Ok(())
    }

    async fn post_status(
        &self,
        context: &EventContext,
        root: &NotificationHandle,
        outcome: StatusOutcome,
        report: &mut DispatchReport,
    ) -> Result<()> {
        let message =
            compose_status_message(&context.actor, &context.target, outcome, &self.config.users);
        let posted = self
            .chat
            .post_message(&root.channel_id, &message, Some(root.ts.as_str()))
            .await
            .with_context(|| format!("failed to post status for #{}", context.target.number))?;
        tracing::info!(number = context.target.number, ?outcome, "posted status update");
        report.posted.push(posted);
        report.actions.push(DispatchAction::StatusPosted);
        Ok(())
    }

    async fn attach_images(&self, body_html: &str, root: &NotificationHandle) -> Result<usize> {
        if self.config.skip_images {
            return Ok(0);
        }
        let urls = extract_img_srcs(body_html, self.config.image_host_prefix.as_deref());
        if urls.is_empty() {
            return Ok(0);
        }
        let images = fetch_images(self.tracker.as_ref(), &urls).await?;
        let file_ids = upload_images(self.chat.as_ref(), &images, &root.channel_id, &root.ts).await?;
        Ok(file_ids.len())
    }
}
