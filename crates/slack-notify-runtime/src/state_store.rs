//! Issue-body backed persistence for notification metadata.

use std::sync::Arc;

use anyhow::{Context, Result};
use slack_notify_core::event::TargetRef;
use slack_notify_core::metadata::{embed_metadata, parse_metadata, Metadata};
use slack_notify_core::transport::{IssueTracker, TargetDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    /// Live document as read at the start of the run.
    pub document: TargetDocument,
    pub metadata: Option<Metadata>,
}

#[derive(Clone)]
pub struct NotificationStateStore {
    tracker: Arc<dyn IssueTracker>,
}

impl NotificationStateStore {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }

    /// Reads the target fresh from GitHub and decodes its metadata block, if any.
    pub async fn load(&self, target: &TargetRef) -> Result<LoadedState> {
        let document = self.tracker.fetch_target(target).await.with_context(|| {
            format!(
                "failed to load {} #{} from {}",
                target.kind.label(),
                target.number,
                target.repo.as_slug()
            )
        })?;
        let metadata = parse_metadata(&document.body);
        tracing::debug!(
            repo = %target.repo.as_slug(),
            number = target.number,
            has_metadata = metadata.is_some(),
            "loaded notification state"
        );
        Ok(LoadedState { document, metadata })
    }

    /// Embeds `metadata` into `body` and writes the result back.
    ///
    /// `body` is the caller's snapshot; edits made remotely since that read are overwritten.
    pub async fn save(&self, target: &TargetRef, body: &str, metadata: &Metadata) -> Result<()> {
        let updated = embed_metadata(body, metadata);
        self.tracker
            .update_target_body(target, &updated)
            .await
            .with_context(|| {
                format!(
                    "failed to save notification state on {} #{}",
                    target.kind.label(),
                    target.number
                )
            })?;
        tracing::debug!(
            number = target.number,
            comment_notifications = metadata.comment_notifications.len(),
            "saved notification state"
        );
        Ok(())
    }
}
