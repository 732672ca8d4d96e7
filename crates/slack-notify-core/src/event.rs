//! Inbound GitHub webhook events and their classification into [`NotifyEvent`] variants.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid --github-repo '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid --github-repo '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Issue,
    PullRequest,
}

impl TargetKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Issue or pull request a notification is about.
pub struct TargetRef {
    pub kind: TargetKind,
    pub repo: RepoRef,
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Actor {
    pub fn profile_url(&self) -> String {
        self.html_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}", self.login))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// Conversation comment on an issue or pull request.
    Issue,
    /// Line comment left in a pull request review.
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    pub id: u64,
    pub kind: CommentKind,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub actor: Actor,
    pub target: TargetRef,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEvent {
    pub actor: Actor,
    pub target: TargetRef,
    pub comment: CommentRef,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates the webhook triggers the notifier reacts to.
pub enum NotifyEvent {
    IssueOpened(EventContext),
    IssueClosed(EventContext),
    PullRequestOpened(EventContext),
    PullRequestClosed(EventContext),
    PullRequestMerged(EventContext),
    IssueCommentCreated(CommentEvent),
    PullRequestReviewCommentCreated(CommentEvent),
}

impl NotifyEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssueOpened(_) => "issue_opened",
            Self::IssueClosed(_) => "issue_closed",
            Self::PullRequestOpened(_) => "pull_request_opened",
            Self::PullRequestClosed(_) => "pull_request_closed",
            Self::PullRequestMerged(_) => "pull_request_merged",
            Self::IssueCommentCreated(_) => "issue_comment_created",
            Self::PullRequestReviewCommentCreated(_) => "pull_request_review_comment_created",
        }
    }

    pub fn target(&self) -> &TargetRef {
        match self {
            Self::IssueOpened(context)
            | Self::IssueClosed(context)
            | Self::PullRequestOpened(context)
            | Self::PullRequestClosed(context)
            | Self::PullRequestMerged(context) => &context.target,
            Self::IssueCommentCreated(comment) | Self::PullRequestReviewCommentCreated(comment) => {
                &comment.target
            }
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            Self::IssueOpened(context)
            | Self::IssueClosed(context)
            | Self::PullRequestOpened(context)
            | Self::PullRequestClosed(context)
            | Self::PullRequestMerged(context) => &context.actor,
            Self::IssueCommentCreated(comment) | Self::PullRequestReviewCommentCreated(comment) => {
                &comment.actor
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventParseOutcome {
    Event(NotifyEvent),
    /// The payload is valid but carries nothing to notify; the reason is logged.
    Skip(String),
}

#[derive(Debug, Error)]
pub enum EventPayloadError {
    #[error("failed to decode webhook payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("webhook payload has no repository and no fallback repository was configured")]
    MissingRepository,
}

#[derive(Debug, Deserialize)]
struct PayloadOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    name: String,
    owner: PayloadOwner,
}

#[derive(Debug, Deserialize)]
struct PayloadIssue {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    user: Actor,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PayloadPullRequest {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    user: Actor,
    #[serde(default)]
    merged: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PayloadComment {
    id: u64,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    body: Option<String>,
    user: Actor,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    sender: Option<Actor>,
    #[serde(default)]
    repository: Option<PayloadRepository>,
    #[serde(default)]
    issue: Option<PayloadIssue>,
    #[serde(default)]
    pull_request: Option<PayloadPullRequest>,
    #[serde(default)]
    comment: Option<PayloadComment>,
}

/// Maps a GitHub event name plus its webhook payload onto a [`NotifyEvent`].
///
/// `fallback_repo` is used when the payload omits `repository`.
pub fn classify_event(
    event_name: &str,
    payload: &Value,
    fallback_repo: Option<&RepoRef>,
) -> Result<EventParseOutcome, EventPayloadError> {
    let payload = WebhookPayload::deserialize(payload)?;
    let repo = match (&payload.repository, fallback_repo) {
        (Some(repository), _) => RepoRef {
            owner: repository.owner.login.clone(),
            name: repository.name.clone(),
        },
        (None, Some(repo)) => repo.clone(),
        (None, None) => return Err(EventPayloadError::MissingRepository),
    };
    let action = payload.action.as_deref().unwrap_or_default();

    let outcome = match event_name.trim() {
        "issues" => classify_issue_event(action, &payload, repo),
        "issue_comment" => classify_issue_comment_event(action, &payload, repo),
        "pull_request" | "pull_request_target" => {
            classify_pull_request_event(action, &payload, repo)
        }
        "pull_request_review_comment" => classify_review_comment_event(action, &payload, repo),
        other => skip(format!("unsupported event '{other}'")),
    };
    Ok(outcome)
}

fn skip(reason: impl Into<String>) -> EventParseOutcome {
    EventParseOutcome::Skip(reason.into())
}

fn issue_target(issue: &PayloadIssue, repo: RepoRef) -> TargetRef {
    let kind = if issue.pull_request.is_some() {
        TargetKind::PullRequest
    } else {
        TargetKind::Issue
    };
    TargetRef {
        kind,
        repo,
        number: issue.number,
        title: issue.title.clone(),
        html_url: issue.html_url.clone(),
    }
}

fn pull_request_target(pull_request: &PayloadPullRequest, repo: RepoRef) -> TargetRef {
    TargetRef {
        kind: TargetKind::PullRequest,
        repo,
        number: pull_request.number,
        title: pull_request.title.clone(),
        html_url: pull_request.html_url.clone(),
    }
}

fn classify_issue_event(action: &str, payload: &WebhookPayload, repo: RepoRef) -> EventParseOutcome {
    let Some(issue) = payload.issue.as_ref() else {
        return skip("issues event does not contain an issue");
    };
    let context = EventContext {
        actor: payload.sender.clone().unwrap_or_else(|| issue.user.clone()),
        target: issue_target(issue, repo),
        body: issue.body.clone(),
    };
    match action {
        "opened" => EventParseOutcome::Event(NotifyEvent::IssueOpened(context)),
        "closed" => EventParseOutcome::Event(NotifyEvent::IssueClosed(context)),
        other => skip(format!("unsupported issues action '{other}'")),
    }
}

fn classify_pull_request_event(
    action: &str,
    payload: &WebhookPayload,
    repo: RepoRef,
) -> EventParseOutcome {
    let Some(pull_request) = payload.pull_request.as_ref() else {
        return skip("pull_request event does not contain a pull request");
    };
    let context = EventContext {
        actor: payload
            .sender
            .clone()
            .unwrap_or_else(|| pull_request.user.clone()),
        target: pull_request_target(pull_request, repo),
        body: pull_request.body.clone(),
    };
    match action {
        "opened" => EventParseOutcome::Event(NotifyEvent::PullRequestOpened(context)),
        "closed" if pull_request.merged.unwrap_or(false) => {
            EventParseOutcome::Event(NotifyEvent::PullRequestMerged(context))
        }
        "closed" => EventParseOutcome::Event(NotifyEvent::PullRequestClosed(context)),
        other => skip(format!("unsupported pull_request action '{other}'")),
    }
}

fn comment_event(
    comment: &PayloadComment,
    kind: CommentKind,
    target: TargetRef,
) -> Option<CommentEvent> {
    let body = comment.body.clone()?;
    Some(CommentEvent {
        actor: comment.user.clone(),
        target,
        comment: CommentRef {
            id: comment.id,
            kind,
            html_url: comment.html_url.clone(),
        },
        body,
    })
}

fn classify_issue_comment_event(
    action: &str,
    payload: &WebhookPayload,
    repo: RepoRef,
) -> EventParseOutcome {
    if action != "created" {
        return skip(format!("unsupported issue_comment action '{action}'"));
    }
    let Some(comment) = payload.comment.as_ref() else {
        return skip("This event does not contain a comment.");
    };
    let Some(issue) = payload.issue.as_ref() else {
        return skip("issue_comment event does not contain an issue");
    };
    match comment_event(comment, CommentKind::Issue, issue_target(issue, repo)) {
        Some(event) => EventParseOutcome::Event(NotifyEvent::IssueCommentCreated(event)),
        None => skip(format!("comment {} has no body", comment.id)),
    }
}

fn classify_review_comment_event(
    action: &str,
    payload: &WebhookPayload,
    repo: RepoRef,
) -> EventParseOutcome {
    if action != "created" {
        return skip(format!(
            "unsupported pull_request_review_comment action '{action}'"
        ));
    }
    let Some(comment) = payload.comment.as_ref() else {
        return skip("This event does not contain a comment.");
    };
    let Some(pull_request) = payload.pull_request.as_ref() else {
        return skip("pull_request_review_comment event does not contain a pull request");
    };
    let target = pull_request_target(pull_request, repo);
    match comment_event(comment, CommentKind::Review, target) {
        Some(event) => EventParseOutcome::Event(NotifyEvent::PullRequestReviewCommentCreated(event)),
        None => skip(format!("review comment {} has no body", comment.id)),
    }
}
