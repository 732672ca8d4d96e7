//! Channel-agnostic message composition: actor header, rendered body, colored accent.

use serde_json::{json, Value};

use crate::event::{Actor, TargetKind, TargetRef};
use crate::markdown::{escape_mrkdwn, render_markdown_to_mrkdwn};
use crate::mentions::UserDirectory;
use crate::transport_helpers::truncate_for_slack;

pub const EMPTY_BODY_PLACEHOLDER: &str = "_(empty)_";
/// Slack rejects section text objects longer than this.
const SECTION_TEXT_MAX_CHARS: usize = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Side accent carrying the semantic state of a message.
pub enum AccentColor {
    /// Opened / new.
    Green,
    /// Closed or neutral update.
    Gray,
    /// Merged.
    Purple,
}

impl AccentColor {
    pub fn hex(self) -> &'static str {
        match self {
            Self::Green => "#1a7f37",
            Self::Gray => "#6e7781",
            Self::Purple => "#8250df",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Closed,
    Merged,
}

impl StatusOutcome {
    pub fn accent(self) -> AccentColor {
        match self {
            Self::Closed => AccentColor::Gray,
            Self::Merged => AccentColor::Purple,
        }
    }

    pub fn markdown(self, kind: TargetKind) -> String {
        match self {
            Self::Closed => format!("**Closed** this {}.", kind.label()),
            Self::Merged => format!("**Merged** this {}.", kind.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMessage {
    pub header_blocks: Vec<Value>,
    pub body_blocks: Vec<Value>,
    pub accent: AccentColor,
    /// Plain summary for notifications and clients that cannot render blocks.
    pub fallback_text: String,
}

impl ComposedMessage {
    /// The mrkdwn text of the first body section, if any.
    pub fn body_text(&self) -> Option<&str> {
        self.body_blocks
            .first()
            .and_then(|block| block["text"]["text"].as_str())
    }
}

pub fn compose_message(
    actor: &Actor,
    target: &TargetRef,
    accent: AccentColor,
    body_markdown: &str,
    users: &UserDirectory,
) -> ComposedMessage {
    let rendered = render_markdown_to_mrkdwn(body_markdown, users);
    let body_text = if rendered.trim().is_empty() {
        EMPTY_BODY_PLACEHOLDER.to_string()
    } else {
        truncate_for_slack(&rendered, SECTION_TEXT_MAX_CHARS)
    };

    ComposedMessage {
        header_blocks: vec![header_block(actor, target)],
        body_blocks: vec![json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": body_text },
        })],
        accent,
        fallback_text: format!(
            "{} on {}#{}: {}",
            actor.login,
            target.repo.as_slug(),
            target.number,
            escape_mrkdwn(&target.title)
        ),
    }
}

pub fn compose_status_message(
    actor: &Actor,
    target: &TargetRef,
    outcome: StatusOutcome,
    users: &UserDirectory,
) -> ComposedMessage {
    compose_message(
        actor,
        target,
        outcome.accent(),
        &outcome.markdown(target.kind),
        users,
    )
}

fn header_block(actor: &Actor, target: &TargetRef) -> Value {
    let mut elements = Vec::new();
    if let Some(avatar_url) = actor
        .avatar_url
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        elements.push(json!({
            "type": "image",
            "image_url": avatar_url,
            "alt_text": actor.login,
        }));
    }
    elements.push(json!({
        "type": "mrkdwn",
        "text": format!(
            "*<{}|{}>*  <{}|#{} {}>",
            actor.profile_url(),
            escape_mrkdwn(&actor.login),
            target.html_url,
            target.number,
            escape_mrkdwn(&target.title)
        ),
    }));
    json!({ "type": "context", "elements": elements })
}
