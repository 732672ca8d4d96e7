//! Notification metadata embedded as a hidden comment block inside issue/PR bodies.
//!
//! The block is the only persistent state the notifier owns:
//!
//! ```text
//! <!-- customizable-slack-notify
//! {
//!   "version": "0.0.1",
//!   "issue_notification": { "ts": "...", "channel_id": "..." },
//!   "comment_notifications": {}
//! }
//! -->
//! ```
//!
//! Bodies are user-editable, so parsing treats anything unreadable as "no metadata".

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const METADATA_MARKER: &str = "customizable-slack-notify";
pub const METADATA_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Handle of a posted Slack message, used as a thread anchor.
pub struct NotificationHandle {
    pub ts: String,
    pub channel_id: String,
}

impl NotificationHandle {
    pub fn new(ts: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_notification: Option<NotificationHandle>,
    #[serde(default)]
    pub comment_notifications: BTreeMap<String, NotificationHandle>,
}

impl Metadata {
    /// Fresh record for an issue/PR whose root message was just posted.
    pub fn new_root(handle: NotificationHandle) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            issue_notification: Some(handle),
            comment_notifications: BTreeMap::new(),
        }
    }

    pub fn comment_notification(&self, comment_id: u64) -> Option<&NotificationHandle> {
        self.comment_notifications.get(&comment_id.to_string())
    }
}

fn metadata_marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(&format!(r"<!--\s*{}", regex::escape(METADATA_MARKER)))
            .expect("metadata marker regex is valid")
    })
}

struct MetadataBlock<'a> {
    span: Range<usize>,
    payload: &'a str,
}

/// Locates the first delimited block: a marker followed by `-->` with no other comment
/// opener in between. A stray unclosed marker never swallows a later block.
fn find_metadata_block(raw_body: &str) -> Option<MetadataBlock<'_>> {
    for marker in metadata_marker_regex().find_iter(raw_body) {
        let rest = &raw_body[marker.end()..];
        let close = rest.find("-->")?;
        let payload = &rest[..close];
        if payload.contains("<!--") {
            continue;
        }
        return Some(MetadataBlock {
            span: marker.start()..marker.end() + close + "-->".len(),
            payload: payload.trim(),
        });
    }
    None
}

fn replace_span(raw_body: &str, span: Range<usize>, replacement: &str) -> String {
    let mut replaced = String::with_capacity(raw_body.len() + replacement.len());
    replaced.push_str(&raw_body[..span.start]);
    replaced.push_str(replacement);
    replaced.push_str(&raw_body[span.end..]);
    replaced
}

fn render_metadata_block(metadata: &Metadata) -> String {
    // Serializing plain strings and maps cannot fail; fall back to compact output just in case.
    let json = serde_json::to_string_pretty(metadata)
        .or_else(|_| serde_json::to_string(metadata))
        .unwrap_or_default();
    format!("<!-- {METADATA_MARKER}\n{json}\n-->")
}

/// Reads the first metadata block from `raw_body`.
///
/// Returns `None` when no block exists or its payload is not a valid record.
pub fn parse_metadata(raw_body: &str) -> Option<Metadata> {
    let block = find_metadata_block(raw_body)?;
    match serde_json::from_str::<Metadata>(block.payload) {
        Ok(metadata) => Some(metadata),
        Err(error) => {
            tracing::warn!(%error, "failed to parse notification metadata block; treating as absent");
            None
        }
    }
}

/// Writes `metadata` into `raw_body`, replacing the first existing block or appending a new one.
pub fn embed_metadata(raw_body: &str, metadata: &Metadata) -> String {
    let rendered = render_metadata_block(metadata);
    match find_metadata_block(raw_body) {
        Some(block) => replace_span(raw_body, block.span, &rendered),
        None => format!("{raw_body}\n\n{rendered}"),
    }
}

pub fn add_comment_notification(
    metadata: &Metadata,
    comment_id: u64,
    notification: NotificationHandle,
) -> Metadata {
    let mut updated = metadata.clone();
    updated
        .comment_notifications
        .insert(comment_id.to_string(), notification);
    updated
}

/// Removes the first metadata block so it never reaches rendered Slack text.
pub fn strip_metadata_block(raw_body: &str) -> String {
    match find_metadata_block(raw_body) {
        Some(block) => replace_span(raw_body, block.span, "").trim_end().to_string(),
        None => raw_body.trim_end().to_string(),
    }
}
