//! GitHub-flavoured markdown to Slack mrkdwn conversion.
//!
//! Covers the subset that shows up in issue traffic: headings, emphasis, strikethrough,
//! links, bullet lists and fenced code. Anything else passes through escaped.

use std::sync::OnceLock;

use regex::Regex;

use crate::mentions::UserDirectory;

pub const IMAGE_PLACEHOLDER: &str = "[image]";

const BOLD_SENTINEL: char = '\u{1}';

struct MarkdownPatterns {
    html_comment: Regex,
    img_tag: Regex,
    markdown_image: Regex,
    heading: Regex,
    bullet: Regex,
    bold: Regex,
    italic: Regex,
    strike: Regex,
    link: Regex,
}

fn patterns() -> &'static MarkdownPatterns {
    static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MarkdownPatterns {
        html_comment: Regex::new(r"(?s)<!--.*?-->").expect("html comment regex is valid"),
        img_tag: Regex::new(r"(?is)<img\b[^>]*>").expect("img tag regex is valid"),
        markdown_image: Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("markdown image regex is valid"),
        heading: Regex::new(r"^#{1,6}\s+(.+?)\s*#*\s*$").expect("heading regex is valid"),
        bullet: Regex::new(r"^(\s*)[-*+]\s+").expect("bullet regex is valid"),
        bold: Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").expect("bold regex is valid"),
        italic: Regex::new(r"\*([^*\s][^*\n]*?)\*").expect("italic regex is valid"),
        strike: Regex::new(r"~~([^~\n]+?)~~").expect("strike regex is valid"),
        link: Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("link regex is valid"),
    })
}

/// Escapes the three characters Slack treats as control sequences in mrkdwn.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Replaces raw `<img>` tags and markdown images with `placeholder`.
pub fn replace_img_tags(text: &str, placeholder: &str) -> String {
    let patterns = patterns();
    let replaced = patterns.img_tag.replace_all(text, regex::NoExpand(placeholder));
    patterns
        .markdown_image
        .replace_all(&replaced, regex::NoExpand(placeholder))
        .into_owned()
}

/// Converts a markdown body into Slack mrkdwn, translating mapped `@mentions`.
pub fn render_markdown_to_mrkdwn(markdown: &str, users: &UserDirectory) -> String {
    let patterns = patterns();
    let without_comments = patterns.html_comment.replace_all(markdown, "");
    let without_images = replace_img_tags(&without_comments, IMAGE_PLACEHOLDER);

    let mut lines = Vec::new();
    let mut in_fence = false;
    for line in without_images.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            lines.push("```".to_string());
            continue;
        }
        if in_fence {
            lines.push(escape_mrkdwn(line));
            continue;
        }
        lines.push(render_inline_line(line, users));
    }
    if in_fence {
        lines.push("```".to_string());
    }
    lines.join("\n").trim().to_string()
}

fn render_inline_line(line: &str, users: &UserDirectory) -> String {
    let patterns = patterns();
    let escaped = escape_mrkdwn(line.trim_end());

    if let Some(captures) = patterns.heading.captures(&escaped) {
        let title = captures.get(1).map_or("", |m| m.as_str());
        return users.translate_mentions(&format!("*{title}*"));
    }

    let bulleted = patterns.bullet.replace(&escaped, "${1}• ");
    let bolded = patterns.bold.replace_all(&bulleted, |captures: &regex::Captures<'_>| {
        let inner = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map_or("", |m| m.as_str());
        format!("{BOLD_SENTINEL}{inner}{BOLD_SENTINEL}")
    });
    let italic = patterns.italic.replace_all(&bolded, "_${1}_");
    let struck = patterns.strike.replace_all(&italic, "~${1}~");
    let linked = patterns.link.replace_all(&struck, "<${2}|${1}>");
    let rendered = linked.replace(BOLD_SENTINEL, "*");
    users.translate_mentions(&rendered)
}
