//! Image URL extraction from rendered issue/comment HTML.

use std::sync::OnceLock;

use regex::Regex;

/// Host prefix GitHub uses for signed, private user attachments.
pub const PRIVATE_IMAGE_HOST_PREFIX: &str = "https://private-user-images.githubusercontent.com/";

fn img_src_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r#"(?is)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))[^>]*>"#,
        )
        .expect("img src regex is valid")
    })
}

/// Returns the `src` of every `<img>` element in document order, duplicates included.
///
/// With `host_prefix` set, only sources starting with that prefix are kept.
/// Malformed markup yields whatever could be matched; this never fails.
pub fn extract_img_srcs(html: &str, host_prefix: Option<&str>) -> Vec<String> {
    img_src_regex()
        .captures_iter(html)
        .filter_map(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .or_else(|| captures.get(3))
        })
        .map(|src| decode_attribute_entities(src.as_str().trim()))
        .filter(|src| !src.is_empty())
        .filter(|src| host_prefix.map_or(true, |prefix| src.starts_with(prefix)))
        .collect()
}

fn decode_attribute_entities(raw: &str) -> String {
    raw.replace("&amp;", "&").replace("&#38;", "&")
}
