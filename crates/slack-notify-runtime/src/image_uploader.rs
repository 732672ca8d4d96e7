//! Fetches embedded images and binds them to a Slack thread through the external upload flow.

use anyhow::{Context, Result};
use slack_notify_core::transport::{ChatTransport, IssueTracker};

const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// Downloads each URL in order; the first failure aborts the batch.
pub async fn fetch_images(tracker: &dyn IssueTracker, urls: &[String]) -> Result<Vec<FetchedImage>> {
    let mut images = Vec::with_capacity(urls.len());
    for url in urls {
        let bytes = tracker
            .fetch_image(url)
            .await
            .with_context(|| format!("failed to download image {url}"))?;
        images.push(FetchedImage {
            url: url.clone(),
            bytes,
        });
    }
    Ok(images)
}

/// `image-{index}.{ext}` with the extension taken from the URL path.
pub fn upload_filename(index: usize, url: &str) -> String {
    format!("image-{index}.{}", url_path_extension(url))
}

fn url_path_extension(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    last_segment
        .rsplit_once('.')
        .map(|(_, extension)| extension)
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= 5
                && extension.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Uploads `images` in order and completes them as one batch in `channel`/`thread_ts`.
///
/// Zero-byte images are skipped. Completion runs only after every upload succeeded; files
/// uploaded before a failure are left uncompleted.
pub async fn upload_images(
    chat: &dyn ChatTransport,
    images: &[FetchedImage],
    channel: &str,
    thread_ts: &str,
) -> Result<Vec<String>> {
    let mut file_ids = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        if image.bytes.is_empty() {
            tracing::warn!(url = %image.url, "skipping empty image");
            continue;
        }
        let filename = upload_filename(index + 1, &image.url);
        let target = chat
            .request_upload(&filename, image.bytes.len())
            .await
            .with_context(|| format!("failed to request upload for {}", image.url))?;
        chat.send_upload(&target, &image.bytes)
            .await
            .with_context(|| format!("failed to upload {}", image.url))?;
        tracing::debug!(file_id = %target.file_id, %filename, "uploaded image");
        file_ids.push(target.file_id);
    }

    if file_ids.is_empty() {
        return Ok(file_ids);
    }
    chat.complete_upload(&file_ids, channel, thread_ts)
        .await
        .context("failed to complete image upload batch")?;
    tracing::info!(files = file_ids.len(), thread_ts, "attached images to thread");
    Ok(file_ids)
}
