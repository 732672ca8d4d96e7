//! Retry and truncation helpers shared by the GitHub and Slack HTTP clients.

use std::time::Duration;

const RETRY_DELAY_CAP_MS: u64 = 30_000;

/// Header sent on every outbound request so mocks and proxies can tell attempts apart.
pub const RETRY_ATTEMPT_HEADER: &str = "x-slack-notify-retry-attempt";

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(RETRY_DELAY_CAP_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Rate limits and server-side failures are the only statuses worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    truncate_with_ellipsis(text, max_chars, "...")
}

/// Truncates mrkdwn for a single Slack text object, keeping the result within `max_chars`.
pub fn truncate_for_slack(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    truncate_with_ellipsis(text, keep, "…")
}

fn truncate_with_ellipsis(text: &str, max_chars: usize, ellipsis: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str(ellipsis);
    truncated
}
