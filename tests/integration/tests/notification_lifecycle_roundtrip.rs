use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{json, Value};
use slack_notify_core::event::{classify_event, EventParseOutcome};
use slack_notify_core::mentions::UserDirectory;
use slack_notify_core::metadata::{
    add_comment_notification, embed_metadata, parse_metadata, Metadata, NotificationHandle,
};
use slack_notify_github::GithubApiClient;
use slack_notify_runtime::{DispatchAction, DispatcherConfig, NotificationDispatcher};
use slack_notify_slack::SlackApiClient;

fn build_dispatcher(github: &MockServer, slack: &MockServer) -> NotificationDispatcher {
    let github_client = GithubApiClient::new(github.base_url(), "ghp-test".to_string(), 2_000, 2, 1)
        .expect("github client");
    let slack_client = SlackApiClient::new(slack.base_url(), "xoxb-test".to_string(), 2_000, 2, 1)
        .expect("slack client");
    let users = UserDirectory::from_toml_str(
        r#"
[[users]]
github = "alice"
slack = "U0ALICE"
"#,
    )
    .expect("users");
    NotificationDispatcher::new(
        Arc::new(github_client),
        Arc::new(slack_client),
        DispatcherConfig {
            channel: "#eng-alerts".to_string(),
            image_host_prefix: Some(github.url("/private/")),
            skip_images: false,
            users,
        },
    )
}

fn repository() -> Value {
    json!({ "name": "repo", "owner": { "login": "owner" } })
}

fn issue_payload(action: &str) -> Value {
    json!({
        "action": action,
        "repository": repository(),
        "sender": { "login": "alice", "avatar_url": "https://avatars.example/alice" },
        "issue": {
            "number": 42,
            "title": "Crash on start",
            "html_url": "https://github.com/owner/repo/issues/42",
            "body": "payload body",
            "user": { "login": "alice" }
        }
    })
}

fn classify(event_name: &str, payload: &Value) -> EventParseOutcome {
    classify_event(event_name, payload, None).expect("classify")
}

#[tokio::test]
async fn integration_issue_opened_posts_root_uploads_private_image_and_persists_metadata() {
    let github = MockServer::start();
    let slack = MockServer::start();
    let image_url = github.url("/private/123/shot.png?jwt=abc");

    let get_issue = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/owner/repo/issues/42")
            .header("accept", "application/vnd.github.full+json");
        then.status(200).json_body(json!({
            "number": 42,
            "title": "Crash on start",
            "html_url": "https://github.com/owner/repo/issues/42",
            "body": "Steps from @alice\n\n<img src=\"https://example.com/x.png\">",
            "body_html": format!(
                "<p>Steps from @alice</p><p><img src=\"{}\"><img src=\"https://public.example/logo.png\"></p>",
                image_url.replace('&', "&amp;")
            ),
            "user": { "login": "alice", "avatar_url": "https://avatars.example/alice" }
        }));
    });
    let get_image = github.mock(|when, then| {
        when.method(GET).path("/private/123/shot.png");
        then.status(200).body([1_u8, 2, 3, 4]);
    });
    let patch_issue = github.mock(|when, then| {
        when.method(PATCH)
            .path("/repos/owner/repo/issues/42")
            .body_includes("customizable-slack-notify")
            .body_includes("1700000000.000100")
            .body_includes("CSLACK1");
        then.status(200).json_body(json!({ "number": 42 }));
    });

    let post = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#eng-alerts\"")
            .body_includes("#1a7f37")
            .body_includes("<@U0ALICE>")
            .body_includes("[image]");
        then.status(200).json_body(json!({
            "ok": true,
            "channel": "CSLACK1",
            "ts": "1700000000.000100"
        }));
    });
    let upload_url = slack.mock(|when, then| {
        when.method(POST)
            .path("/files.getUploadURLExternal")
            .body_includes("filename=image-1.png")
            .body_includes("length=4");
        then.status(200).json_body(json!({
            "ok": true,
            "upload_url": slack.url("/upload/F1"),
            "file_id": "F1"
        }));
    });
    let upload = slack.mock(|when, then| {
        when.method(POST).path("/upload/F1");
        then.status(200).body("OK");
    });
    let complete = slack.mock(|when, then| {
        when.method(POST)
            .path("/files.completeUploadExternal")
            .body_includes("channel_id=CSLACK1")
            .body_includes("thread_ts=1700000000.000100");
        then.status(200).json_body(json!({ "ok": true }));
    });

    let report = build_dispatcher(&github, &slack)
        .handle(classify("issues", &issue_payload("opened")))
        .await
        .expect("dispatch");

    assert_eq!(report.actions, vec![DispatchAction::Bootstrapped]);
    assert_eq!(report.uploaded_files, 1);
    get_issue.assert_calls(1);
    get_image.assert_calls(1);
    post.assert_calls(1);
    upload_url.assert_calls(1);
    upload.assert_calls(1);
    complete.assert_calls(1);
    patch_issue.assert_calls(1);
}

#[tokio::test]
async fn integration_comment_replies_in_thread_and_records_comment_handle() {
    let github = MockServer::start();
    let slack = MockServer::start();
    let prior = Metadata::new_root(NotificationHandle::new("1700000000.000100", "CSLACK1"));
    let body = embed_metadata("Steps to reproduce", &prior);
    let expected = add_comment_notification(
        &prior,
        555,
        NotificationHandle::new("1700000000.000200", "CSLACK1"),
    );
    let expected_body = embed_metadata(&body, &expected);

    github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/42");
        then.status(200).json_body(json!({
            "number": 42,
            "title": "Crash on start",
            "html_url": "https://github.com/owner/repo/issues/42",
            "body": body,
            "body_html": "<p>Steps to reproduce</p>",
            "user": { "login": "alice" }
        }));
    });
    let get_comment = github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/comments/555");
        then.status(200).json_body(json!({
            "id": 555,
            "body": "Same here, **every** time",
            "body_html": "<p>Same here, <strong>every</strong> time</p>",
            "html_url": "https://github.com/owner/repo/issues/42#issuecomment-555",
            "user": { "login": "bob" }
        }));
    });
    let patch_issue = github.mock(|when, then| {
        when.method(PATCH)
            .path("/repos/owner/repo/issues/42")
            .json_body(json!({ "body": expected_body }));
        then.status(200).json_body(json!({ "number": 42 }));
    });
    let post = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"CSLACK1\"")
            .body_includes("\"thread_ts\":\"1700000000.000100\"")
            .body_includes("#6e7781")
            .body_includes("Same here, *every* time");
        then.status(200).json_body(json!({
            "ok": true,
            "channel": "CSLACK1",
            "ts": "1700000000.000200"
        }));
    });

    let payload = json!({
        "action": "created",
        "repository": repository(),
        "issue": issue_payload("created")["issue"].clone(),
        "comment": {
            "id": 555,
            "body": "Same here, **every** time",
            "html_url": "https://github.com/owner/repo/issues/42#issuecomment-555",
            "user": { "login": "bob" }
        }
    });
    let report = build_dispatcher(&github, &slack)
        .handle(classify("issue_comment", &payload))
        .await
        .expect("dispatch");

    assert_eq!(report.actions, vec![DispatchAction::Replied]);
    assert_eq!(report.uploaded_files, 0);
    get_comment.assert_calls(1);
    post.assert_calls(1);
    patch_issue.assert_calls(1);
    assert_eq!(parse_metadata(&expected_body), Some(expected));
}

#[tokio::test]
async fn integration_merged_pull_request_posts_purple_status_without_saving() {
    let github = MockServer::start();
    let slack = MockServer::start();
    let prior = Metadata::new_root(NotificationHandle::new("1700000000.000100", "CSLACK1"));

    github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/7");
        then.status(200).json_body(json!({
            "number": 7,
            "title": "Fix crash",
            "html_url": "https://github.com/owner/repo/pull/7",
            "body": embed_metadata("Fixes #42", &prior),
            "body_html": "<p>Fixes #42</p>",
            "user": { "login": "alice" }
        }));
    });
    let patch = github.mock(|when, then| {
        when.method(PATCH).path("/repos/owner/repo/pulls/7");
        then.status(200).json_body(json!({}));
    });
    let post = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"thread_ts\":\"1700000000.000100\"")
            .body_includes("#8250df")
            .body_includes("*Merged* this pull request.");
        then.status(200).json_body(json!({
            "ok": true,
            "channel": "CSLACK1",
            "ts": "1700000000.000300"
        }));
    });

    let payload = json!({
        "action": "closed",
        "repository": repository(),
        "sender": { "login": "maintainer" },
        "pull_request": {
            "number": 7,
            "title": "Fix crash",
            "html_url": "https://github.com/owner/repo/pull/7",
            "body": "Fixes #42",
            "merged": true,
            "user": { "login": "alice" }
        }
    });
    let report = build_dispatcher(&github, &slack)
        .handle(classify("pull_request", &payload))
        .await
        .expect("dispatch");

    assert_eq!(report.actions, vec![DispatchAction::StatusPosted]);
    post.assert_calls(1);
    patch.assert_calls(0);
}

#[tokio::test]
async fn regression_slack_failure_leaves_issue_body_untouched() {
    let github = MockServer::start();
    let slack = MockServer::start();

    github.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/42");
        then.status(200).json_body(json!({
            "number": 42,
            "title": "Crash on start",
            "html_url": "https://github.com/owner/repo/issues/42",
            "body": "no state yet",
            "user": { "login": "alice" }
        }));
    });
    let patch = github.mock(|when, then| {
        when.method(PATCH).path("/repos/owner/repo/issues/42");
        then.status(200).json_body(json!({}));
    });
    slack.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({ "ok": false, "error": "not_in_channel" }));
    });

    let error = build_dispatcher(&github, &slack)
        .handle(classify("issues", &issue_payload("opened")))
        .await
        .expect_err("slack failure");

    assert!(format!("{error:#}").contains("not_in_channel"));
    patch.assert_calls(0);
}
