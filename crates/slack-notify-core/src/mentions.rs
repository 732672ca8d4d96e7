//! GitHub login to Slack member translation for `@mentions` in rendered bodies.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsersConfigError {
    #[error("invalid users config: {0}")]
    Parse(String),
    #[error("invalid users config: entry {index} has an empty `{field}`")]
    EmptyField { index: usize, field: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
struct UsersConfigFile {
    users: Vec<UserMapping>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserMapping {
    github: String,
    slack: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Explicit mapping from GitHub logins to Slack member ids.
pub struct UserDirectory {
    by_github_login: HashMap<String, String>,
}

impl UserDirectory {
    /// Parses a TOML document of the form `[[users]] github = "..." slack = "..."`.
    pub fn from_toml_str(raw: &str) -> Result<Self, UsersConfigError> {
        let config = toml::from_str::<UsersConfigFile>(raw)
            .map_err(|error| UsersConfigError::Parse(error.to_string()))?;
        let mut by_github_login = HashMap::with_capacity(config.users.len());
        for (index, user) in config.users.into_iter().enumerate() {
            let github = user.github.trim().trim_start_matches('@');
            let slack = user.slack.trim();
            if github.is_empty() {
                return Err(UsersConfigError::EmptyField {
                    index,
                    field: "github",
                });
            }
            if slack.is_empty() {
                return Err(UsersConfigError::EmptyField {
                    index,
                    field: "slack",
                });
            }
            by_github_login.insert(github.to_ascii_lowercase(), slack.to_string());
        }
        Ok(Self { by_github_login })
    }

    pub fn len(&self) -> usize {
        self.by_github_login.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_github_login.is_empty()
    }

    pub fn slack_member_for(&self, github_login: &str) -> Option<&str> {
        let login = github_login.trim_start_matches('@').to_ascii_lowercase();
        self.by_github_login.get(&login).map(String::as_str)
    }

    /// Rewrites every mapped `@login` in `text`; unmapped mentions are left untouched.
    pub fn translate_mentions(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        mention_regex()
            .replace_all(text, |captures: &Captures<'_>| {
                let prefix = captures.get(1).map_or("", |m| m.as_str());
                let login = captures.get(2).map_or("", |m| m.as_str());
                match self.slack_member_for(login) {
                    Some(member) => format!("{prefix}<@{member}>"),
                    None => format!("{prefix}@{login}"),
                }
            })
            .into_owned()
    }
}

fn mention_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(^|[^\w@`/<])@([A-Za-z0-9](?:[A-Za-z0-9-]{0,38}))\b")
            .expect("mention regex is valid")
    })
}
