//! GitHub REST client used to read issue/PR/comment bodies and persist notification metadata.

mod github_api_client;

pub use github_api_client::GithubApiClient;
