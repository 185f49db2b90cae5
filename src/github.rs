//! GitHub collaborator: inbound webhook payload types and the outbound REST
//! client used to verify issue references and post claim notifications.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "bountyflow";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum GithubError {
    #[error("authentication failed (401)")]
    Unauthorized,
    #[error("access forbidden (403)")]
    Forbidden,
    #[error("not found (404)")]
    NotFound,
    #[error("rate limited (429)")]
    RateLimited,
    #[error("unexpected API status {0}")]
    Api(u16),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed API response: {0}")]
    InvalidResponse(String),
}

/// Maps a non-success REST status onto the error classes the pipeline
/// distinguishes: auth failure, not-found, rate-limited, everything else.
pub fn classify_status(status: StatusCode) -> GithubError {
    match status.as_u16() {
        401 => GithubError::Unauthorized,
        403 => GithubError::Forbidden,
        404 => GithubError::NotFound,
        429 => GithubError::RateLimited,
        other => GithubError::Api(other),
    }
}

// --- Webhook payload types ---

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PullRequest {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub merged: bool,
    pub user: GithubUser,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubUser {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    #[serde(default)]
    pub stargazers_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: InstallationPayload,
    #[serde(default)]
    pub repositories: Vec<RepositorySummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationPayload {
    pub id: i64,
    pub account: GithubAccount,
    #[serde(default)]
    pub repository_selection: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAccount {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySummary {
    pub id: i64,
    pub full_name: String,
}

// --- REST client ---

/// A repository issue as returned by the REST API, reduced to what the
/// pipeline needs: existence, whether the number is really a PR, and the
/// signals the scorer consumes.
#[derive(Debug, Clone)]
pub struct IssueRef {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub is_pull_request: bool,
    pub labels: Vec<String>,
    pub comments: i64,
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_issue(&self, repo_full_name: &str, number: i64) -> Result<IssueRef, GithubError>;

    async fn post_comment(
        &self,
        repo_full_name: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), GithubError>;
}

pub struct GithubClient {
    client: Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(base_url: String, token: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn get_issue(&self, repo_full_name: &str, number: i64) -> Result<IssueRef, GithubError> {
        let res = self
            .request(Method::GET, &format!("/repos/{repo_full_name}/issues/{number}"))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(classify_status(res.status()));
        }

        let body = res.json::<serde_json::Value>().await?;
        let issue_number = body["number"]
            .as_i64()
            .ok_or_else(|| GithubError::InvalidResponse("missing issue number".to_string()))?;

        let labels = body["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(IssueRef {
            number: issue_number,
            title: body["title"].as_str().unwrap_or_default().to_string(),
            state: body["state"].as_str().unwrap_or_default().to_string(),
            // Issues that are actually PRs carry a pull_request field.
            is_pull_request: body.get("pull_request").is_some(),
            labels,
            comments: body["comments"].as_i64().unwrap_or(0),
        })
    }

    async fn post_comment(
        &self,
        repo_full_name: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), GithubError> {
        let res = self
            .request(
                Method::POST,
                &format!("/repos/{repo_full_name}/issues/{issue_number}/comments"),
            )
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(classify_status(res.status()));
        }
        Ok(())
    }
}
