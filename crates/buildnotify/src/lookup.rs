#[cfg(feature = "mock")]
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LookupError;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const PROJECTS_PER_PAGE: &str = "100";

/// Metadata of the commit that triggered the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author_email: String,
    pub message: String,
    pub committed_date: String,
}

#[async_trait]
pub trait CommitLookup: Send + Sync {
    /// Resolve `commit_sha` in the project living at `project_url`, found by
    /// searching for `project_name`.
    async fn lookup_commit(
        &self,
        project_url: &str,
        project_name: &str,
        commit_sha: &str,
    ) -> Result<CommitInfo, LookupError>;
}

/// Commit lookup against the GitLab REST API of the host serving the project.
pub struct GitlabLookup {
    client: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ProjectSummary {
    id: u64,
    path_with_namespace: String,
}

impl GitlabLookup {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, LookupError> {
        debug!(%url, "GitLab API request");
        Ok(self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?)
    }
}

#[async_trait]
impl CommitLookup for GitlabLookup {
    async fn lookup_commit(
        &self,
        project_url: &str,
        project_name: &str,
        commit_sha: &str,
    ) -> Result<CommitInfo, LookupError> {
        let (api, path) = split_project_url(project_url)?;

        let mut search = api.join("projects").map_err(|_| invalid(project_url))?;
        search
            .query_pairs_mut()
            .append_pair("search", project_name)
            .append_pair("per_page", PROJECTS_PER_PAGE);
        let resp = self.get(search.clone()).await?;
        if !resp.status().is_success() {
            return Err(LookupError::Status {
                status: resp.status(),
                url: search.to_string(),
            });
        }
        let projects: Vec<ProjectSummary> = serde_json::from_slice(&resp.bytes().await?)?;
        let project = projects
            .into_iter()
            .find(|p| p.path_with_namespace == path)
            .ok_or_else(|| LookupError::ProjectNotFound {
                name: project_name.to_string(),
                path: path.clone(),
            })?;
        debug!(project_id = project.id, %path, "matched project");

        let not_found = || LookupError::CommitNotFound {
            sha: commit_sha.to_string(),
            path: path.clone(),
        };
        if matches!(commit_sha, "" | "." | "..") {
            return Err(not_found());
        }
        let url = commit_url(&api, project.id, commit_sha).ok_or_else(|| invalid(project_url))?;
        let resp = self.get(url.clone()).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(not_found()),
            status if !status.is_success() => Err(LookupError::Status {
                status,
                url: url.to_string(),
            }),
            _ => {
                let commit: CommitInfo = serde_json::from_slice(&resp.bytes().await?)?;
                info!(sha = commit_sha, author = %commit.author_email, "resolved commit");
                Ok(commit)
            }
        }
    }
}

/// Split a project web URL into the host's API base and the namespaced path.
fn split_project_url(project_url: &str) -> Result<(Url, String), LookupError> {
    let url = Url::parse(project_url).map_err(|_| invalid(project_url))?;
    if url.host_str().is_none() {
        return Err(invalid(project_url));
    }
    let path = url
        .path()
        .trim_matches('/')
        .trim_end_matches(".git")
        .to_string();
    if path.is_empty() {
        return Err(invalid(project_url));
    }
    let api = Url::parse(&format!("{}/api/v4/", url.origin().ascii_serialization()))
        .map_err(|_| invalid(project_url))?;
    Ok((api, path))
}

/// `{api}projects/{id}/repository/commits/{sha}`, with the sha escaped as a
/// single path segment.
fn commit_url(api: &Url, project_id: u64, commit_sha: &str) -> Option<Url> {
    let id = project_id.to_string();
    let mut url = api.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["projects", id.as_str(), "repository", "commits"])
        .push(commit_sha);
    Some(url)
}

fn invalid(project_url: &str) -> LookupError {
    LookupError::InvalidUrl(project_url.to_string())
}

/// Commit metadata read from a JSON file, for offline runs.
#[cfg(feature = "mock")]
pub struct FixtureLookup {
    path: PathBuf,
}

#[cfg(feature = "mock")]
impl FixtureLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "mock")]
#[async_trait]
impl CommitLookup for FixtureLookup {
    async fn lookup_commit(
        &self,
        _project_url: &str,
        _project_name: &str,
        commit_sha: &str,
    ) -> Result<CommitInfo, LookupError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| LookupError::Fixture {
                path: self.path.clone(),
                source,
            })?;
        let commit: CommitInfo = serde_json::from_slice(&bytes)?;
        debug!(sha = commit_sha, fixture = %self.path.display(), "commit read from fixture");
        Ok(commit)
    }
}
