//! Error types for commit lookup, message rendering and delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving the triggering commit.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Project URL has no scheme, host or path
    #[error("invalid project URL '{0}'")]
    InvalidUrl(String),

    /// Search by name returned nothing with the expected namespaced path
    #[error("no project named '{name}' with path '{path}'")]
    ProjectNotFound { name: String, path: String },

    /// Project exists but does not know the commit
    #[error("commit '{sha}' not found in project '{path}'")]
    CommitNotFound { sha: String, path: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitLab answered with an unexpected status
    #[error("GitLab API returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Response or fixture body did not decode
    #[error("decoding commit metadata: {0}")]
    Decode(#[from] serde_json::Error),

    /// Fixture file could not be read
    #[error("reading commit fixture {}: {source}", path.display())]
    Fixture {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised while interpolating a message template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template references unknown field '{0}'")]
    MissingField(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Errors raised by a single channel delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Endpoint URL was left empty
    #[error("{0} endpoint not configured")]
    NotConfigured(&'static str),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request body could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// User push endpoint answered with something that is not JSON
    #[error("response is not valid JSON ({source}): {body}")]
    InvalidResponse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// User push endpoint answered with JSON that is not an object
    #[error("response JSON is not an object: {0}")]
    NotAnObject(String),
}

/// Errors raised while composing pipeline URLs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The Linux publish job id cannot be derived from the Windows one
    #[error("cannot derive the Linux publish job id from Windows job {0}; pass --linux_publish_jobid")]
    JobIdOutOfRange(i64),
}
