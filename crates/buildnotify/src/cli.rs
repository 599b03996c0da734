use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

const REDACTED: &str = "***";

/// Buildnotify – CI pipeline result notifier
#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Activate verbose output (-v, -vv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Runner operating system
    #[arg(long = "gitlab_os", default_value = "")]
    pub gitlab_os: String,

    /// Group webhook URL
    #[arg(long = "push2group_url", default_value = "")]
    pub push2group_url: String,

    /// Per-user push URL
    #[arg(long = "push2userlist_url", default_value = "")]
    pub push2userlist_url: String,

    /// GitLab private token
    #[arg(long, default_value = "")]
    pub token: String,

    /// Push application id
    #[arg(long, default_value = "")]
    pub appid: String,

    /// Push application key (signing secret)
    #[arg(long, default_value = "")]
    pub appkey: String,

    /// Push classification
    #[arg(long = "push_type", default_value = "")]
    pub push_type: String,

    /// Build result (success, failure, anything else is a system error)
    #[arg(long = "gitlab_result", default_value = "")]
    pub gitlab_result: String,

    /// User who triggered the pipeline
    #[arg(long = "user_name", default_value = "")]
    pub user_name: String,

    /// Project display name
    #[arg(long = "project_name", default_value = "")]
    pub project_name: String,

    /// Commit id
    #[arg(long = "commit_sha", default_value = "")]
    pub commit_sha: String,

    /// Branch or tag name
    #[arg(long = "commit_ref_name", default_value = "")]
    pub commit_ref_name: String,

    /// Id of the current job
    #[arg(long = "gitlab_jobid", default_value = "")]
    pub gitlab_jobid: String,

    /// Project web URL
    #[arg(long = "project_url", default_value = "")]
    pub project_url: String,

    /// Id of the current pipeline
    #[arg(long = "pipeline_id", default_value = "")]
    pub pipeline_id: String,

    /// Id of the Windows publish job
    #[arg(
        long = "win_publish_jobid",
        default_value_t = 0,
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub win_publish_jobid: i64,

    /// Id of the Linux publish job (defaults to the Windows id minus one)
    #[arg(long = "linux_publish_jobid", value_parser = clap::value_parser!(i64).range(0..))]
    pub linux_publish_jobid: Option<i64>,

    /// How long published artifacts stay downloadable
    #[arg(long = "publish_expire", default_value = "")]
    pub publish_expire: String,

    /// Skip TLS certificate verification on the group webhook
    #[arg(long = "insecure_group_tls")]
    pub insecure_group_tls: bool,

    /// Timeout for every HTTP request, in seconds
    #[arg(long = "timeout_secs", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Read commit metadata from a JSON file instead of GitLab
    #[cfg(feature = "mock")]
    #[arg(long = "commit_fixture", value_name = "FILE")]
    pub commit_fixture: Option<PathBuf>,
}

impl Cli {
    /// Arguments as JSON with credentials masked, for echoing to stdout.
    pub fn redacted(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            for key in ["token", "appkey"] {
                if let Some(v) = map.get_mut(key) {
                    if v.as_str().is_some_and(|s| !s.is_empty()) {
                        *v = REDACTED.into();
                    }
                }
            }
        }
        Ok(value)
    }
}
