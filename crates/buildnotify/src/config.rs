use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;
use crate::notifier::{
    ChannelEndpoint, NotifierConfig, DEFAULT_GROUP_NAME, DEFAULT_GROUP_SENDER, DEFAULT_TIMEOUT,
};
use crate::request::DEFAULT_PUSH_TYPE;

const DEFAULT_CONFIG_NAME: &str = "buildnotify.toml";

/// Optional file holding the values that rarely change between pipelines.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub push: PushSection,
    pub group: GroupSection,
    pub gitlab: GitlabSection,
    /// Timeout for every HTTP request, in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushSection {
    pub url: Option<String>,
    pub appid: Option<String>,
    pub appkey: Option<String>,
    pub push_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupSection {
    pub url: Option<String>,
    pub sender: Option<String>,
    pub name: Option<String>,
    pub insecure_tls: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitlabSection {
    pub token: Option<String>,
}

impl FileConfig {
    /// Load from an explicit path, else search upward from the current dir,
    /// else the user config dir. No file at all yields the defaults.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let path = match path_override {
            Some(p) => p,
            None => match find_upwards(DEFAULT_CONFIG_NAME).or_else(user_config_file) {
                Some(p) => p,
                None => {
                    debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        let cfg: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Parsing TOML config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(cfg)
    }
}

fn find_upwards(file_name: &str) -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

fn user_config_file() -> Option<PathBuf> {
    let candidate = dirs::config_dir()?.join("buildnotify").join("config.toml");
    candidate.exists().then_some(candidate)
}

/// CI variables describing the pipeline being reported.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub os: String,
    pub result: String,
    pub user_name: String,
    pub project_name: String,
    pub project_url: String,
    pub commit_sha: String,
    pub commit_ref_name: String,
    pub job_id: String,
    pub pipeline_id: String,
    pub win_publish_jobid: i64,
    pub linux_publish_jobid: Option<i64>,
    pub publish_expire: String,
}

/// Command line merged over the config file, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub notifier: NotifierConfig,
    pub gitlab_token: String,
    pub pipeline: PipelineContext,
    #[cfg(feature = "mock")]
    pub commit_fixture: Option<PathBuf>,
}

impl Settings {
    /// Non-empty command line values win over the file, the file wins over
    /// built-in defaults.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let timeout = cli
            .timeout_secs
            .or(file.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let notifier = NotifierConfig {
            user_endpoint: ChannelEndpoint::signed(pick(&cli.push2userlist_url, file.push.url)),
            group_endpoint: ChannelEndpoint::envelope(pick(&cli.push2group_url, file.group.url)),
            app_id: pick(&cli.appid, file.push.appid),
            app_key: pick(&cli.appkey, file.push.appkey),
            push_type: or_default(
                pick(&cli.push_type, file.push.push_type),
                DEFAULT_PUSH_TYPE,
            ),
            group_sender: or_default(file.group.sender.unwrap_or_default(), DEFAULT_GROUP_SENDER),
            group_name: or_default(file.group.name.unwrap_or_default(), DEFAULT_GROUP_NAME),
            timeout,
            insecure_group_tls: cli.insecure_group_tls || file.group.insecure_tls,
        };

        let pipeline = PipelineContext {
            os: cli.gitlab_os.clone(),
            result: cli.gitlab_result.clone(),
            user_name: cli.user_name.clone(),
            project_name: cli.project_name.clone(),
            project_url: cli.project_url.clone(),
            commit_sha: cli.commit_sha.clone(),
            commit_ref_name: cli.commit_ref_name.clone(),
            job_id: cli.gitlab_jobid.clone(),
            pipeline_id: cli.pipeline_id.clone(),
            win_publish_jobid: cli.win_publish_jobid,
            linux_publish_jobid: cli.linux_publish_jobid,
            publish_expire: cli.publish_expire.clone(),
        };

        Self {
            notifier,
            gitlab_token: pick(&cli.token, file.gitlab.token),
            pipeline,
            #[cfg(feature = "mock")]
            commit_fixture: cli.commit_fixture.clone(),
        }
    }
}

fn pick(cli_value: &str, file_value: Option<String>) -> String {
    if cli_value.is_empty() {
        file_value.unwrap_or_default()
    } else {
        cli_value.to_string()
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
