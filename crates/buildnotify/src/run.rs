use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::{PipelineContext, Settings};
use crate::error::DeliveryError;
use crate::links::PipelineLinks;
#[cfg(feature = "mock")]
use crate::lookup::FixtureLookup;
use crate::lookup::{CommitInfo, CommitLookup, GitlabLookup};
use crate::notifier::{Notifier, NotifierConfig};
use crate::request::PushRequest;
use crate::template::{self, BuildResult, GitlabInfo, Message};

/// Everything derived from the pipeline before anything is sent.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub commit: CommitInfo,
    pub links: PipelineLinks,
    pub info: GitlabInfo,
    pub result: BuildResult,
    pub message: Message,
    pub recipients: String,
}

/// Outcome of both channels; each one is attempted regardless of the other.
#[derive(Debug)]
pub struct DeliveryReport {
    pub user: Result<Map<String, Value>, DeliveryError>,
    pub group: Result<String, DeliveryError>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.user.is_ok() && self.group.is_ok()
    }
}

pub fn lookup_from_settings(settings: &Settings) -> Result<Box<dyn CommitLookup>> {
    #[cfg(feature = "mock")]
    if let Some(path) = &settings.commit_fixture {
        return Ok(Box::new(FixtureLookup::new(path.clone())));
    }
    let gitlab = GitlabLookup::new(settings.gitlab_token.clone(), settings.notifier.timeout)
        .context("Building GitLab client")?;
    Ok(Box::new(gitlab))
}

/// Fetch the commit, derive links and render the message for the pipeline.
pub async fn prepare(ctx: &PipelineContext, lookup: &dyn CommitLookup) -> Result<Prepared> {
    let commit = lookup
        .lookup_commit(&ctx.project_url, &ctx.project_name, &ctx.commit_sha)
        .await
        .with_context(|| {
            format!(
                "Looking up commit {} of {}",
                ctx.commit_sha, ctx.project_url
            )
        })?;

    let links = PipelineLinks::derive(
        &ctx.project_url,
        &ctx.job_id,
        &ctx.pipeline_id,
        ctx.win_publish_jobid,
        ctx.linux_publish_jobid,
    )
    .context("Deriving pipeline links")?;
    let info = gitlab_info(ctx, &commit, &links);

    let result = BuildResult::classify(&ctx.result);
    let message = result
        .template()
        .render(&info)
        .with_context(|| format!("Rendering {result:?} message"))?;
    info!(?result, project = %ctx.project_name, "message composed");

    Ok(Prepared {
        recipients: recipient_of(&commit.author_email),
        commit,
        links,
        info,
        result,
        message,
    })
}

/// Values available to the message templates.
pub fn gitlab_info(ctx: &PipelineContext, commit: &CommitInfo, links: &PipelineLinks) -> GitlabInfo {
    let mut info = GitlabInfo::default();
    info.insert(template::GITLAB_OS, &ctx.os);
    info.insert(template::GITLAB_RESULT, &ctx.result);
    info.insert(template::GITLAB_USER_NAME, &ctx.user_name);
    info.insert(template::CI_PROJECT_NAME, &ctx.project_name);
    info.insert(template::CI_COMMIT_SHA, &ctx.commit_sha);
    info.insert(template::CI_COMMIT_REF_NAME, &ctx.commit_ref_name);
    info.insert(template::GITLAB_CI_POST_EXPIRE, &ctx.publish_expire);
    info.insert(
        template::CI_COMMIT_MESSAGE,
        commit.message.trim_end_matches('\n'),
    );
    info.insert(template::CI_AUTHOR_EMAIL, &commit.author_email);
    info.insert(template::CI_COMMITTED_DATE, &commit.committed_date);
    info.insert(template::CI_PIPELINE_URL, &links.job);
    info.insert(template::CI_PIPELINE_FAILED_JOBS, &links.failed_jobs);
    info.insert(template::CI_WIN_ARTIFACTS_URL, &links.win_artifacts);
    info.insert(template::CI_LINUX_ARTIFACTS_URL, &links.linux_artifacts);
    info
}

/// Push recipient for a commit author: the mailbox name of the address.
pub fn recipient_of(author_email: &str) -> String {
    let email = author_email.trim();
    email
        .split_once('@')
        .map_or(email, |(local, _)| local)
        .to_string()
}

pub fn build_request(config: &NotifierConfig, prepared: &Prepared) -> PushRequest {
    PushRequest {
        title: prepared.message.title.clone(),
        content: prepared.message.content.clone(),
        user_list: prepared.recipients.clone(),
        ..PushRequest::new(&config.app_id, &config.push_type)
    }
}

/// Send to the user push endpoint, then to the group webhook. A failure on
/// the first channel is logged and does not stop the second.
pub async fn deliver(notifier: &Notifier, request: &PushRequest) -> DeliveryReport {
    let user = notifier.deliver_to_user(request).await;
    if let Err(e) = &user {
        error!(channel = "user", error = %e, "user push failed");
    }

    let group = notifier
        .deliver_to_group(&request.title, &request.content)
        .await;
    if let Err(e) = &group {
        error!(channel = "group", error = %e, "group post failed");
    }

    DeliveryReport { user, group }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LinkError, LookupError};
    use crate::template::{FAILURE, SUCCESS};
    use async_trait::async_trait;

    struct StaticLookup(Option<CommitInfo>);

    #[async_trait]
    impl CommitLookup for StaticLookup {
        async fn lookup_commit(
            &self,
            project_url: &str,
            _project_name: &str,
            commit_sha: &str,
        ) -> Result<CommitInfo, LookupError> {
            self.0.clone().ok_or_else(|| LookupError::CommitNotFound {
                sha: commit_sha.to_string(),
                path: project_url.to_string(),
            })
        }
    }

    fn commit() -> CommitInfo {
        CommitInfo {
            author_email: "alice@co.com".into(),
            message: "fix bug\n".into(),
            committed_date: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn context(result: &str) -> PipelineContext {
        PipelineContext {
            os: "linux".into(),
            result: result.into(),
            user_name: "alice".into(),
            project_name: "blueprint".into(),
            project_url: "https://git.example/grp/proj".into(),
            commit_sha: "abc123".into(),
            commit_ref_name: "main".into(),
            job_id: "42".into(),
            pipeline_id: "7".into(),
            win_publish_jobid: 10,
            linux_publish_jobid: None,
            publish_expire: "7 days".into(),
        }
    }

    #[tokio::test]
    async fn failure_scenario_end_to_end() {
        let prepared = prepare(&context("failure"), &StaticLookup(Some(commit())))
            .await
            .unwrap();

        assert_eq!(prepared.result, BuildResult::Failure);
        assert_eq!(prepared.message.title, FAILURE.title);
        let content = &prepared.message.content;
        for field in [
            "alice",
            "blueprint",
            "abc123",
            "fix bug",
            "main",
            "alice@co.com",
            "2024-01-01T00:00:00Z",
        ] {
            assert!(content.contains(field), "content lacks {field}");
        }
        assert!(content.contains("https://git.example/grp/proj/pipelines/7/failures"));
        assert!(!content.contains("artifacts/download"));
        assert!(!content.contains("fix bug\n\n"));
        assert_eq!(prepared.recipients, "alice");
    }

    #[tokio::test]
    async fn success_scenario_quotes_artifacts() {
        let prepared = prepare(&context("success"), &StaticLookup(Some(commit())))
            .await
            .unwrap();
        assert_eq!(prepared.message.title, SUCCESS.title);
        assert!(prepared
            .message
            .content
            .contains("https://git.example/grp/proj/-/jobs/9/artifacts/download"));
    }

    #[tokio::test]
    async fn lookup_failure_aborts() {
        let err = prepare(&context("failure"), &StaticLookup(None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("abc123"));
        assert!(err.downcast_ref::<LookupError>().is_some());
    }

    #[tokio::test]
    async fn underivable_linux_job_aborts() {
        let mut ctx = context("success");
        ctx.win_publish_jobid = i64::MIN;
        let err = prepare(&ctx, &StaticLookup(Some(commit())))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<LinkError>().is_some());
    }

    #[test]
    fn gitlab_info_has_every_key() {
        let ctx = context("failure");
        let links = PipelineLinks::derive(&ctx.project_url, "42", "7", 10, Some(8)).unwrap();
        let info = gitlab_info(&ctx, &commit(), &links);
        assert_eq!(info.len(), 14);
        assert_eq!(info.get(template::CI_COMMIT_MESSAGE), Some("fix bug"));
        assert_eq!(
            info.get(template::CI_LINUX_ARTIFACTS_URL),
            Some("https://git.example/grp/proj/-/jobs/8/artifacts/download")
        );
    }

    #[test]
    fn recipient_is_mailbox_name() {
        assert_eq!(recipient_of("alice@co.com"), "alice");
        assert_eq!(recipient_of(" bob.smith@pwrd.com\n"), "bob.smith");
        assert_eq!(recipient_of("carol"), "carol");
        assert_eq!(recipient_of(""), "");
    }
}
