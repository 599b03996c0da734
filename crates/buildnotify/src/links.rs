use tracing::warn;

use crate::error::LinkError;

/// Pipeline URLs quoted in notification messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLinks {
    pub job: String,
    pub failed_jobs: String,
    pub win_artifacts: String,
    pub linux_artifacts: String,
}

impl PipelineLinks {
    /// Compose the links from the project URL and CI ids.
    ///
    /// Without an explicit Linux publish job id, the job right before the
    /// Windows publish job is assumed to be the Linux one.
    pub fn derive(
        project_url: &str,
        job_id: &str,
        pipeline_id: &str,
        win_publish_jobid: i64,
        linux_publish_jobid: Option<i64>,
    ) -> Result<Self, LinkError> {
        let linux_jobid = match linux_publish_jobid {
            Some(id) => id,
            None => {
                let guessed = win_publish_jobid
                    .checked_sub(1)
                    .ok_or(LinkError::JobIdOutOfRange(win_publish_jobid))?;
                warn!(
                    win_publish_jobid,
                    linux_publish_jobid = guessed,
                    "linux_publish_jobid not given, assuming it precedes the Windows publish job"
                );
                guessed
            }
        };

        Ok(Self {
            job: format!("{project_url}/-/jobs/{job_id}"),
            failed_jobs: format!("{project_url}/pipelines/{pipeline_id}/failures"),
            win_artifacts: artifacts_url(project_url, win_publish_jobid),
            linux_artifacts: artifacts_url(project_url, linux_jobid),
        })
    }
}

fn artifacts_url(project_url: &str, job_id: i64) -> String {
    format!("{project_url}/-/jobs/{job_id}/artifacts/download")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "https://git.example/grp/proj";

    #[test]
    fn derives_all_links() {
        let links = PipelineLinks::derive(PROJECT, "42", "7", 10, None).unwrap();
        assert_eq!(links.job, "https://git.example/grp/proj/-/jobs/42");
        assert_eq!(
            links.failed_jobs,
            "https://git.example/grp/proj/pipelines/7/failures"
        );
        assert_eq!(
            links.win_artifacts,
            "https://git.example/grp/proj/-/jobs/10/artifacts/download"
        );
        assert_eq!(
            links.linux_artifacts,
            "https://git.example/grp/proj/-/jobs/9/artifacts/download"
        );
    }

    #[test]
    fn explicit_linux_job_wins() {
        let links = PipelineLinks::derive(PROJECT, "42", "7", 10, Some(3)).unwrap();
        assert_eq!(
            links.linux_artifacts,
            "https://git.example/grp/proj/-/jobs/3/artifacts/download"
        );
    }

    #[test]
    fn minimum_windows_job_id_is_rejected() {
        assert_eq!(
            PipelineLinks::derive(PROJECT, "1", "1", i64::MIN, None),
            Err(LinkError::JobIdOutOfRange(i64::MIN))
        );
        let links = PipelineLinks::derive(PROJECT, "1", "1", i64::MIN, Some(5)).unwrap();
        assert!(links.linux_artifacts.ends_with("/-/jobs/5/artifacts/download"));
    }
}
