//! Build result classification and the fixed notification templates.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::TemplateError;

pub const GITLAB_OS: &str = "GITLAB_OS";
pub const GITLAB_RESULT: &str = "GITLAB_RESULT";
pub const GITLAB_USER_NAME: &str = "GITLAB_USER_NAME";
pub const CI_PROJECT_NAME: &str = "CI_PROJECT_NAME";
pub const CI_COMMIT_SHA: &str = "CI_COMMIT_SHA";
pub const CI_COMMIT_REF_NAME: &str = "CI_COMMIT_REF_NAME";
pub const GITLAB_CI_POST_EXPIRE: &str = "GITLAB_CI_POST_EXPIRE";
pub const CI_COMMIT_MESSAGE: &str = "CI_COMMIT_MESSAGE";
pub const CI_AUTHOR_EMAIL: &str = "CI_AUTHOR_EMAIL";
pub const CI_COMMITTED_DATE: &str = "CI_COMMITTED_DATE";
pub const CI_PIPELINE_URL: &str = "CI_PIPELINE_URL";
pub const CI_PIPELINE_FAILED_JOBS: &str = "CI_PIPELINE_FAILED_JOBS";
pub const CI_WIN_ARTIFACTS_URL: &str = "CI_WIN_ARTIFACTS_URL";
pub const CI_LINUX_ARTIFACTS_URL: &str = "CI_LINUX_ARTIFACTS_URL";

macro_rules! report_header {
    () => {
        "蓝图服务器构建结果:\n\
         warning:{GITLAB_RESULT}\n\
         本次构建由:[{GITLAB_USER_NAME}]触发\n\
         项目名称:{CI_PROJECT_NAME}\n\
         提交号:{CI_COMMIT_SHA}\n\
         提交日志:{CI_COMMIT_MESSAGE}\n\
         构建分支:{CI_COMMIT_REF_NAME}\n\
         构建者Email:{CI_AUTHOR_EMAIL}\n\
         构建者commit时间:{CI_COMMITTED_DATE}\n"
    };
}

pub const FAILURE: MessageTemplate = MessageTemplate {
    title: "你的git提交违法规定,快去修复问题!!!",
    body: concat!(
        report_header!(),
        "检查失败日志地址:{CI_PIPELINE_FAILED_JOBS}\n",
        "你上传的c,c++,lua代码语法,格式化有问题,请去[检查失败日志地址]查看原因,并及时修正上传"
    ),
};

pub const SUCCESS: MessageTemplate = MessageTemplate {
    title: "你的git提交成功 ^.^",
    body: concat!(
        report_header!(),
        "win服务器下载地址:{CI_WIN_ARTIFACTS_URL}\n",
        "linux服务器下载地址:{CI_LINUX_ARTIFACTS_URL}\n",
        "太棒了!你的代码publish成功啦 ^.^ 请及时去[服务器下载地址]下载最新编译程序\n",
        "有效期{GITLAB_CI_POST_EXPIRE}"
    ),
};

pub const SYSTEM_ERROR: MessageTemplate = MessageTemplate {
    title: "你的git提交失败,系统异常,请联系运维或者程序进行系统修复",
    body: concat!(
        report_header!(),
        "编译后的工程publish失败,请联系运维或程序管理员进行检查修正"
    ),
};

/// Outcome reported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Failure,
    SystemError,
}

impl BuildResult {
    /// Map the pipeline's result label. The Chinese labels are what older
    /// pipeline definitions pass.
    pub fn classify(label: &str) -> Self {
        match label {
            "success" | "成功" => Self::Success,
            "failure" | "失败" => Self::Failure,
            _ => Self::SystemError,
        }
    }

    pub fn template(self) -> &'static MessageTemplate {
        match self {
            Self::Success => &SUCCESS,
            Self::Failure => &FAILURE,
            Self::SystemError => &SYSTEM_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: &'static str,
    pub body: &'static str,
}

impl MessageTemplate {
    pub fn render(&self, info: &GitlabInfo) -> Result<Message, TemplateError> {
        Ok(Message {
            title: interpolate(self.title, info)?,
            content: interpolate(self.body, info)?,
        })
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub title: String,
    pub content: String,
}

/// Named values available to templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GitlabInfo(BTreeMap<String, String>);

impl GitlabInfo {
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Replace every `{NAME}` in `template` with its value. A name without a
/// value is an error; values are inserted verbatim and never re-scanned.
pub fn interpolate(template: &str, info: &GitlabInfo) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or(TemplateError::Unterminated(offset + open))?;
        let key = &after[..close];
        let value = info
            .get(key)
            .ok_or_else(|| TemplateError::MissingField(key.to_string()))?;
        out.push_str(value);

        let consumed = open + 1 + close + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_info() -> GitlabInfo {
        let mut info = GitlabInfo::default();
        for (key, value) in [
            (GITLAB_OS, "linux"),
            (GITLAB_RESULT, "failure"),
            (GITLAB_USER_NAME, "alice"),
            (CI_PROJECT_NAME, "blueprint"),
            (CI_COMMIT_SHA, "abc123"),
            (CI_COMMIT_REF_NAME, "main"),
            (GITLAB_CI_POST_EXPIRE, "7 days"),
            (CI_COMMIT_MESSAGE, "fix bug"),
            (CI_AUTHOR_EMAIL, "alice@co.com"),
            (CI_COMMITTED_DATE, "2024-01-01T00:00:00Z"),
            (CI_PIPELINE_URL, "https://git.example/grp/proj/-/jobs/42"),
            (
                CI_PIPELINE_FAILED_JOBS,
                "https://git.example/grp/proj/pipelines/7/failures",
            ),
            (
                CI_WIN_ARTIFACTS_URL,
                "https://git.example/grp/proj/-/jobs/10/artifacts/download",
            ),
            (
                CI_LINUX_ARTIFACTS_URL,
                "https://git.example/grp/proj/-/jobs/9/artifacts/download",
            ),
        ] {
            info.insert(key, value);
        }
        info
    }

    #[test]
    fn classify_is_total() {
        assert_eq!(BuildResult::classify("success"), BuildResult::Success);
        assert_eq!(BuildResult::classify("成功"), BuildResult::Success);
        assert_eq!(BuildResult::classify("failure"), BuildResult::Failure);
        assert_eq!(BuildResult::classify("失败"), BuildResult::Failure);
        for other in ["", "canceled", "Success", "error"] {
            assert_eq!(BuildResult::classify(other), BuildResult::SystemError);
        }
    }

    #[test]
    fn failure_cites_failed_jobs_only() {
        let info = full_info();
        let msg = BuildResult::Failure.template().render(&info).unwrap();
        assert_eq!(msg.title, FAILURE.title);
        assert!(msg.content.contains("/pipelines/7/failures"));
        assert!(!msg.content.contains("artifacts/download"));
    }

    #[test]
    fn success_cites_both_artifacts_and_expiry() {
        let info = full_info();
        let msg = BuildResult::Success.template().render(&info).unwrap();
        assert_eq!(msg.title, SUCCESS.title);
        assert!(msg.content.contains("/-/jobs/10/artifacts/download"));
        assert!(msg.content.contains("/-/jobs/9/artifacts/download"));
        assert!(msg.content.contains("有效期7 days"));
        assert!(!msg.content.contains("/failures"));
    }

    #[test]
    fn system_error_has_no_links() {
        let info = full_info();
        let msg = BuildResult::SystemError.template().render(&info).unwrap();
        assert_eq!(msg.title, SYSTEM_ERROR.title);
        assert!(!msg.content.contains("artifacts/download"));
        assert!(!msg.content.contains("/failures"));
        assert!(msg.content.contains("联系运维"));
    }

    #[test]
    fn every_template_quotes_commit_fields() {
        let info = full_info();
        for result in [
            BuildResult::Success,
            BuildResult::Failure,
            BuildResult::SystemError,
        ] {
            let msg = result.template().render(&info).unwrap();
            for field in [
                "alice",
                "blueprint",
                "abc123",
                "fix bug",
                "main",
                "alice@co.com",
                "2024-01-01T00:00:00Z",
            ] {
                assert!(msg.content.contains(field), "{result:?} lacks {field}");
            }
            assert!(!msg.content.contains('{'));
        }
    }

    #[test]
    fn missing_field_aborts() {
        let mut info = GitlabInfo::default();
        info.insert(GITLAB_RESULT, "failure");
        let err = FAILURE.render(&info).unwrap_err();
        assert_eq!(err, TemplateError::MissingField(GITLAB_USER_NAME.into()));
    }

    #[test]
    fn values_are_not_rescanned() {
        let mut info = GitlabInfo::default();
        info.insert("A", "{B}");
        assert_eq!(interpolate("x{A}y", &info).unwrap(), "x{B}y");
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let mut info = GitlabInfo::default();
        info.insert("A", "1");
        assert_eq!(
            interpolate("{A} and {B", &info),
            Err(TemplateError::Unterminated(8))
        );
    }
}
