use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_PUSH_TYPE: &str = "RTX";
const DEFAULT_MERGE: &str = "0";
const DEFAULT_NOTE_TYPE: &str = "1";

/// Fields of one user push. Build a fresh value for every outbound request;
/// the signature is derived from it at send time and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRequest {
    pub app_id: String,
    pub title: String,
    pub push_type: String,
    pub user_list: String,
    pub ip_list: String,
    pub cc_list: String,
    pub merge: String,
    pub content: String,
    pub note_type: String,
    pub timestamp: String,
    pub extra: Map<String, Value>,
}

impl PushRequest {
    /// Request with the receiving API's defaults, stamped with the current time.
    pub fn new(app_id: impl Into<String>, push_type: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            push_type: push_type.into(),
            merge: DEFAULT_MERGE.to_string(),
            note_type: DEFAULT_NOTE_TYPE.to_string(),
            timestamp: unix_timestamp(),
            ..Self::default()
        }
    }

    /// Lowercase hex MD5 over the signed fields followed by the app key.
    /// Field order and the absence of separators are fixed by the push API.
    pub fn signature(&self, app_key: &str) -> String {
        let mut hasher = Md5::new();
        for part in [
            &self.app_id,
            &self.title,
            &self.push_type,
            &self.user_list,
            &self.ip_list,
            &self.cc_list,
            &self.merge,
            &self.content,
            &self.note_type,
            &self.timestamp,
        ] {
            hasher.update(part.as_bytes());
        }
        hasher.update(app_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Wire form of this request carrying a freshly computed signature.
    pub fn signed(&self, app_key: &str) -> SignedPush<'_> {
        SignedPush {
            app_id: &self.app_id,
            title: &self.title,
            push_type: &self.push_type,
            user_list: &self.user_list,
            ip_list: &self.ip_list,
            cc_list: &self.cc_list,
            merge: &self.merge,
            content: &self.content,
            note_type: &self.note_type,
            t: &self.timestamp,
            extra: &self.extra,
            sign: self.signature(app_key),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPush<'a> {
    pub app_id: &'a str,
    pub title: &'a str,
    pub push_type: &'a str,
    pub user_list: &'a str,
    pub ip_list: &'a str,
    pub cc_list: &'a str,
    pub merge: &'a str,
    pub content: &'a str,
    pub note_type: &'a str,
    pub t: &'a str,
    pub extra: &'a Map<String, Value>,
    pub sign: String,
}

/// Body of a group webhook post.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEnvelope<'a> {
    pub sender: &'a str,
    pub content: String,
    pub user_id: &'a str,
    pub group_name: &'a str,
}

impl<'a> GroupEnvelope<'a> {
    pub fn new(sender: &'a str, group_name: &'a str, title: &str, content: &str) -> Self {
        Self {
            sender,
            content: format!("{title}\n{content}"),
            user_id: sender,
            group_name,
        }
    }
}

/// Seconds since the Unix epoch with a microsecond fraction.
pub fn unix_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}
