//! The two delivery channels: signed per-user push and group webhook.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::request::{GroupEnvelope, PushRequest};

pub const DEFAULT_GROUP_SENDER: &str = "gitlab_blueprint_server_cicd";
pub const DEFAULT_GROUP_NAME: &str = "蓝图服务器构建通知";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How an endpoint expects to be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Field-level signed JSON sent as `text/plain`
    Signed,
    /// Plain JSON envelope
    Envelope,
}

impl Delivery {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Signed => "text/plain",
            Self::Envelope => "application/json",
        }
    }

    pub fn channel(self) -> &'static str {
        match self {
            Self::Signed => "user push",
            Self::Envelope => "group webhook",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndpoint {
    pub url: String,
    pub delivery: Delivery,
}

impl ChannelEndpoint {
    pub fn signed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delivery: Delivery::Signed,
        }
    }

    pub fn envelope(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delivery: Delivery::Envelope,
        }
    }

    pub fn is_https(&self) -> bool {
        Url::parse(&self.url).is_ok_and(|u| u.scheme() == "https")
    }
}

/// Everything a [`Notifier`] needs, built once per run.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub user_endpoint: ChannelEndpoint,
    pub group_endpoint: ChannelEndpoint,
    pub app_id: String,
    pub app_key: String,
    pub push_type: String,
    pub group_sender: String,
    pub group_name: String,
    pub timeout: Duration,
    pub insecure_group_tls: bool,
}

impl NotifierConfig {
    /// Certificate checks are only ever skipped for the group webhook, and
    /// only when the operator asked for it.
    pub fn accepts_invalid_certs(&self, delivery: Delivery) -> bool {
        delivery == Delivery::Envelope && self.insecure_group_tls
    }

    fn client(&self, endpoint: &ChannelEndpoint) -> Result<reqwest::Client, DeliveryError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if self.accepts_invalid_certs(endpoint.delivery) {
            warn!(
                url = %endpoint.url,
                channel = endpoint.delivery.channel(),
                "TLS certificate verification disabled"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(builder.build()?)
    }
}

pub struct Notifier {
    config: NotifierConfig,
    user_client: reqwest::Client,
    group_client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Result<Self, DeliveryError> {
        let user = &config.user_endpoint;
        if !user.url.is_empty() && !user.is_https() {
            warn!(url = %user.url, "user push endpoint is not HTTPS; the signed request travels in clear text");
        }

        let user_client = config.client(&config.user_endpoint)?;
        let group_client = config.client(&config.group_endpoint)?;

        Ok(Self {
            config,
            user_client,
            group_client,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// POST the signed request to the user push endpoint and return the
    /// decoded JSON object it answers with.
    pub async fn deliver_to_user(
        &self,
        request: &PushRequest,
    ) -> Result<Map<String, Value>, DeliveryError> {
        let body = serde_json::to_string(&request.signed(&self.config.app_key))?;
        debug!(channel = "user", users = %request.user_list, "sending push");

        let text = post(&self.user_client, &self.config.user_endpoint, body).await?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => {
                info!(channel = "user", "push delivered");
                Ok(map)
            }
            Ok(other) => Err(DeliveryError::NotAnObject(other.to_string())),
            Err(source) => Err(DeliveryError::InvalidResponse { body: text, source }),
        }
    }

    /// POST the title and content to the group webhook; returns the raw body.
    pub async fn deliver_to_group(
        &self,
        title: &str,
        content: &str,
    ) -> Result<String, DeliveryError> {
        let envelope = GroupEnvelope::new(
            &self.config.group_sender,
            &self.config.group_name,
            title,
            content,
        );
        let body = serde_json::to_string(&envelope)?;
        debug!(channel = "group", group = %self.config.group_name, "sending group post");

        let text = post(&self.group_client, &self.config.group_endpoint, body).await?;
        info!(channel = "group", "group post delivered");
        Ok(text)
    }
}

/// POST `body` with the content type the endpoint's delivery kind expects and
/// return the response text of a successful call.
async fn post(
    client: &reqwest::Client,
    endpoint: &ChannelEndpoint,
    body: String,
) -> Result<String, DeliveryError> {
    if endpoint.url.is_empty() {
        return Err(DeliveryError::NotConfigured(endpoint.delivery.channel()));
    }
    debug!(url = %endpoint.url, content_type = endpoint.delivery.content_type(), "POST");

    let resp = client
        .post(&endpoint.url)
        .header(CONTENT_TYPE, endpoint.delivery.content_type())
        .body(body)
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(DeliveryError::Status { status, body: text });
    }
    Ok(text)
}
