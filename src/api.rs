//! The backend's JSON endpoints, and the types they exchange.
//!
//! The backend reports most failures inside the response body, sometimes with
//! a 4xx status, so bodies are decoded whatever the status code is.

use std::fmt;

use reqwest::{Client, RequestBuilder};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::{config::Config, error::ClientError};

/// An opaque id the backend issues for one download.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHandle(pub String);

impl DownloadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        DownloadHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The relative link to the finished file.
    pub fn artifact_path(&self) -> String {
        format!("/api/download/{}", self.0)
    }
}

impl fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format: String,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deployment {
    #[serde(rename = "vercelEnv")]
    pub name: Option<String>,
    pub region: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(rename = "isHosted", alias = "isVercel", default)]
    pub is_hosted: bool,
    #[serde(rename = "downloadsEnabled", default = "enabled")]
    pub downloads_enabled: bool,
    #[serde(rename = "environment")]
    pub deployment: Option<Deployment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatEntry {
    pub format_id: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FormatEntry {
    pub fn is_video(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfoResponse {
    #[serde(default)]
    pub success: bool,
    pub info: Option<VideoMetadata>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub success: bool,
    pub download_id: Option<DownloadHandle>,
    pub filename: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Where a polled download stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Complete,
    Failed,
}

/// A progress reading the backend may send as text ("1.2MiB/s") or as a raw
/// number (bytes per second, seconds left).
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Text(String),
    Number(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Number(f64),
    Other(IgnoredAny),
}

fn number_text(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Strings as they are, numbers printed, anything else dropped.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(text)) => Some(text),
        Some(Loose::Number(number)) => Some(number_text(number)),
        Some(Loose::Other(_)) | None => None,
    })
}

fn lenient_reading<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Reading>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(text)) => Some(Reading::Text(text)),
        Some(Loose::Number(number)) => Some(Reading::Number(number)),
        Some(Loose::Other(_)) | None => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(number)) => Some(number),
        Some(Loose::Text(text)) => text.trim().trim_end_matches('%').trim().parse().ok(),
        Some(Loose::Other(_)) | None => None,
    })
}

/// A mistyped display field must never hide the status, so everything but
/// `success` is decoded leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, alias = "percent", deserialize_with = "lenient_number")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub speed: Option<Reading>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub eta: Option<Reading>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub format: Option<String>,
    pub download_id: Option<DownloadHandle>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub error: Option<String>,
}

impl ProgressSnapshot {
    pub fn phase(&self) -> Phase {
        match self.status.as_deref() {
            Some("complete") => Phase::Complete,
            Some("error") => Phase::Failed,
            _ => Phase::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub download_id: DownloadHandle,
    pub title: Option<String>,
    pub format: Option<String>,
    /// Epoch seconds.
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub downloads: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: Option<f64>,
}

/// Server message first, then the legacy `error` field.
pub(crate) fn server_message(message: &Option<String>, error: &Option<String>) -> Option<String> {
    message
        .as_ref()
        .or(error.as_ref())
        .filter(|message| !message.is_empty())
        .cloned()
}

/// Everything the controller needs from the backend.
#[async_trait::async_trait]
pub trait Backend: fmt::Debug + Send + Sync {
    async fn environment(&self) -> Result<EnvironmentInfo, ClientError>;

    async fn video_info(&self, url: &str) -> Result<VideoInfoResponse, ClientError>;

    async fn start_download(&self, request: &DownloadRequest) -> Result<StartResponse, ClientError>;

    async fn progress(&self, handle: &DownloadHandle) -> Result<ProgressSnapshot, ClientError>;

    async fn history(&self) -> Result<HistoryResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: Config,
}

impl HttpBackend {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(HttpBackend { client, config })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.server, path)
    }

    pub fn artifact_url(&self, handle: &DownloadHandle) -> String {
        self.endpoint(&handle.artifact_path())
    }

    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.credentials {
            Some(credentials) => builder.basic_auth(&credentials.user, credentials.password.as_ref()),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!("GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    pub async fn health_check(&self) -> Result<Health, ClientError> {
        self.get_json("/api/health-check").await
    }
}

#[derive(Serialize)]
struct VideoInfoRequest<'a> {
    url: &'a str,
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn environment(&self) -> Result<EnvironmentInfo, ClientError> {
        self.get_json("/api/vercel-info").await
    }

    async fn video_info(&self, url: &str) -> Result<VideoInfoResponse, ClientError> {
        self.post_json("/api/video-info", &VideoInfoRequest { url }).await
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<StartResponse, ClientError> {
        self.post_json("/api/download", request).await
    }

    async fn progress(&self, handle: &DownloadHandle) -> Result<ProgressSnapshot, ClientError> {
        self.get_json(&format!("/api/progress/{}", handle)).await
    }

    async fn history(&self) -> Result<HistoryResponse, ClientError> {
        self.get_json("/api/downloads").await
    }
}
