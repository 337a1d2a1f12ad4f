//! A scripted backend for unit tests.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use crate::{
    api::{
        Backend, DownloadHandle, DownloadRequest, EnvironmentInfo, HistoryEntry, HistoryResponse,
        ProgressSnapshot, StartResponse, VideoInfoResponse,
    },
    error::ClientError,
};

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, String>)>>;

#[derive(Debug, Default)]
pub struct FakeBackend {
    environment: Mutex<Option<Result<EnvironmentInfo, String>>>,
    video_info: Scripted<VideoInfoResponse>,
    start: Scripted<StartResponse>,
    progress: Scripted<ProgressSnapshot>,
    history: Scripted<HistoryResponse>,
    calls: Mutex<Vec<String>>,
}

fn failure(message: String) -> ClientError {
    ClientError::Server(message)
}

async fn next<T>(script: &Scripted<T>, fallback: impl FnOnce() -> T) -> Result<T, ClientError> {
    let step = script.lock().unwrap().pop_front();
    match step {
        Some((delay, result)) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result.map_err(failure)
        }
        None => Ok(fallback()),
    }
}

pub fn snapshot(status: &str, percentage: Option<f64>) -> ProgressSnapshot {
    ProgressSnapshot {
        success: true,
        status: Some(status.to_string()),
        percentage,
        ..Default::default()
    }
}

pub fn started(id: &str) -> StartResponse {
    StartResponse {
        success: true,
        download_id: Some(DownloadHandle::new(id)),
        ..Default::default()
    }
}

pub fn entry(id: &str, title: &str, timestamp: f64) -> HistoryEntry {
    HistoryEntry {
        download_id: DownloadHandle::new(id),
        title: Some(title.to_string()),
        format: Some("720p".to_string()),
        timestamp: Some(timestamp),
    }
}

impl FakeBackend {
    pub fn set_environment(&self, environment: Result<EnvironmentInfo, String>) {
        *self.environment.lock().unwrap() = Some(environment);
    }

    pub fn push_video_info(&self, response: Result<VideoInfoResponse, String>) {
        self.video_info.lock().unwrap().push_back((Duration::ZERO, response));
    }

    pub fn push_start(&self, response: Result<StartResponse, String>) {
        self.push_start_after(Duration::ZERO, response);
    }

    pub fn push_start_after(&self, delay: Duration, response: Result<StartResponse, String>) {
        self.start.lock().unwrap().push_back((delay, response));
    }

    pub fn push_progress(&self, response: Result<ProgressSnapshot, String>) {
        self.progress.lock().unwrap().push_back((Duration::ZERO, response));
    }

    pub fn push_history(&self, response: Result<HistoryResponse, String>) {
        self.push_history_after(Duration::ZERO, response);
    }

    pub fn push_history_after(&self, delay: Duration, response: Result<HistoryResponse, String>) {
        self.history.lock().unwrap().push_back((delay, response));
    }

    /// Every call made so far, like `progress:d1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(endpoint))
            .count()
    }

    pub fn progress_calls(&self) -> usize {
        self.calls_to("progress")
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn environment(&self) -> Result<EnvironmentInfo, ClientError> {
        self.record("environment".to_string());
        let scripted = self.environment.lock().unwrap().clone();
        match scripted {
            Some(result) => result.map_err(failure),
            None => Ok(EnvironmentInfo {
                is_hosted: false,
                downloads_enabled: true,
                deployment: None,
            }),
        }
    }

    async fn video_info(&self, url: &str) -> Result<VideoInfoResponse, ClientError> {
        self.record(format!("video_info:{}", url));
        next(&self.video_info, VideoInfoResponse::default).await
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<StartResponse, ClientError> {
        self.record(format!("start:{}", request.url));
        next(&self.start, StartResponse::default).await
    }

    async fn progress(&self, handle: &DownloadHandle) -> Result<ProgressSnapshot, ClientError> {
        self.record(format!("progress:{}", handle));
        next(&self.progress, || snapshot("downloading", Some(10.0))).await
    }

    async fn history(&self) -> Result<HistoryResponse, ClientError> {
        self.record("history".to_string());
        next(&self.history, || HistoryResponse {
            success: true,
            downloads: Vec::new(),
        })
        .await
    }
}
