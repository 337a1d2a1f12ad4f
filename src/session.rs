//! The controller behind the page. One [`Session`] tracks at most one download
//! at a time, and publishes everything the user should see as a [`ViewState`].

use std::sync::{Arc, Weak};

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::{
    api::{server_message, Backend, DownloadHandle, DownloadRequest, Phase, ProgressSnapshot, VideoMetadata},
    config::Config,
    environment::{self, Environment},
    error::ClientError,
    poller::{PollTarget, PollTask, ProgressSink, Tick},
    validate::validate_url,
    view::{HistoryView, ViewState},
};

/// How a submission settled, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The backend started a download, and it is being polled.
    Polling(DownloadHandle),
    /// Hosted mode, the video was looked up and described.
    Described(VideoMetadata),
    /// A newer submission replaced this one before the backend answered.
    Superseded,
}

#[derive(Debug, Default)]
struct State {
    environment: Environment,
    /// Bumped by every submission, responses from older ones are dropped.
    generation: u64,
    history_generation: u64,
    handle: Option<DownloadHandle>,
    last_request: Option<DownloadRequest>,
    poller: Option<PollTask>,
}

impl State {
    /// Stop tracking whatever was in flight.
    fn abandon(&mut self) -> u64 {
        self.generation += 1;
        self.handle = None;
        self.poller = None;
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    config: Config,
    state: Mutex<State>,
    view: watch::Sender<ViewState>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        Session {
            inner: Arc::new(Inner {
                backend,
                config,
                state: Mutex::new(State::default()),
                view,
            }),
        }
    }

    /// Get notified whenever the view changes.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> ViewState {
        self.inner.view.borrow().clone()
    }

    pub async fn current_handle(&self) -> Option<DownloadHandle> {
        self.inner.state.lock().await.handle.clone()
    }

    pub async fn is_polling(&self) -> bool {
        self.inner
            .state
            .lock()
            .await
            .poller
            .as_ref()
            .map_or(false, |poller| poller.is_active())
    }

    /// Learn what the deployment supports, then load the history if there is
    /// one to load.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn init(&self) -> Environment {
        let environment = environment::detect(self.inner.backend.as_ref()).await;
        self.inner.state.lock().await.environment = environment;
        self.inner
            .view
            .send_modify(|view| view.set_hosted(environment.hosted));
        if environment.hosted {
            info!("Hosted deployment, only video information is available");
        }

        if environment.downloads_enabled {
            // Failures are already logged, and the page is usable without it.
            let _ = self.refresh_history().await;
        }
        environment
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn submit(&self, raw_url: &str, format: &str) -> Result<Outcome, ClientError> {
        let url = match validate_url(raw_url) {
            Ok(url) => url,
            Err(err) => {
                let mut state = self.inner.state.lock().await;
                state.abandon();
                self.inner
                    .view
                    .send_modify(|view| view.show_error(err.user_message()));
                return Err(err);
            }
        };
        self.dispatch(DownloadRequest {
            url,
            format: format.to_string(),
        })
        .await
    }

    /// Send the last accepted request again.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn retry(&self) -> Result<Outcome, ClientError> {
        let request = self.inner.state.lock().await.last_request.clone();
        let request = request.ok_or(ClientError::NothingToRetry)?;
        self.dispatch(request).await
    }

    /// Back to the bare form. Nothing in flight is tracked any more.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        state.abandon();
        self.inner.view.send_modify(ViewState::reset);
    }

    pub async fn refresh_history(&self) -> Result<HistoryView, ClientError> {
        self.inner.refresh_history().await
    }

    async fn dispatch(&self, request: DownloadRequest) -> Result<Outcome, ClientError> {
        let (generation, hosted) = {
            let mut state = self.inner.state.lock().await;
            let generation = state.abandon();
            state.last_request = Some(request.clone());
            let hosted = state.environment.hosted;
            self.inner.view.send_modify(|view| {
                view.reset();
                view.show_in_progress(hosted.then_some("Fetching video info..."));
            });
            (generation, hosted)
        };

        if hosted {
            self.describe(request, generation).await
        } else {
            self.start(request, generation).await
        }
    }

    async fn describe(&self, request: DownloadRequest, generation: u64) -> Result<Outcome, ClientError> {
        let result = self.inner.backend.video_info(&request.url).await;

        let mut state = self.inner.state.lock().await;
        if !state.is_current(generation) {
            debug!("Discarding stale video information for {}", request.url);
            return Ok(Outcome::Superseded);
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => return self.inner.fail(&mut state, err),
        };
        match response.info {
            Some(info) if response.success => {
                self.inner
                    .view
                    .send_modify(|view| view.show_metadata(&info, &request.format));
                Ok(Outcome::Described(info))
            }
            _ => {
                let message = server_message(&response.message, &response.error)
                    .unwrap_or_else(|| "Failed to get video information".to_string());
                self.inner.fail(&mut state, ClientError::Server(message))
            }
        }
    }

    async fn start(&self, request: DownloadRequest, generation: u64) -> Result<Outcome, ClientError> {
        let result = self.inner.backend.start_download(&request).await;

        let mut state = self.inner.state.lock().await;
        if !state.is_current(generation) {
            debug!("Discarding stale download start for {}", request.url);
            return Ok(Outcome::Superseded);
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => return self.inner.fail(&mut state, err),
        };
        match response.download_id {
            Some(handle) if response.success => {
                info!("Download {} started for {}", handle, request.url);
                self.inner.view.send_modify(|view| {
                    view.show_started(response.filename.as_deref(), &request.format)
                });
                state.handle = Some(handle.clone());
                state.poller = Some(PollTask::spawn(
                    self.inner.backend.clone(),
                    Arc::new(SessionSink(Arc::downgrade(&self.inner))),
                    PollTarget {
                        handle: handle.clone(),
                        generation,
                    },
                    self.inner.config.poll_interval,
                ));
                Ok(Outcome::Polling(handle))
            }
            _ => {
                let message = server_message(&response.message, &response.error)
                    .unwrap_or_else(|| "Failed to start download".to_string());
                self.inner.fail(&mut state, ClientError::Server(message))
            }
        }
    }
}

impl Inner {
    fn fail(&self, state: &mut State, err: ClientError) -> Result<Outcome, ClientError> {
        error!("Request failed: {}", err);
        state.handle = None;
        state.poller = None;
        self.view.send_modify(|view| view.show_error(err.user_message()));
        Err(err)
    }

    async fn refresh_history(&self) -> Result<HistoryView, ClientError> {
        let tag = {
            let mut state = self.state.lock().await;
            state.history_generation += 1;
            state.history_generation
        };
        let result = self.backend.history().await;

        let state = self.state.lock().await;
        if state.history_generation != tag {
            debug!("Discarding stale history");
            return Ok(self.view.borrow().history.clone());
        }
        match result {
            Ok(response) => {
                let downloads = if response.success {
                    response.downloads
                } else {
                    Vec::new()
                };
                self.view.send_modify(|view| view.set_history(downloads));
                Ok(self.view.borrow().history.clone())
            }
            Err(err) => {
                error!("Error loading downloads: {}", err);
                Err(err)
            }
        }
    }

    async fn apply_snapshot(&self, target: &PollTarget, snapshot: ProgressSnapshot) -> Tick {
        let mut state = self.state.lock().await;
        if !state.is_current(target.generation) || state.handle.as_ref() != Some(&target.handle) {
            debug!("Discarding stale progress for {}", target.handle);
            return Tick::Stop;
        }

        match snapshot.phase() {
            Phase::Running => {
                self.view.send_modify(|view| view.apply_progress(&snapshot));
                Tick::Continue
            }
            Phase::Complete => {
                info!("Download {} complete", target.handle);
                state.handle = None;
                state.poller = None;
                self.view.send_modify(|view| {
                    view.apply_progress(&snapshot);
                    view.show_complete(&target.handle, &snapshot);
                });
                drop(state);
                let _ = self.refresh_history().await;
                Tick::Stop
            }
            Phase::Failed => {
                let message = server_message(&snapshot.message, &snapshot.error)
                    .unwrap_or_else(|| "Download failed".to_string());
                error!("Download {} failed: {}", target.handle, message);
                state.handle = None;
                state.poller = None;
                self.view.send_modify(|view| view.show_error(message));
                Tick::Stop
            }
        }
    }
}

/// Hands snapshots back to the session, unless it is gone.
struct SessionSink(Weak<Inner>);

#[async_trait::async_trait]
impl ProgressSink for SessionSink {
    async fn on_snapshot(&self, target: &PollTarget, snapshot: ProgressSnapshot) -> Tick {
        match self.0.upgrade() {
            Some(inner) => inner.apply_snapshot(target, snapshot).await,
            None => Tick::Stop,
        }
    }
}
