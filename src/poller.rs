use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{Backend, DownloadHandle, ProgressSnapshot};

/// The download being polled, tagged with the submission it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub handle: DownloadHandle,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Receives the snapshots a poller collects.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync + 'static {
    async fn on_snapshot(&self, target: &PollTarget, snapshot: ProgressSnapshot) -> Tick;
}

/// A running poll loop. Dropping the task stops the loop, so whoever owns the
/// task owns the timer.
#[derive(Debug)]
pub struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    pub fn spawn<S: ProgressSink>(
        backend: Arc<dyn Backend>,
        sink: Arc<S>,
        target: PollTarget,
        period: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll(backend, sink, target, period, token.clone()));
        PollTask { token, handle }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[tracing::instrument(level = "debug", skip(backend, sink, token), fields(handle = %target.handle))]
async fn poll<S: ProgressSink>(
    backend: Arc<dyn Backend>,
    sink: Arc<S>,
    target: PollTarget,
    period: Duration,
    token: CancellationToken,
) {
    // Like a browser interval, the first check happens one period in.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = backend.progress(&target.handle) => result,
        };

        // A missed beat is not fatal, we just try again next tick.
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Error checking progress: {}", err);
                continue;
            }
        };
        if !snapshot.success {
            debug!("Progress check was not successful: {:?}", snapshot.status);
            continue;
        }

        if sink.on_snapshot(&target, snapshot).await == Tick::Stop {
            break;
        }
    }
    debug!("Stopped polling");
}
