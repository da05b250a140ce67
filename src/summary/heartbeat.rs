//! Rotating "still working" status updates while a job is outstanding.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::BotError;
use crate::slack::surface::{OutputSurface, SurfaceHandle};

pub const INITIAL_STATUS: &str = ":safari-loading: Reading the thread...";

pub const STATUS_PHRASES: &[&str] = &[
    ":safari-loading: Still working on it...",
    ":safari-loading: Reading between the lines...",
    ":safari-loading: Counting the reactions...",
    ":safari-loading: Asking the model nicely...",
    ":safari-loading: Untangling the replies...",
    ":safari-loading: Almost there, hopefully...",
    ":safari-loading: Brewing a summary...",
];

#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub phrases: Vec<String>,
}

impl HeartbeatSettings {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            phrases: STATUS_PHRASES.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// Picks the index of the next status phrase from a random `roll`.
///
/// Never returns `previous` when the pool has more than one entry.
#[must_use]
pub fn pick_status(pool_len: usize, previous: Option<usize>, roll: usize) -> usize {
    match (pool_len, previous) {
        (0 | 1, _) => 0,
        (len, Some(prev)) if prev < len => {
            let idx = roll % (len - 1);
            if idx >= prev { idx + 1 } else { idx }
        }
        (len, _) => roll % len,
    }
}

/// A running heartbeat task. Stop it before the job's terminal write.
pub struct Heartbeat {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Opens `surface` with the initial status and starts the heartbeat on it.
    ///
    /// # Errors
    ///
    /// Returns the surface's error if the initial write fails; no task is spawned.
    pub async fn open(
        surface: Arc<dyn OutputSurface>,
        settings: HeartbeatSettings,
    ) -> Result<(Self, SurfaceHandle), BotError> {
        let handle = surface.open(INITIAL_STATUS).await?;
        let heartbeat = Self::start(surface, handle.clone(), settings);
        Ok((heartbeat, handle))
    }

    /// Spawns the periodic task. The first phrase is written one interval from now.
    #[must_use]
    pub fn start(
        surface: Arc<dyn OutputSurface>,
        handle: SurfaceHandle,
        settings: HeartbeatSettings,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let period = settings.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous: Option<usize> = None;

            loop {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if settings.phrases.is_empty() {
                    continue;
                }
                let roll = rand::thread_rng().r#gen::<usize>();
                let idx = pick_status(settings.phrases.len(), previous, roll);
                previous = Some(idx);

                // An in-flight write is allowed to finish; stop() waits for it.
                if let Err(e) = surface.update(&handle, &settings.phrases[idx]).await {
                    warn!("Heartbeat update failed: {}", e);
                }
            }
            debug!("Heartbeat stopped");
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Cancels the task and waits for it to exit. No heartbeat write happens
    /// after this returns. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Heartbeat task ended abnormally: {}", e);
            }
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
