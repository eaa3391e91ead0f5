//! Lazily started, process-wide renderer handle.
//!
//! The first [`RendererPool::acquire`] publishes a shared launch future; every
//! caller arriving while it runs awaits that same future, so at most one
//! launch is in flight. A failed attempt resets the pool so the next request
//! tries again.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::LaunchError;
use crate::rendering::{Launcher, Renderer};

type LaunchResult = Result<Arc<dyn Renderer>, LaunchError>;
type LaunchFuture = Shared<BoxFuture<'static, LaunchResult>>;

enum PoolState {
    Uninitialized,
    Initializing { attempt: u64, launch: LaunchFuture },
    Ready(Arc<dyn Renderer>),
}

/// Observable pool state, for status output and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Uninitialized,
    Initializing,
    Ready,
}

pub struct RendererPool {
    launcher: Arc<dyn Launcher>,
    state: Mutex<PoolState>,
    attempts: AtomicU64,
}

impl RendererPool {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            state: Mutex::new(PoolState::Uninitialized),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the shared renderer, launching it if nobody has yet.
    ///
    /// All callers waiting on the same attempt see the same result.
    pub async fn acquire(&self) -> LaunchResult {
        let (attempt, launch) = {
            let mut state = self.state.lock().await;
            match &*state {
                PoolState::Ready(renderer) => return Ok(renderer.clone()),
                PoolState::Initializing { attempt, launch } => {
                    tracing::debug!(attempt, "Waiting for renderer launch in progress");
                    (*attempt, launch.clone())
                }
                PoolState::Uninitialized => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(attempt, "Starting renderer");
                    let launch = self.start_launch();
                    *state = PoolState::Initializing {
                        attempt,
                        launch: launch.clone(),
                    };
                    (attempt, launch)
                }
            }
        };

        let result = launch.await;

        let mut state = self.state.lock().await;
        // A newer attempt may already be published; leave it alone.
        if matches!(&*state, PoolState::Initializing { attempt: current, .. } if *current == attempt)
        {
            *state = match &result {
                Ok(renderer) => PoolState::Ready(renderer.clone()),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Renderer launch failed, will retry on next request");
                    PoolState::Uninitialized
                }
            };
        }

        result
    }

    pub async fn status(&self) -> PoolStatus {
        match &*self.state.lock().await {
            PoolState::Uninitialized => PoolStatus::Uninitialized,
            PoolState::Initializing { .. } => PoolStatus::Initializing,
            PoolState::Ready(_) => PoolStatus::Ready,
        }
    }

    /// Launch attempts started so far
    pub fn launch_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    // The launch runs as its own task so it completes even if every
    // request waiting on it is dropped.
    fn start_launch(&self) -> LaunchFuture {
        let launcher = self.launcher.clone();
        let task = tokio::spawn(async move { launcher.launch().await });
        async move {
            task.await.unwrap_or_else(|e| {
                Err(LaunchError::LaunchFailed(format!("launch task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}
