//! The serialized studio worker.
//!
//! The external object model is callable from one logical caller at a
//! time, so a dedicated OS thread owns the [`StudioSession`] for the
//! process lifetime. Every Get, Set, and poll tick is submitted as a job
//! through one bounded channel and executed strictly in submission order;
//! nothing ever runs interleaved. Calls into the external object are
//! blocking and non-cancellable; no timeout is attempted mid-call.

use std::thread;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use showctl_core::bridge::Bridge;
use showctl_core::error::AcquireError;
use showctl_core::studio::StudioSession;

/// How many submitted jobs may queue before senders wait.
const JOB_QUEUE_DEPTH: usize = 64;

type Job = Box<dyn FnOnce(&mut StudioSession) + Send>;

/// The worker thread is gone; no further jobs can run.
#[derive(Debug, Error)]
#[error("studio worker has terminated")]
pub struct WorkerGone;

/// Failure to bring the worker up.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error("failed to spawn studio worker thread: {0}")]
    Thread(#[from] std::io::Error),
    #[error("studio worker died during startup")]
    Startup,
}

/// Cloneable handle submitting jobs to the single worker thread.
#[derive(Clone)]
pub struct StudioHandle {
    job_tx: mpsc::Sender<Job>,
}

impl StudioHandle {
    /// Spawn the worker thread and acquire the studio session on it.
    ///
    /// Acquisition happens on the worker thread itself (the session never
    /// changes threads) and its outcome is reported before this returns,
    /// so a daemon can refuse to start when the studio is unreachable.
    pub async fn spawn(bridge: Box<dyn Bridge>) -> Result<Self, SpawnError> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), AcquireError>>();
        let (job_tx, mut job_rx) = mpsc::channel::<Job>(JOB_QUEUE_DEPTH);

        thread::Builder::new()
            .name("studio-worker".to_string())
            .spawn(move || {
                let mut session = match StudioSession::acquire(bridge) {
                    Ok(session) => {
                        let _ = ready_tx.send(Ok(()));
                        session
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("studio session acquired, worker running");

                // Jobs arrive through one channel and run one at a time,
                // in submission order.
                while let Some(job) = job_rx.blocking_recv() {
                    job(&mut session);
                }
                debug!("job channel closed, studio worker exiting");
            })?;

        ready_rx.await.map_err(|_| SpawnError::Startup)??;
        Ok(Self { job_tx })
    }

    /// Run a closure against the session on the worker thread and await
    /// its result.
    pub async fn with_session<R, F>(&self, f: F) -> Result<R, WorkerGone>
    where
        F: FnOnce(&mut StudioSession) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply_tx.send(f(session));
        });
        self.job_tx.send(job).await.map_err(|_| WorkerGone)?;
        reply_rx.await.map_err(|_| WorkerGone)
    }
}
