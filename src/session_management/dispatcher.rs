//! Background queue running accepted sessions off the request path.
//!
//! The worker loop receives jobs over an unbounded channel and spawns one task
//! per job, so independent sessions are orchestrated concurrently while each
//! session's phases stay sequential.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

use crate::error_handling::types::SessionError;
use crate::session_management::{Session, SessionManager};

type Reply = oneshot::Sender<Result<Session, SessionError>>;

struct Job {
    token: String,
    reply: Option<Reply>,
}

/// Handle for submitting sessions to the worker loop. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    jobs: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Starts the worker loop. It stops once every `Dispatcher` clone is dropped.
    pub fn spawn(manager: Arc<SessionManager>) -> (Dispatcher, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker_loop(manager, rx));
        (Dispatcher { jobs: tx }, handle)
    }

    /// Queues orchestration of `token` and returns immediately.
    pub fn enqueue(&self, token: &str) -> Result<(), SessionError> {
        self.submit(token, None)
    }

    /// Queues orchestration of `token` and waits for its outcome.
    pub async fn enqueue_and_wait(&self, token: &str) -> Result<Session, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(token, Some(reply_tx))?;
        reply_rx.await.map_err(|_| SessionError::QueueClosed)?
    }

    fn submit(&self, token: &str, reply: Option<Reply>) -> Result<(), SessionError> {
        self.jobs
            .send(Job {
                token: token.to_string(),
                reply,
            })
            .map_err(|_| {
                error!("Orchestration queue closed, dropping session {}", token);
                SessionError::QueueClosed
            })?;
        debug!("Queued session {}", token);
        Ok(())
    }
}

async fn worker_loop(manager: Arc<SessionManager>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    info!("Orchestration worker started");
    while let Some(job) = jobs.recv().await {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let run = {
                let manager = Arc::clone(&manager);
                let token = job.token.clone();
                tokio::spawn(async move { manager.run(&token).await })
            };
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => Err(manager.mark_failed(&job.token, task_failure(&job.token, e))),
            };
            if let Err(e) = &outcome {
                error!("Session {}: orchestration failed: {}", job.token, e);
            }
            if let Some(reply) = job.reply {
                // the waiter may have gone away
                let _ = reply.send(outcome);
            }
        });
    }
    info!("Orchestration worker stopped");
}

/// Turns a panicked or cancelled orchestration task into a session error.
fn task_failure(token: &str, e: JoinError) -> SessionError {
    error!("Session {}: orchestration task died: {}", token, e);
    SessionError::ProcessError(format!("orchestration task failed: {}", e))
}

#[cfg(test)]
impl Dispatcher {
    /// A handle whose worker is already gone.
    pub(crate) fn closed() -> Dispatcher {
        let (tx, _) = mpsc::unbounded_channel();
        Dispatcher { jobs: tx }
    }
}
