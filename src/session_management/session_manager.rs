use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::configuration::types::AutomationConfig;
use crate::configuration::Config;
use crate::credentials::CredentialIssuer;
use crate::error_handling::types::SessionError;
use crate::process_runner::{tail_lines, ProcessRunner};
use crate::reporting::Report;
use crate::session_management::{Phase, Session, SessionStatus};
use crate::storage::{SessionPaths, Storage};
use crate::transfer_descriptor::{build_inventory, build_parameters, total_size};

/// What the operator hands to the client: the key to authorize and where to accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareInfo {
    pub token: String,
    pub public_key: String,
    pub accept_url: String,
    pub dest_path: String,
    pub status: SessionStatus,
}

/// Connection details supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AcceptRequest {
    pub client_host: String,
    pub client_user: String,
    #[serde(default)]
    pub dest_path: Option<String>,
}

/// Everything the status page shows for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub session: Session,
    pub transfer_log: String,
    pub cleanup_log: String,
    pub report: Option<Report>,
}

/// The structure driving a session from creation to its final report.
///
/// # Fields Overview
///
/// - `storage`: where session records, logs and reports live
/// - `issuer`: generates the per-session keypair
/// - `runner`: runs the automation tool with merged, incrementally flushed logs
/// - `automation`: the automation command and its two playbooks
/// - `default_dest_path`: destination used when none is given
/// - `public_url`: base for accept links
/// - `log_tail_lines`: how many log lines a status view carries
/// - `accept_lock`: serializes the accept check-and-save
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    issuer: CredentialIssuer,
    runner: ProcessRunner,
    automation: AutomationConfig,
    default_dest_path: String,
    public_url: String,
    log_tail_lines: usize,
    accept_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self {
            storage,
            issuer: CredentialIssuer::new(config.keygen.command.clone()),
            runner: ProcessRunner::new(config.automation_timeout()),
            automation: config.automation.clone(),
            default_dest_path: config.sessions.default_dest_path.clone(),
            public_url: config.public_url(),
            log_tail_lines: config.sessions.log_tail_lines,
            accept_lock: Mutex::new(()),
        }
    }

    /// Creates a session and issues its keypair.
    ///
    /// On a key-generation failure the session directory is kept, the error
    /// is written into the record and the session stays unshareable.
    pub async fn create(
        &self,
        src_paths: Vec<String>,
        dest_path: Option<String>,
    ) -> Result<Session, SessionError> {
        let src_paths: Vec<String> = src_paths
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if src_paths.is_empty() {
            return Err(SessionError::ValidationError(
                "at least one source path is required".into(),
            ));
        }
        let dest_path = dest_path
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.default_dest_path.clone());

        let mut session = Session::new(src_paths, dest_path);
        let dir = self.storage.create_session(&session)?;
        info!(
            "Created session {} for {} source path(s)",
            session.token,
            session.src_paths.len()
        );

        match self.issuer.issue(&dir).await {
            Ok(credential) => {
                session.public_key = credential.public_key;
                self.storage.save_session(&session)?;
                Ok(session)
            }
            Err(e) => {
                error!("Session {}: {}", session.token, e);
                Err(self.record_failure(&mut session, e.into()))
            }
        }
    }

    pub fn share_info(&self, token: &str) -> Result<ShareInfo, SessionError> {
        let session = self.storage.load_session(token)?;
        if !session.has_credential() {
            return Err(SessionError::ValidationError(format!(
                "session {} has no credential to share",
                token
            )));
        }
        Ok(ShareInfo {
            accept_url: format!("{}/accept/{}", self.public_url, session.token),
            token: session.token,
            public_key: session.public_key,
            dest_path: session.dest_path,
            status: session.status,
        })
    }

    /// Records the client's details and moves the session to `starting_transfer`.
    ///
    /// Nothing is saved unless every check passes. Orchestration is not
    /// started here; see [`Dispatcher`](super::Dispatcher).
    pub fn accept(&self, token: &str, request: AcceptRequest) -> Result<Session, SessionError> {
        let _guard = self
            .accept_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut session = self.storage.load_session(token)?;
        if session.status != SessionStatus::WaitingForClient {
            return Err(SessionError::InvalidTransition {
                from: session.status,
                to: SessionStatus::StartingTransfer,
            });
        }
        let client_host = validate_client_field("client_host", &request.client_host)?;
        let client_user = validate_client_field("client_user", &request.client_user)?;
        if !session.has_credential() {
            return Err(SessionError::ValidationError(format!(
                "session {} has no credential",
                token
            )));
        }

        session.client_host = Some(client_host);
        session.client_user = Some(client_user);
        if let Some(dest) = request.dest_path.map(|d| d.trim().to_string()) {
            if !dest.is_empty() {
                session.dest_path = dest;
            }
        }
        session.advance(SessionStatus::StartingTransfer)?;
        self.storage.save_session(&session)?;
        info!(
            "Session {} accepted by {}@{}",
            token,
            session.client_user.as_deref().unwrap_or_default(),
            session.client_host.as_deref().unwrap_or_default()
        );
        Ok(session)
    }

    /// Runs every phase of an accepted session.
    pub async fn run(&self, token: &str) -> Result<Session, SessionError> {
        let session = self.storage.load_session(token)?;
        if !session.is_awaiting_start() {
            return Err(SessionError::ValidationError(format!(
                "session {} is not ready to run (status {})",
                token, session.status
            )));
        }
        self.run_from(session, Phase::Prepare).await
    }

    /// Walks the phases starting at `start`, persisting after each one.
    async fn run_from(&self, mut session: Session, start: Phase) -> Result<Session, SessionError> {
        let dir = self.storage.session_dir(&session.token)?;
        let paths = SessionPaths::new(dir);

        let mut phase = start;
        while phase != Phase::Done {
            debug!("Session {}: entering {} phase", session.token, phase);
            let outcome = match phase {
                Phase::Prepare => self.prepare(&mut session, &paths).await,
                Phase::Transfer => self.transfer(&mut session, &paths).await,
                Phase::Cleanup => self.cleanup(&mut session, &paths).await,
                Phase::Report => self
                    .storage
                    .save_report(&Report::summarize(&session))
                    .map_err(SessionError::from),
                Phase::Done => Ok(()),
            };
            if let Err(e) = outcome {
                error!("Session {}: {} phase failed: {}", session.token, phase, e);
                return Err(self.record_failure(&mut session, e));
            }
            if let Err(e) = self.storage.save_session(&session) {
                error!("Session {}: cannot persist after {}: {}", session.token, phase, e);
                return Err(e.into());
            }
            phase = phase.next();
        }

        info!(
            "Session {} finished: {} (transfer rc {:?}, cleanup rc {:?})",
            session.token, session.status, session.transfer_rc, session.cleanup_rc
        );
        Ok(session)
    }

    async fn prepare(&self, session: &mut Session, paths: &SessionPaths) -> Result<(), SessionError> {
        let (host, user) = match (&session.client_host, &session.client_user) {
            (Some(host), Some(user)) => (host.clone(), user.clone()),
            _ => {
                return Err(SessionError::ValidationError(
                    "client host and user must be recorded before preparing".into(),
                ))
            }
        };

        build_inventory(paths, &host, &user, &paths.private_key())?;
        build_parameters(
            paths,
            &session.src_paths,
            &session.dest_path,
            &user,
            &session.public_key,
        )?;

        let src_paths = session.src_paths.clone();
        let size = tokio::task::spawn_blocking(move || total_size(&src_paths))
            .await
            .map_err(|e| SessionError::ProcessError(format!("size accounting failed: {}", e)))?;
        session.expected_size_bytes = Some(size);
        session.started_at = Some(Utc::now());
        Ok(())
    }

    async fn transfer(&self, session: &mut Session, paths: &SessionPaths) -> Result<(), SessionError> {
        let args = self.playbook_args(paths, &self.automation.transfer_playbook);
        let rc = self
            .runner
            .run(&self.automation.command, &args, &paths.transfer_log())
            .await?;

        session.transfer_rc = Some(rc);
        session.finished_at = Some(Utc::now());
        session.advance(SessionStatus::from_transfer_rc(rc))?;
        info!("Session {}: transfer exited with {}", session.token, rc);
        Ok(())
    }

    async fn cleanup(&self, session: &mut Session, paths: &SessionPaths) -> Result<(), SessionError> {
        let args = self.playbook_args(paths, &self.automation.cleanup_playbook);
        let rc = self
            .runner
            .run(&self.automation.command, &args, &paths.cleanup_log())
            .await?;

        session.cleanup_rc = Some(rc);
        if rc != 0 {
            warn!(
                "Session {}: cleanup exited with {}, the key may still be authorized",
                session.token, rc
            );
        } else {
            info!("Session {}: cleanup done", session.token);
        }
        Ok(())
    }

    fn playbook_args(&self, paths: &SessionPaths, playbook: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            paths.inventory().to_string_lossy().into_owned(),
            playbook.to_string_lossy().into_owned(),
            "--extra-vars".to_string(),
            format!("@{}", paths.parameters().display()),
        ]
    }

    pub fn status(&self, token: &str) -> Result<StatusView, SessionError> {
        let session = self.storage.load_session(token)?;
        let paths = SessionPaths::new(self.storage.session_dir(token)?);
        let report = self.storage.load_report(token)?;
        Ok(StatusView {
            session,
            transfer_log: tail_lines(&paths.transfer_log(), self.log_tail_lines),
            cleanup_log: tail_lines(&paths.cleanup_log(), self.log_tail_lines),
            report,
        })
    }

    /// Runs cleanup and the report for sessions whose transfer finished but
    /// whose cleanup never ran. Returns how many were completed.
    pub async fn resume_interrupted(&self) -> Result<usize, SessionError> {
        let pending: Vec<Session> = self
            .storage
            .list_sessions()?
            .into_iter()
            .filter(Session::is_awaiting_cleanup)
            .collect();
        if pending.is_empty() {
            debug!("No interrupted sessions to resume");
            return Ok(0);
        }

        info!("Resuming cleanup for {} interrupted session(s)", pending.len());
        let mut resumed = 0;
        for session in pending {
            let token = session.token.clone();
            match self.run_from(session, Phase::Cleanup).await {
                Ok(_) => resumed += 1,
                Err(e) => error!("Session {}: resume failed: {}", token, e),
            }
        }
        Ok(resumed)
    }

    /// Tokens of accepted sessions whose orchestration never began.
    pub fn pending_runs(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .storage
            .list_sessions()?
            .into_iter()
            .filter(Session::is_awaiting_start)
            .map(|session| session.token)
            .collect())
    }

    /// Records an error on sessions whose transfer was cut off mid-run.
    ///
    /// The transfer is not retried; the record tells the operator the key may
    /// still be authorized on the client.
    pub fn fail_interrupted_transfers(&self) -> Result<usize, SessionError> {
        let interrupted: Vec<Session> = self
            .storage
            .list_sessions()?
            .into_iter()
            .filter(Session::is_interrupted_in_transfer)
            .collect();
        for mut session in interrupted.iter().cloned() {
            warn!(
                "Session {}: transfer was interrupted, the key may still be authorized",
                session.token
            );
            self.record_failure(
                &mut session,
                SessionError::ProcessError("transfer interrupted before it finished".into()),
            );
        }
        Ok(interrupted.len())
    }

    /// Writes `err` into the stored record of `token`, then hands it back.
    ///
    /// Used when a session cannot be orchestrated at all, so it does not sit
    /// in `starting_transfer` with nothing explaining why.
    pub fn mark_failed(&self, token: &str, err: SessionError) -> SessionError {
        match self.storage.load_session(token) {
            Ok(mut session) => {
                error!("Session {}: {}", token, err);
                self.record_failure(&mut session, err)
            }
            Err(load_err) => {
                error!(
                    "Session {}: cannot record error '{}': {}",
                    token, err, load_err
                );
                err
            }
        }
    }

    /// Writes `err` into the session record, then hands it back.
    fn record_failure(&self, session: &mut Session, err: SessionError) -> SessionError {
        session.error = Some(err.to_string());
        if let Err(save_err) = self.storage.save_session(session) {
            error!(
                "Session {}: failed to record error '{}': {}",
                session.token, err, save_err
            );
        }
        err
    }
}

fn validate_client_field(name: &str, value: &str) -> Result<String, SessionError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SessionError::ValidationError(format!("{} is required", name)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(SessionError::ValidationError(format!(
            "{} must not contain whitespace",
            name
        )));
    }
    Ok(value.to_string())
}
