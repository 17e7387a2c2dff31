use std::sync::Arc;

use log::{info, warn};

use crate::configuration::Config;
use crate::error_handling::types::ControllerError;
use crate::session_management::{Dispatcher, SessionManager};
use crate::storage::FileStorage;
use crate::web_interface::WebServer;

/// Wires the store, the orchestrator, the worker queue and the web interface
/// from one loaded configuration.
pub struct Controller {
    config: Config,
    manager: Arc<SessionManager>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        let storage = Arc::new(FileStorage::new(&config.storage.sessions_dir)?);
        let manager = Arc::new(SessionManager::new(storage, &config));
        info!(
            "Controller ready, sessions under {}",
            config.storage.sessions_dir.display()
        );
        Ok(Self { config, manager })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Finishes sessions interrupted between their transfer and their cleanup.
    pub async fn recover(&self) -> Result<usize, ControllerError> {
        if !self.config.sessions.resume_cleanup_on_start {
            info!("Startup cleanup recovery disabled");
            return Ok(0);
        }
        Ok(self.manager.resume_interrupted().await?)
    }

    /// Queues sessions accepted before a restart that never started, and
    /// records an error on those whose transfer was cut off.
    pub fn requeue(&self, dispatcher: &Dispatcher) -> Result<usize, ControllerError> {
        let interrupted = self.manager.fail_interrupted_transfers()?;
        if interrupted > 0 {
            warn!("Marked {} interrupted transfer(s) as failed", interrupted);
        }

        let mut queued = 0;
        for token in self.manager.pending_runs()? {
            match dispatcher.enqueue(&token) {
                Ok(()) => queued += 1,
                Err(e) => {
                    self.manager.mark_failed(&token, e);
                }
            }
        }
        if queued > 0 {
            info!("Requeued {} accepted session(s)", queued);
        }
        Ok(queued)
    }

    /// Recovers interrupted sessions, then serves the web interface.
    pub async fn run(&self) -> Result<(), ControllerError> {
        for playbook in [
            &self.config.automation.transfer_playbook,
            &self.config.automation.cleanup_playbook,
        ] {
            if !playbook.is_file() {
                warn!("Playbook {} does not exist", playbook.display());
            }
        }

        let resumed = self.recover().await?;
        if resumed > 0 {
            info!("Completed cleanup of {} interrupted session(s)", resumed);
        }

        let (dispatcher, _worker) = Dispatcher::spawn(self.manager.clone());
        self.requeue(&dispatcher)?;
        let server = WebServer::new(self.manager.clone(), dispatcher, self.config.public_url());
        server
            .start(&self.config.server.bind_address, self.config.server.port)
            .await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error_handling::types::ConfigError;
    use crate::session_management::SessionStatus;
    use crate::storage::Storage;
    use crate::test_support::{fake_automation, fake_keygen};
    use crate::session_management::session_manager::AcceptRequest;
    use tempfile::TempDir;

    fn request() -> AcceptRequest {
        AcceptRequest {
            client_host: "10.0.0.5".into(),
            client_user: "u".into(),
            dest_path: None,
        }
    }

    fn config(sessions: &std::path::Path, tools: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.sessions_dir = sessions.join("store");
        config.keygen.command = fake_keygen(tools);
        config.automation.command = fake_automation(tools, 0, 0).0;
        config
    }

    #[test]
    fn test_new_creates_sessions_dir() {
        let sessions = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();

        let controller = Controller::new(config(sessions.path(), tools.path())).unwrap();

        assert!(sessions.path().join("store").is_dir());
        assert_eq!(controller.config().server.port, 5000);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let sessions = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let mut config = config(sessions.path(), tools.path());
        config.sessions.log_tail_lines = 0;

        assert!(matches!(
            Controller::new(config),
            Err(ControllerError::ConfigurationError(ConfigError::NotInRange(_)))
        ));
    }

    #[tokio::test]
    async fn test_recover_follows_configuration() {
        let sessions = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let config = config(sessions.path(), tools.path());
        let storage = FileStorage::new(&config.storage.sessions_dir).unwrap();

        // leave one session between its transfer and its cleanup
        let controller = Controller::new(config.clone()).unwrap();
        let session = controller
            .manager
            .create(vec!["/a".into()], None)
            .await
            .unwrap();
        controller
            .manager
            .accept(&session.token, request())
            .unwrap();
        let mut session = controller.manager.run(&session.token).await.unwrap();
        session.cleanup_rc = None;
        storage.save_session(&session).unwrap();

        let mut disabled = config.clone();
        disabled.sessions.resume_cleanup_on_start = false;
        assert_eq!(Controller::new(disabled).unwrap().recover().await.unwrap(), 0);
        assert!(storage.load_session(&session.token).unwrap().cleanup_rc.is_none());

        assert_eq!(controller.recover().await.unwrap(), 1);
        let recovered = storage.load_session(&session.token).unwrap();
        assert_eq!(recovered.cleanup_rc, Some(0));
        assert_eq!(recovered.status, SessionStatus::TransferSuccess);
    }

    #[tokio::test]
    async fn test_requeue_runs_stranded_sessions() {
        let sessions = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let config = config(sessions.path(), tools.path());
        let storage = FileStorage::new(&config.storage.sessions_dir).unwrap();
        let controller = Controller::new(config).unwrap();

        // accepted, then the process went away before the worker picked it up
        let stranded = controller
            .manager
            .create(vec!["/a".into()], None)
            .await
            .unwrap();
        controller
            .manager
            .accept(&stranded.token, request())
            .unwrap();

        // accepted and started, then cut off mid-transfer
        let cut_off = controller
            .manager
            .create(vec!["/b".into()], None)
            .await
            .unwrap();
        let mut cut_off = controller.manager.accept(&cut_off.token, request()).unwrap();
        cut_off.started_at = Some(chrono::Utc::now());
        storage.save_session(&cut_off).unwrap();

        assert_eq!(controller.requeue(&Dispatcher::closed()).unwrap(), 0);
        let refused = storage.load_session(&stranded.token).unwrap();
        assert_eq!(refused.error.as_deref(), Some("Orchestration queue is closed"));
        let marked = storage.load_session(&cut_off.token).unwrap();
        assert!(marked.error.unwrap().contains("interrupted"));

        // a fresh stranded session goes through once a worker is available
        let stranded = controller
            .manager
            .create(vec!["/c".into()], None)
            .await
            .unwrap();
        controller
            .manager
            .accept(&stranded.token, request())
            .unwrap();
        let (dispatcher, _worker) = Dispatcher::spawn(controller.manager.clone());
        assert_eq!(controller.requeue(&dispatcher).unwrap(), 1);

        for _ in 0..100 {
            if storage.load_session(&stranded.token).unwrap().cleanup_rc.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let done = storage.load_session(&stranded.token).unwrap();
        assert_eq!(done.status, SessionStatus::TransferSuccess);
        assert_eq!(done.cleanup_rc, Some(0));
        assert!(controller.manager.pending_runs().unwrap().is_empty());
    }
}
