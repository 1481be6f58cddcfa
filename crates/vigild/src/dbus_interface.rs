use tokio::sync::Mutex;
use vigild::{SessionError, SessionHandle, SessionRegistry, Verifier};
use zbus::interface;

/// D-Bus interface for the Vigil liveness daemon.
///
/// Bus name: org.freedesktop.Vigil1
/// Object path: /org/freedesktop/Vigil1
pub struct VigilService {
    verifier: Verifier,
    sessions: Mutex<SessionRegistry>,
    camera_device: String,
    match_url: String,
}

impl VigilService {
    pub fn new(verifier: Verifier, camera_device: String, match_url: String) -> Self {
        Self {
            verifier,
            sessions: Mutex::new(SessionRegistry::default()),
            camera_device,
            match_url,
        }
    }

    async fn session(&self, session_id: &str) -> zbus::fdo::Result<SessionHandle> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("unknown session: {session_id}")))
    }
}

#[interface(name = "org.freedesktop.Vigil1")]
impl VigilService {
    /// Start liveness verification for a voter. Returns the session ID.
    async fn start_session(&self, voter_id: &str) -> zbus::fdo::Result<String> {
        tracing::info!(voter_id, "start_session requested");
        let handle = self.verifier.start_session(voter_id).map_err(|e| match e {
            SessionError::Busy => zbus::fdo::Error::LimitsExceeded(e.to_string()),
            SessionError::EmptyIdentity => zbus::fdo::Error::InvalidArgs(e.to_string()),
            SessionError::Abandoned => zbus::fdo::Error::Failed(e.to_string()),
        })?;

        let id = handle.id().to_string();
        self.sessions.lock().await.insert(handle);
        Ok(id)
    }

    /// Cancel a running session. Returns false if it had already finished.
    /// Finished sessions stay addressable for a short retention window.
    async fn cancel(&self, session_id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(session_id, "cancel requested");
        Ok(self.session(session_id).await?.cancel())
    }

    /// Block until the session is terminal and return the result as JSON.
    /// The session is forgotten afterwards.
    async fn await_result(&self, session_id: &str) -> zbus::fdo::Result<String> {
        let handle = self.session(session_id).await?;
        let result = handle
            .wait()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        self.sessions.lock().await.remove(session_id);

        serde_json::to_string(&result).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let mut sessions = self.sessions.lock().await;
        sessions.prune();
        let active = sessions.active_ids();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": self.camera_device,
            "camera_busy": self.verifier.is_busy(),
            "match_url": self.match_url,
            "active_sessions": active,
            "tracked_sessions": sessions.len(),
        })
        .to_string())
    }
}
