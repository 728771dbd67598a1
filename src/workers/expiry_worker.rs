use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::config::AppState;
use crate::repositories::{AuthRequestStore, AuthorizationCodeStore, PasskeySessionStore};

/// Background sweep for expired transient state
///
/// Unconsumed auth-request contexts, authorization codes and passkey
/// sessions are invisible past their expiry but still occupy rows; this
/// worker purges them at a configurable interval. Errors are logged and
/// never crash the loop.
pub struct ExpiryWorker {
    auth_requests: Arc<dyn AuthRequestStore>,
    authorization_codes: Arc<dyn AuthorizationCodeStore>,
    passkey_sessions: Arc<dyn PasskeySessionStore>,
    interval_secs: u64,
}

impl ExpiryWorker {
    pub fn new(state: &AppState) -> Self {
        Self {
            auth_requests: state.auth_requests.clone(),
            authorization_codes: state.authorization_codes.clone(),
            passkey_sessions: state.passkey_sessions.clone(),
            interval_secs: state.config.expiry_sweep_interval_secs,
        }
    }

    /// Run indefinitely until the task is cancelled.
    pub async fn run(&self) {
        tracing::info!(
            "Expiry worker started, sweeping every {} seconds",
            self.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.interval_secs));

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        match self.auth_requests.delete_expired().await {
            Ok(removed) if removed > 0 => {
                tracing::info!("Expiry worker removed {} auth request contexts", removed)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Auth request sweep failed: {}", e),
        }

        match self.authorization_codes.sweep_expired().await {
            Ok(removed) if removed > 0 => {
                tracing::info!("Expiry worker removed {} authorization codes", removed)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Authorization code sweep failed: {}", e),
        }

        match self.passkey_sessions.delete_expired_sessions().await {
            Ok(removed) if removed > 0 => {
                tracing::info!("Expiry worker removed {} passkey sessions", removed)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Passkey session sweep failed: {}", e),
        }
    }
}

/// Spawn the expiry worker as a background task.
pub fn spawn_expiry_worker(state: &AppState) -> tokio::task::JoinHandle<()> {
    let worker = ExpiryWorker::new(state);
    tokio::spawn(async move {
        worker.run().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OAuthParameters;
    use crate::test_support::{test_app, test_state};

    #[tokio::test]
    async fn test_sweep_purges_expired_contexts() {
        let mut state = test_state(test_app());
        state.auth_requests =
            Arc::new(crate::repositories::MemoryAuthRequestStore::new(-1));

        let handle = state
            .auth_requests
            .add_request(&OAuthParameters::default())
            .await
            .unwrap();

        let worker = ExpiryWorker::new(&state);
        worker.sweep().await;

        assert!(state.auth_requests.get_request(&handle).await.unwrap().is_none());
    }
}
