//! Reconciliation on auth push events.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::SessionController;

/// Handle to a running auth-event subscription.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe)) stops
/// the background task and releases the channel.
#[derive(Debug)]
pub struct AuthListener {
    task: JoinHandle<()>,
}

impl AuthListener {
    /// Stop reacting to auth events.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the background task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AuthListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SessionController {
    /// Re-run [`check_user`](Self::check_user) whenever the auth provider
    /// reports a session change.
    ///
    /// Event payloads are ignored; the session is always re-resolved. Must be
    /// called from within a tokio runtime.
    #[must_use = "dropping the listener stops it immediately"]
    pub fn listen(self: &Arc<Self>) -> AuthListener {
        let mut events = self.auth.subscribe();
        let controller = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(kind = ?event.kind, "Auth state changed");
                        controller.check_user().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth event listener lagged");
                        controller.check_user().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Auth event channel closed");
                        break;
                    }
                }
            }
        });

        AuthListener { task }
    }
}
