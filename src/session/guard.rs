use super::controller::SessionController;
use tracing::{debug, warn};

/// Completes the session if its owner is dropped mid-interview
///
/// Dropping cannot await, so completion is spawned onto the current runtime.
/// Outside a runtime the session is left for the safety timer or an
/// operator to complete.
pub struct SessionGuard {
    controller: Option<SessionController>,
}

impl SessionGuard {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller: Some(controller),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(controller) = self.controller.take() else {
            return;
        };

        if controller.snapshot().phase.is_terminal() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Session owner dropped, completing in background");
                handle.spawn(async move {
                    if let Err(e) = controller.teardown().await {
                        warn!("Teardown completion failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("Session owner dropped outside a runtime; session left incomplete"),
        }
    }
}
