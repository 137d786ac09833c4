//! Session list, session switching and deletion against the backend.

use crate::chat::{ChatController, NoticeLevel, UiEvent};
use crate::core::error::ChatError;
use crate::core::session::SessionSummary;

impl ChatController {
    /// Re-fetches the session list. A failure leaves the current list in place
    /// and is only logged.
    pub async fn refresh_sessions(&self) -> Vec<SessionSummary> {
        match self.backend.list_sessions(self.session_list_limit).await {
            Ok(sessions) => {
                let active = {
                    let mut state = self.lock_state();
                    state.sessions = sessions.clone();
                    state.session_id.clone()
                };
                self.emit(UiEvent::SessionsUpdated {
                    sessions: sessions.clone(),
                    active,
                });
                sessions
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh session list");
                self.sessions()
            }
        }
    }

    /// Switches to session `id`, replacing the identity and the whole log.
    pub async fn load_session(&self, id: &str) -> Result<(), ChatError> {
        let messages = match self.backend.get_session(id).await {
            Ok(m) => m,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.identity.adopt(id).await {
            return self.fail(e);
        }
        tracing::debug!(session_id = %id, messages = messages.len(), "session loaded");
        self.replace_session(id.to_string(), messages);
        Ok(())
    }

    /// Deletes session `id`; deleting the active session starts a new one.
    pub async fn delete_session(&self, id: &str) -> Result<(), ChatError> {
        if let Err(e) = self.backend.delete_session(id).await {
            return self.fail(e);
        }
        self.refresh_sessions().await;
        if self.session_id() == id {
            self.new_chat().await?;
        }
        self.notify(NoticeLevel::Info, "Session deleted.");
        Ok(())
    }
}
