use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::streaming::SessionId;

/// A live stream session as seen by the registry
#[derive(Clone, Debug)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub conversation_id: String,
    pub started_at: Instant,
    cancel: CancellationToken,
}

/// Tracks cancellation handles of in-flight stream sessions
///
/// Sessions are independent: registering a new session for a conversation
/// never touches the ones already running for it. Entries are removed when
/// their session reaches a terminal state.
///
/// Thread-safe and designed for concurrent access across async tasks.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, ActiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session, returning its id and a fresh token
    pub fn register(&self, conversation_id: &str) -> (SessionId, CancellationToken) {
        let cancel = CancellationToken::new();
        let session_id = self.register_with_token(conversation_id, cancel.clone());
        (session_id, cancel)
    }

    /// Register a new session that is cancelled through `cancel`
    pub fn register_with_token(&self, conversation_id: &str, cancel: CancellationToken) -> SessionId {
        let session_id = Uuid::new_v4();

        tracing::debug!(
            session_id = %session_id,
            conversation_id = %conversation_id,
            "Registering stream session"
        );

        self.sessions.insert(
            session_id,
            ActiveSession {
                session_id,
                conversation_id: conversation_id.to_string(),
                started_at: Instant::now(),
                cancel,
            },
        );
        session_id
    }

    /// Forget a session, returning whether it was registered
    pub fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Cancel one session, returning whether it was registered
    pub fn cancel(&self, session_id: &SessionId) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every session streaming into a conversation
    pub fn cancel_conversation(&self, conversation_id: &str) -> usize {
        let mut cancelled = 0;
        for session in self.sessions.iter() {
            if session.conversation_id == conversation_id {
                session.cancel.cancel();
                cancelled += 1;
            }
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            cancelled = cancelled,
            "Cancelled conversation sessions"
        );
        cancelled
    }

    /// Cancel every registered session
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for session in self.sessions.iter() {
            session.cancel.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Snapshot of registered sessions
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let registry = SessionRegistry::new();
        let (id, token) = registry.register("conv-1");

        assert_eq!(registry.len(), 1);
        assert!(!token.is_cancelled());
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sessions_for_same_conversation_are_independent() {
        let registry = SessionRegistry::new();
        let (first, first_token) = registry.register("conv-1");
        let (_, second_token) = registry.register("conv-1");

        assert!(!first_token.is_cancelled());
        assert!(registry.cancel(&first));
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
    }

    #[test]
    fn test_cancel_conversation() {
        let registry = SessionRegistry::new();
        let (_, a) = registry.register("conv-1");
        let (_, b) = registry.register("conv-1");
        let (_, c) = registry.register("conv-2");

        assert_eq!(registry.cancel_conversation("conv-1"), 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(!c.is_cancelled());
        assert_eq!(registry.cancel_conversation("missing"), 0);
    }

    #[test]
    fn test_cancel_all() {
        let registry = SessionRegistry::new();
        let (_, a) = registry.register("conv-1");
        let (_, b) = registry.register("conv-2");

        assert_eq!(registry.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(!registry.cancel(&Uuid::new_v4()));
    }

    #[test]
    fn test_active_sessions_snapshot() {
        let registry = SessionRegistry::new();
        let (id, _) = registry.register("conv-9");

        let sessions = registry.active_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
        assert_eq!(sessions[0].conversation_id, "conv-9");
    }
}
