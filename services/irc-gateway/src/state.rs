//! Process-wide gateway state: the session/chat hubs an IRC connection
//! needs, built once at startup.
//!
//! This gateway owns its own `SessionRegistry`/`ChatRouter` rather than
//! sharing the binary-protocol server's — the two processes interoperate
//! only through whatever `Repository` backend they're both pointed at.
//! A real deployment backs both with the same durable store; the
//! in-memory default here means IRC clients see each other live but
//! won't see a TCP/HTTP client's channel traffic until the collaborator
//! layer is backed by shared storage instead of `MemoryRepository`.

use std::sync::Arc;

use concerto_collab::memory::{MemoryRepository, PlainPasswordVerifier};
use concerto_collab::{PasswordVerifier, Repository};
use concerto_core::{ChatRouter, SessionRegistry};

#[derive(Clone)]
pub struct GatewayState {
    pub sessions: SessionRegistry,
    pub chat: Arc<ChatRouter>,
    pub repo: Arc<dyn Repository + Send + Sync>,
    pub password_verifier: Arc<dyn PasswordVerifier + Send + Sync>,
}

impl GatewayState {
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(MemoryRepository::new()), Arc::new(PlainPasswordVerifier))
    }

    pub fn with_collaborators(
        repo: Arc<dyn Repository + Send + Sync>,
        password_verifier: Arc<dyn PasswordVerifier + Send + Sync>,
    ) -> Self {
        let sessions = SessionRegistry::new();
        let chat = Arc::new(ChatRouter::new(sessions.clone(), repo.clone()));
        Self {
            sessions,
            chat,
            repo,
            password_verifier,
        }
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}
