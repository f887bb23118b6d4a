//! Process-wide membership set of authenticated sessions, indexed by
//! id, name, and token. Holds `Arc<Session>` handles so
//! fan-out callers never need a back-pointer into the registry
//! itself — only the stable `UserId`.

use std::collections::HashMap;
use std::sync::Arc;

use concerto_protocol::{ResponseId, ResponsePayload};
use tokio::sync::RwLock;

use crate::ids::UserId;
use crate::session::Session;

fn safe_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<UserId, Arc<Session>>,
    by_name: HashMap<String, UserId>,
    by_token: HashMap<String, UserId>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session`, displacing and returning any prior session
    /// with the same id (the caller is responsible for closing it —
    /// the login-displacement announcement must happen *before* this
    /// call so it happens-before the new session's `LOGIN_REPLY`).
    pub async fn append(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut inner = self.inner.write().await;
        let previous = inner.by_id.remove(&session.id);
        if let Some(previous) = &previous {
            inner.by_name.remove(&safe_name(&previous.name));
            if let Some(token) = inner
                .by_token
                .iter()
                .find(|(_, id)| **id == previous.id)
                .map(|(token, _)| token.clone())
            {
                inner.by_token.remove(&token);
            }
        }
        inner.by_name.insert(safe_name(&session.name), session.id);
        let token = session.token.read().await.as_str().to_owned();
        if !token.is_empty() {
            inner.by_token.insert(token, session.id);
        }
        inner.by_id.insert(session.id, session);
        previous
    }

    pub async fn remove(&self, id: UserId) -> Option<Arc<Session>> {
        let mut inner = self.inner.write().await;
        let session = inner.by_id.remove(&id)?;
        inner.by_name.remove(&safe_name(&session.name));
        if let Some(token) = inner
            .by_token
            .iter()
            .find(|(_, tid)| **tid == id)
            .map(|(token, _)| token.clone())
        {
            inner.by_token.remove(&token);
        }
        Some(session)
    }

    pub async fn by_id(&self, id: UserId) -> Option<Arc<Session>> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    pub async fn by_name(&self, name: &str) -> Option<Arc<Session>> {
        let inner = self.inner.read().await;
        let id = inner.by_name.get(&safe_name(name))?;
        inner.by_id.get(id).cloned()
    }

    pub async fn by_token(&self, token: &str) -> Option<Arc<Session>> {
        let inner = self.inner.read().await;
        let id = inner.by_token.get(token)?;
        inner.by_id.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<Session>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<_> = inner.by_id.values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    pub async fn tcp_clients(&self) -> Vec<Arc<Session>> {
        self.all()
            .await
            .into_iter()
            .filter(|s| matches!(s.transport, crate::session::Transport::Tcp) && !s.is_bot())
            .collect()
    }

    pub async fn http_clients(&self) -> Vec<Arc<Session>> {
        self.all()
            .await
            .into_iter()
            .filter(|s| matches!(s.transport, crate::session::Transport::Http))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Broadcasts `payload` under `response_id` to every registered
    /// session.
    pub async fn send_packet(&self, response_id: ResponseId, payload: &ResponsePayload) {
        for session in self.all().await {
            session.enqueue(response_id, payload).await;
        }
    }

    /// Broadcasts a bot-originated server announcement to everyone.
    pub async fn announce(&self, message: &str) {
        self.send_packet(
            ResponseId::Announce,
            &ResponsePayload::Str(message.to_owned()),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ClientFingerprint, Transport};
    use crate::ids::Token;
    use std::collections::HashMap as StdHashMap;

    fn fingerprint() -> ClientFingerprint {
        ClientFingerprint {
            version_date: 20_120_812,
            adapters_md5: String::new(),
            adapter_list: Vec::new(),
            utc_offset: 0,
            country: *b"US",
            city: false,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    fn session(id: UserId, name: &str, token: &str) -> Arc<Session> {
        Arc::new(Session::new(
            id,
            name.to_owned(),
            Token(token.to_owned()),
            Transport::Tcp,
            "127.0.0.1:1".to_owned(),
            fingerprint(),
            20_120_812,
            1,
            0,
            Arc::new(StdHashMap::new()),
        ))
    }

    #[tokio::test]
    async fn appended_session_is_findable_by_id_name_and_token() {
        let registry = SessionRegistry::new();
        registry.append(session(5, "Alice", "tok-5")).await;

        assert_eq!(registry.by_id(5).await.unwrap().id, 5);
        assert_eq!(registry.by_name("alice").await.unwrap().id, 5);
        assert_eq!(registry.by_token("tok-5").await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn duplicate_id_insert_displaces_the_previous_entry() {
        let registry = SessionRegistry::new();
        registry.append(session(5, "Alice", "tok-1")).await;
        let displaced = registry.append(session(5, "Alice", "tok-2")).await;

        assert!(displaced.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.by_token("tok-1").await.is_none());
        assert_eq!(registry.by_token("tok-2").await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn removed_session_is_absent_from_every_index() {
        let registry = SessionRegistry::new();
        registry.append(session(5, "Alice", "tok-5")).await;
        registry.remove(5).await;

        assert!(registry.by_id(5).await.is_none());
        assert!(registry.by_name("alice").await.is_none());
        assert!(registry.by_token("tok-5").await.is_none());
    }

    #[tokio::test]
    async fn all_is_returned_in_stable_ascending_id_order() {
        let registry = SessionRegistry::new();
        registry.append(session(9, "Bob", "t9")).await;
        registry.append(session(2, "Alice", "t2")).await;
        registry.append(session(5, "Carl", "t5")).await;

        let ids: Vec<_> = registry.all().await.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
