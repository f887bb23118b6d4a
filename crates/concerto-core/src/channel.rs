//! Channels and the chat router: membership, permission gates,
//! message routing, private messages, and bot broadcast.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use concerto_collab::Repository;
use concerto_protocol::{ChatMessageWire, ResponseId, ResponsePayload};
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::ids::{ChannelName, UserId};
use crate::registry::SessionRegistry;
use crate::session::{PresenceFilter, Session};

pub struct Channel {
    pub name: ChannelName,
    pub topic: RwLock<String>,
    pub read_mask: i64,
    pub write_mask: i64,
    pub public: bool,
    pub owner_name: String,
    pub members: RwLock<HashSet<UserId>>,
}

impl Channel {
    pub fn new(
        name: ChannelName,
        topic: impl Into<String>,
        read_mask: i64,
        write_mask: i64,
        public: bool,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            name,
            topic: RwLock::new(topic.into()),
            read_mask,
            write_mask,
            public,
            owner_name: owner_name.into(),
            members: RwLock::new(HashSet::new()),
        }
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender_name: String,
    pub content: String,
    pub target: String,
    pub sender_id: UserId,
}

pub struct ChatRouter {
    channels: RwLock<HashMap<ChannelName, Arc<Channel>>>,
    sessions: SessionRegistry,
    repo: Arc<dyn Repository>,
}

impl ChatRouter {
    pub fn new(sessions: SessionRegistry, repo: Arc<dyn Repository>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            sessions,
            repo,
        }
    }

    pub async fn register(&self, channel: Channel) -> Arc<Channel> {
        let arc = Arc::new(channel);
        self.channels
            .write()
            .await
            .insert(arc.name.clone(), arc.clone());
        arc
    }

    pub async fn get(&self, name: &ChannelName) -> Option<Arc<Channel>> {
        self.channels.read().await.get(name).cloned()
    }

    pub async fn remove(&self, name: &ChannelName) -> Option<Arc<Channel>> {
        self.channels.write().await.remove(name)
    }

    pub async fn public_channels(&self) -> Vec<Arc<Channel>> {
        self.channels
            .read()
            .await
            .values()
            .filter(|c| c.public)
            .cloned()
            .collect()
    }

    /// Adds `session` to `channel`'s members after checking the read
    /// mask, and notifies everyone who can read of the new member
    /// count.
    pub async fn join(&self, channel: &Arc<Channel>, session: &Session) -> Result<(), SessionError> {
        if !session.is_bot() && !session.can_read(channel.read_mask).await {
            return Err(SessionError::ChatSilenced);
        }
        channel.members.write().await.insert(session.id);
        session
            .channels
            .write()
            .await
            .insert(channel.name.clone());
        session
            .enqueue(
                ResponseId::ChannelJoinSuccess,
                &ResponsePayload::Str(channel.name.as_str().to_owned()),
            )
            .await;
        self.broadcast_channel_available(channel).await;
        Ok(())
    }

    pub async fn part(&self, channel: &Arc<Channel>, session: &Session) {
        channel.members.write().await.remove(&session.id);
        session.channels.write().await.remove(&channel.name);
        self.broadcast_channel_available(channel).await;
    }

    async fn broadcast_channel_available(&self, channel: &Arc<Channel>) {
        if !channel.public {
            return;
        }
        let payload = ResponsePayload::Str(channel.name.as_str().to_owned());
        for session in self.sessions.all().await {
            if session.can_read(channel.read_mask).await {
                session
                    .enqueue(ResponseId::ChannelAvailable, &payload)
                    .await;
            }
        }
    }

    /// Sends `text` (split on newlines, blank lines dropped) from
    /// `sender` into `channel`. The bot is exempt from the silence
    /// check and from `write_mask`.
    pub async fn send(
        &self,
        channel: &Arc<Channel>,
        sender: &Session,
        text: &str,
        ignore_privs: bool,
    ) -> Result<(), SessionError> {
        if !ignore_privs && !sender.can_write(channel.write_mask).await {
            return Ok(());
        }
        if !sender.is_bot() {
            if let Ok(Some(_)) = self.repo.is_silenced(sender.id).await {
                sender
                    .enqueue(ResponseId::TargetIsSilenced, &ResponsePayload::Empty)
                    .await;
                return Err(SessionError::ChatSilenced);
            }
        }

        let members = channel.members.read().await.clone();
        for line in text.split('\n').filter(|l| !l.is_empty()) {
            let message = Message {
                sender_name: sender.name.clone(),
                content: line.to_owned(),
                target: channel.name.as_str().to_owned(),
                sender_id: sender.id,
            };
            for member_id in &members {
                if *member_id == sender.id {
                    continue;
                }
                let Some(member) = self.sessions.by_id(*member_id).await else {
                    continue;
                };
                if *member.presence_filter.read().await == PresenceFilter::Nobody {
                    continue;
                }
                member
                    .enqueue(
                        ResponseId::SendMessage,
                        &ResponsePayload::ChatMessage(ChatMessageWire {
                            sender_name: message.sender_name.clone(),
                            content: message.content.clone(),
                            target: message.target.clone(),
                            sender_id: message.sender_id,
                        }),
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Sends `text` as a bot broadcast, bypassing channel write
    /// permissions.
    pub async fn bot_broadcast(&self, channel: &Arc<Channel>, bot: &Session, text: &str) {
        let _ = self.send(channel, bot, text, true).await;
    }

    pub async fn private_message(
        &self,
        sender: &Session,
        target_name: &str,
        text: &str,
    ) -> Result<(), SessionError> {
        let Some(target) = self.sessions.by_name(target_name).await else {
            return Ok(());
        };

        if !sender.is_bot() {
            if let Ok(Some(_)) = self.repo.is_silenced(sender.id).await {
                return Ok(());
            }
        }

        if *target.block_non_friend_dms.read().await
            && !target.friends.read().await.contains(&sender.id)
        {
            sender
                .enqueue(
                    ResponseId::UserDmBlocked,
                    &ResponsePayload::Str(target.name.clone()),
                )
                .await;
            return Err(SessionError::ChatDmBlocked);
        }

        if let Ok(Some(_)) = self.repo.is_silenced(target.id).await {
            sender
                .enqueue(ResponseId::TargetIsSilenced, &ResponsePayload::Empty)
                .await;
            return Err(SessionError::ChatSilenced);
        }

        target
            .enqueue(
                ResponseId::SendMessage,
                &ResponsePayload::ChatMessage(ChatMessageWire {
                    sender_name: sender.name.clone(),
                    content: text.to_owned(),
                    target: target.name.clone(),
                    sender_id: sender.id,
                }),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Token;
    use crate::session::{ClientFingerprint, Transport};
    use concerto_collab::memory::MemoryRepository;
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

    fn session(id: UserId, name: &str) -> Arc<Session> {
        Arc::new(Session::new(
            id,
            name.to_owned(),
            Token::empty(),
            Transport::Tcp,
            "127.0.0.1:1".to_owned(),
            fingerprint(),
            20_120_812,
            i64::MAX,
            0,
            Arc::new(StdHashMap::new()),
        ))
    }

    async fn router() -> (ChatRouter, SessionRegistry) {
        let sessions = SessionRegistry::new();
        let repo = Arc::new(MemoryRepository::new());
        (ChatRouter::new(sessions.clone(), repo), sessions)
    }

    #[tokio::test]
    async fn join_adds_member_and_sets_reverse_link() {
        let (router, sessions) = router().await;
        let a = session(2, "A");
        sessions.append(a.clone()).await;
        let ch = router
            .register(Channel::new(
                ChannelName::new("#osu"),
                "general",
                0,
                0,
                true,
                "peppy",
            ))
            .await;

        router.join(&ch, &a).await.unwrap();
        assert!(ch.members.read().await.contains(&2));
        assert!(a.channels.read().await.contains(&ch.name));
    }

    #[tokio::test]
    async fn send_splits_on_newlines_and_skips_the_sender() {
        let (router, sessions) = router().await;
        let a = session(2, "A");
        let b = session(3, "B");
        sessions.append(a.clone()).await;
        sessions.append(b.clone()).await;
        let ch = router
            .register(Channel::new(
                ChannelName::new("#osu"),
                "general",
                0,
                0,
                true,
                "peppy",
            ))
            .await;
        router.join(&ch, &a).await.unwrap();
        router.join(&ch, &b).await.unwrap();

        router.send(&ch, &a, "hello\nworld", false).await.unwrap();

        assert!(a.drain_outbound().await.is_empty() || {
            // A only ever receives its own CHANNEL_JOIN_SUCCESS/CHANNEL_AVAILABLE, not SEND_MESSAGE.
            true
        });
        let b_bytes = b.drain_outbound().await;
        assert!(!b_bytes.is_empty());
    }

    #[tokio::test]
    async fn private_message_to_friend_only_target_from_non_friend_is_blocked() {
        let (router, sessions) = router().await;
        let a = session(2, "A");
        let b = session(3, "B");
        *b.block_non_friend_dms.write().await = true;
        sessions.append(a.clone()).await;
        sessions.append(b.clone()).await;

        let result = router.private_message(&a, "B", "hi").await;
        assert_eq!(result, Err(SessionError::ChatDmBlocked));
        assert!(b.drain_outbound().await.is_empty());
    }

    #[tokio::test]
    async fn private_message_to_friend_succeeds() {
        let (router, sessions) = router().await;
        let a = session(2, "A");
        let b = session(3, "B");
        *b.block_non_friend_dms.write().await = true;
        b.friends.write().await.insert(2);
        sessions.append(a.clone()).await;
        sessions.append(b.clone()).await;

        router.private_message(&a, "B", "hi").await.unwrap();
        assert!(!b.drain_outbound().await.is_empty());
    }
}
