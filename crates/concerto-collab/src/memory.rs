//! In-memory stand-ins for the external collaborators, sufficient to
//! run and test the session core without a real database. Mirrors the
//! `Arc<RwLock<HashMap<..>>>` aggregate style used throughout the
//! session core itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    CollabError, CollabResult, GeoInfo, GeoResolver, PasswordVerifier, Ranking, Repository,
    StatsRecord, UserId, UserRecord,
};

#[derive(Default)]
struct Inner {
    users_by_id: HashMap<UserId, UserRecord>,
    users_by_name: HashMap<String, UserId>,
    stats: HashMap<(UserId, u8), StatsRecord>,
    silences: HashMap<UserId, DateTime<Utc>>,
}

/// An in-process `Repository`. Seed users with [`MemoryRepository::seed_user`]
/// before wiring it into the session server.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, user: UserRecord) {
        let mut inner = self.inner.write().await;
        inner
            .users_by_name
            .insert(user.safe_name.clone(), user.id);
        inner.users_by_id.insert(user.id, user);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn user_by_id(&self, id: UserId) -> CollabResult<UserRecord> {
        self.inner
            .read()
            .await
            .users_by_id
            .get(&id)
            .cloned()
            .ok_or(CollabError::NotFound)
    }

    async fn user_by_name(&self, name: &str) -> CollabResult<UserRecord> {
        let safe_name = safe_name_of(name);
        let inner = self.inner.read().await;
        let id = inner
            .users_by_name
            .get(&safe_name)
            .ok_or(CollabError::NotFound)?;
        inner
            .users_by_id
            .get(id)
            .cloned()
            .ok_or(CollabError::NotFound)
    }

    async fn update_user(&self, user: UserRecord) -> CollabResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .users_by_name
            .insert(user.safe_name.clone(), user.id);
        inner.users_by_id.insert(user.id, user);
        Ok(())
    }

    async fn fetch_stats(&self, id: UserId, mode: u8) -> CollabResult<StatsRecord> {
        self.inner
            .read()
            .await
            .stats
            .get(&(id, mode))
            .copied()
            .ok_or(CollabError::NotFound)
    }

    async fn create_stats(&self, id: UserId, mode: u8) -> CollabResult<StatsRecord> {
        let stats = StatsRecord::empty(mode);
        self.inner.write().await.stats.insert((id, mode), stats);
        Ok(stats)
    }

    async fn update_stats(&self, id: UserId, stats: StatsRecord) -> CollabResult<()> {
        self.inner
            .write()
            .await
            .stats
            .insert((id, stats.mode), stats);
        let _ = id;
        Ok(())
    }

    async fn hide_scores(&self, _id: UserId) -> CollabResult<()> {
        Ok(())
    }

    async fn update_clients(&self, _id: UserId, _adapters_md5: &str) -> CollabResult<()> {
        Ok(())
    }

    async fn create_infringement(
        &self,
        id: UserId,
        _reason: &str,
        until: Option<DateTime<Utc>>,
    ) -> CollabResult<()> {
        let mut inner = self.inner.write().await;
        match until {
            Some(until) => {
                inner.silences.insert(id, until);
            }
            None => {
                inner.silences.remove(&id);
            }
        }
        Ok(())
    }

    async fn update_rank_history(&self, _id: UserId, _mode: u8, _rank: u32) -> CollabResult<()> {
        Ok(())
    }

    async fn is_silenced(&self, id: UserId) -> CollabResult<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        Ok(inner.silences.get(&id).filter(|&&until| until > Utc::now()).copied())
    }
}

fn safe_name_of(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// An in-process leaderboard cache: global rank is simply the 1-based
/// position in a descending-pp ordering for the requested mode.
#[derive(Clone, Default)]
pub struct MemoryRanking {
    inner: Arc<RwLock<HashMap<u8, Vec<(UserId, u32)>>>>,
}

impl MemoryRanking {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ranking for MemoryRanking {
    async fn global_rank(&self, id: UserId, mode: u8) -> CollabResult<u32> {
        let inner = self.inner.read().await;
        let Some(board) = inner.get(&mode) else {
            return Ok(0);
        };
        board
            .iter()
            .position(|(entry_id, _)| *entry_id == id)
            .map(|idx| idx as u32 + 1)
            .ok_or(CollabError::NotFound)
    }

    async fn update(&self, id: UserId, mode: u8, pp: u32, _ranked_score: u64, _country: [u8; 2]) {
        let mut inner = self.inner.write().await;
        let board = inner.entry(mode).or_default();
        board.retain(|(entry_id, _)| *entry_id != id);
        let insert_at = board
            .iter()
            .position(|(_, entry_pp)| *entry_pp < pp)
            .unwrap_or(board.len());
        board.insert(insert_at, (id, pp));
    }

    async fn remove(&self, id: UserId, _country: [u8; 2]) {
        let mut inner = self.inner.write().await;
        for board in inner.values_mut() {
            board.retain(|(entry_id, _)| *entry_id != id);
        }
    }
}

/// Treats the stored hash as the client's md5 password directly —
/// there is no bcrypt dependency in this workspace, and substituting
/// one purely for an in-memory test double would misrepresent the
/// real collaborator's contract.
#[derive(Clone, Copy, Default)]
pub struct PlainPasswordVerifier;

impl PasswordVerifier for PlainPasswordVerifier {
    fn check(&self, password_md5: &str, stored_hash: &str) -> bool {
        password_md5 == stored_hash
    }
}

/// Resolves every address to a fixed, unknown location.
#[derive(Clone, Copy, Default)]
pub struct NullGeoResolver;

impl GeoResolver for NullGeoResolver {
    fn resolve(&self, _remote_ip: &str) -> GeoInfo {
        GeoInfo {
            country: *b"XX",
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(id: UserId, name: &str) -> UserRecord {
        UserRecord {
            id,
            name: name.to_owned(),
            safe_name: safe_name_of(name),
            bcrypt_password: "hash".to_owned(),
            permissions: 1,
            restricted: false,
            activated: true,
            preferred_mode: 0,
            friend_only_dms: false,
            friends: Vec::new(),
            country: "US".to_owned(),
        }
    }

    #[tokio::test]
    async fn seeded_user_is_found_by_id_and_case_insensitive_name() {
        let repo = MemoryRepository::new();
        repo.seed_user(sample_user(5, "Alice")).await;

        assert_eq!(repo.user_by_id(5).await.unwrap().name, "Alice");
        assert_eq!(repo.user_by_name("alice").await.unwrap().id, 5);
        assert_eq!(repo.user_by_name("ALICE").await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let repo = MemoryRepository::new();
        assert!(matches!(
            repo.user_by_name("nobody").await,
            Err(CollabError::NotFound)
        ));
    }

    #[tokio::test]
    async fn infringement_with_future_expiry_is_silenced_until_expiry() {
        let repo = MemoryRepository::new();
        let until = Utc::now() + chrono::Duration::seconds(60);
        repo.create_infringement(5, "spam", Some(until)).await.unwrap();
        assert_eq!(repo.is_silenced(5).await.unwrap(), Some(until));
    }

    #[tokio::test]
    async fn expired_infringement_is_not_reported_as_silenced() {
        let repo = MemoryRepository::new();
        let past = Utc::now() - chrono::Duration::seconds(60);
        repo.create_infringement(5, "spam", Some(past)).await.unwrap();
        assert_eq!(repo.is_silenced(5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ranking_orders_by_descending_pp() {
        let ranking = MemoryRanking::new();
        ranking.update(1, 0, 100, 0, *b"US").await;
        ranking.update(2, 0, 500, 0, *b"US").await;
        ranking.update(3, 0, 250, 0, *b"US").await;

        assert_eq!(ranking.global_rank(2, 0).await.unwrap(), 1);
        assert_eq!(ranking.global_rank(3, 0).await.unwrap(), 2);
        assert_eq!(ranking.global_rank(1, 0).await.unwrap(), 3);
    }

    #[test]
    fn plain_password_verifier_compares_equality() {
        let verifier = PlainPasswordVerifier;
        assert!(verifier.check("abc", "abc"));
        assert!(!verifier.check("abc", "def"));
    }
}
