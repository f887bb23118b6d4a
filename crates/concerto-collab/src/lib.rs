//! Trait boundaries for the external collaborators the session core
//! talks to: durable user/score storage, the leaderboard cache,
//! password verification, and geo-IP lookup. `concerto-core` depends
//! only on these traits; `memory` supplies in-process implementations
//! so the workspace is runnable end to end without a real database.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type UserId = i32;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("no such user")]
    NotFound,
    #[error("collaborator backend error: {0}")]
    Backend(String),
}

pub type CollabResult<T> = Result<T, CollabError>;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub safe_name: String,
    pub bcrypt_password: String,
    /// Bitmask checked against a channel's read/write masks.
    pub permissions: i64,
    pub restricted: bool,
    pub activated: bool,
    pub preferred_mode: u8,
    pub friend_only_dms: bool,
    pub friends: Vec<UserId>,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRecord {
    pub mode: u8,
    pub ranked_score: u64,
    pub total_score: u64,
    pub accuracy: f32,
    pub playcount: u32,
    pub pp: u32,
}

impl StatsRecord {
    pub fn empty(mode: u8) -> Self {
        Self {
            mode,
            ranked_score: 0,
            total_score: 0,
            accuracy: 0.0,
            playcount: 0,
            pp: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoInfo {
    pub country: [u8; 2],
    pub latitude: f32,
    pub longitude: f32,
}

/// Durable storage for users, scores, and moderation records. Out of
/// scope for this workspace beyond the interface — `memory::MemoryRepository`
/// exists only to make the rest of the system testable.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn user_by_id(&self, id: UserId) -> CollabResult<UserRecord>;
    async fn user_by_name(&self, name: &str) -> CollabResult<UserRecord>;
    async fn update_user(&self, user: UserRecord) -> CollabResult<()>;
    async fn fetch_stats(&self, id: UserId, mode: u8) -> CollabResult<StatsRecord>;
    async fn create_stats(&self, id: UserId, mode: u8) -> CollabResult<StatsRecord>;
    async fn update_stats(&self, id: UserId, stats: StatsRecord) -> CollabResult<()>;
    async fn hide_scores(&self, id: UserId) -> CollabResult<()>;
    async fn update_clients(&self, id: UserId, adapters_md5: &str) -> CollabResult<()>;
    async fn create_infringement(
        &self,
        id: UserId,
        reason: &str,
        until: Option<DateTime<Utc>>,
    ) -> CollabResult<()>;
    async fn update_rank_history(&self, id: UserId, mode: u8, rank: u32) -> CollabResult<()>;
    /// Returns the silence expiry for `id` if currently silenced.
    async fn is_silenced(&self, id: UserId) -> CollabResult<Option<DateTime<Utc>>>;
}

/// The leaderboard cache. Kept separate from `Repository` because the
/// real backend is an in-memory ranked structure, not the relational
/// store.
#[async_trait]
pub trait Ranking: Send + Sync {
    async fn global_rank(&self, id: UserId, mode: u8) -> CollabResult<u32>;
    async fn update(&self, id: UserId, mode: u8, pp: u32, ranked_score: u64, country: [u8; 2]);
    async fn remove(&self, id: UserId, country: [u8; 2]);
}

/// Verifies a client-submitted `md5(password)` against a stored
/// password hash. The hashing primitive itself (bcrypt or otherwise)
/// is an external concern; this trait only exposes the check.
pub trait PasswordVerifier: Send + Sync {
    fn check(&self, password_md5: &str, stored_hash: &str) -> bool;
}

/// Resolves a remote address to coarse geographic data.
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, remote_ip: &str) -> GeoInfo;
}
