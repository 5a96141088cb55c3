// server/src/store/mod.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Storage interfaces for verification tokens, user accounts and analytics.
//!
//! Backends: Postgres for production, in-memory for development and tests.
//! Token rows are never deleted; consumption and expiry are status flips so
//! the table doubles as an audit trail.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use memory::{MemoryAnalytics, MemoryTokenStore, MemoryUserStore};
pub use postgres::PgStores;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Pending,
    Completed,
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Pending => "pending",
            TokenStatus::Completed => "completed",
            TokenStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TokenStatus::Pending),
            "completed" => Ok(TokenStatus::Completed),
            "expired" => Ok(TokenStatus::Expired),
            other => Err(anyhow::anyhow!("unknown token status '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenRecord {
    pub token: String,
    pub account_id: String,
    pub user_id: String,
    pub status: TokenStatus,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    /// Recorded at completion, for audit.
    pub wallet_address: Option<String>,
    pub source_ip: Option<String>,
    /// Provenance only, e.g. {"created_via": "discord_command"}.
    pub metadata: serde_json::Value,
}

impl TokenRecord {
    /// Usable right now: still pending and not past its deadline. Expiry is
    /// derived from the timestamp even before the sweeper flips the row.
    pub fn is_pending_at(&self, now: OffsetDateTime) -> bool {
        self.status == TokenStatus::Pending && now < self.expires_at
    }
}

#[derive(Clone, Debug, Default)]
pub struct UserRecord {
    pub discord_id: String,
    pub wallet_address: Option<String>,
    pub wallet_verified: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenStatusCounts {
    pub pending: u64,
    pub completed: u64,
    pub expired: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub verified: u64,
    pub unverified: u64,
    pub unique_wallets: u64,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: TokenRecord) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>>;

    /// Most recent pending, unexpired token for the account, if any.
    async fn find_pending(
        &self,
        account_id: &str,
        now: OffsetDateTime,
    ) -> Result<Option<TokenRecord>>;

    /// Pending -> Completed, recording the wallet and source IP. Returns
    /// false when the token is absent, expired or already consumed — the
    /// transition happens at most once per token.
    async fn complete(
        &self,
        token: &str,
        wallet_address: &str,
        source_ip: &str,
        now: OffsetDateTime,
    ) -> Result<bool>;

    /// Flip pending rows whose deadline has passed to Expired. Returns the
    /// number of rows changed.
    async fn mark_expired(&self, now: OffsetDateTime) -> Result<u64>;

    /// Status buckets for tokens created after `since`.
    async fn status_counts_since(&self, since: OffsetDateTime) -> Result<TokenStatusCounts>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, discord_id: &str) -> Result<Option<UserRecord>>;

    async fn find_by_wallet(&self, wallet_address: &str) -> Result<Option<UserRecord>>;

    /// Link the wallet and set the verified flag. Returns false when another
    /// account already holds the wallet — uniqueness is enforced at this
    /// layer as the backstop for the handler's pre-check.
    async fn link_wallet(&self, discord_id: &str, wallet_address: &str) -> Result<bool>;

    async fn verification_counts(&self) -> Result<UserCounts>;
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalyticsEvent {
    pub event_type: String,
    pub user_id: String,
    pub scope: String,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AnalyticsEvent {
    pub fn new(
        event_type: impl Into<String>,
        user_id: impl Into<String>,
        scope: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            user_id: user_id.into(),
            scope: scope.into(),
            payload,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> Result<()>;
}
