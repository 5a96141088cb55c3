// server/src/store/memory.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! In-memory backends. Used when `DATABASE_URL` is unset and throughout the
//! test suites. Each store keeps its map behind one async lock, so the
//! compound operations (`complete`, `link_wallet`) are atomic per store.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AnalyticsEvent, AnalyticsSink, TokenRecord, TokenStatus, TokenStatusCounts, TokenStore,
    UserCounts, UserRecord, UserStore,
};

#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    map: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, record: TokenRecord) -> Result<()> {
        self.map.write().await.insert(record.token.clone(), record);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>> {
        Ok(self.map.read().await.get(token).cloned())
    }

    async fn find_pending(
        &self,
        account_id: &str,
        now: OffsetDateTime,
    ) -> Result<Option<TokenRecord>> {
        let map = self.map.read().await;
        Ok(map
            .values()
            .filter(|r| r.account_id == account_id && r.is_pending_at(now))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn complete(
        &self,
        token: &str,
        wallet_address: &str,
        source_ip: &str,
        now: OffsetDateTime,
    ) -> Result<bool> {
        let mut map = self.map.write().await;
        match map.get_mut(token) {
            Some(record) if record.is_pending_at(now) => {
                record.status = TokenStatus::Completed;
                record.wallet_address = Some(wallet_address.to_string());
                record.source_ip = Some(source_ip.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let mut map = self.map.write().await;
        let mut flipped = 0;
        for record in map.values_mut() {
            if record.status == TokenStatus::Pending && record.expires_at <= now {
                record.status = TokenStatus::Expired;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn status_counts_since(&self, since: OffsetDateTime) -> Result<TokenStatusCounts> {
        let now = OffsetDateTime::now_utc();
        let map = self.map.read().await;
        let mut counts = TokenStatusCounts::default();
        for record in map.values().filter(|r| r.created_at > since) {
            match record.status {
                TokenStatus::Pending if record.expires_at <= now => counts.expired += 1,
                TokenStatus::Pending => counts.pending += 1,
                TokenStatus::Completed => counts.completed += 1,
                TokenStatus::Expired => counts.expired += 1,
            }
        }
        Ok(counts)
    }
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    map: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryUserStore {
    /// Seed helper for tests.
    pub async fn put(&self, record: UserRecord) {
        self.map
            .write()
            .await
            .insert(record.discord_id.clone(), record);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, discord_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.map.read().await.get(discord_id).cloned())
    }

    async fn find_by_wallet(&self, wallet_address: &str) -> Result<Option<UserRecord>> {
        let map = self.map.read().await;
        Ok(map
            .values()
            .find(|u| u.wallet_address.as_deref() == Some(wallet_address))
            .cloned())
    }

    async fn link_wallet(&self, discord_id: &str, wallet_address: &str) -> Result<bool> {
        // One write guard across check and insert: the uniqueness scan and
        // the link are a single atomic step for this backend.
        let mut map = self.map.write().await;
        let taken = map
            .values()
            .any(|u| u.discord_id != discord_id && u.wallet_address.as_deref() == Some(wallet_address));
        if taken {
            debug!(wallet = %wallet_address, "wallet already held (memory)");
            return Ok(false);
        }

        let user = map.entry(discord_id.to_string()).or_insert_with(|| UserRecord {
            discord_id: discord_id.to_string(),
            ..UserRecord::default()
        });
        user.wallet_address = Some(wallet_address.to_string());
        user.wallet_verified = true;
        Ok(true)
    }

    async fn verification_counts(&self) -> Result<UserCounts> {
        let map = self.map.read().await;
        let mut counts = UserCounts::default();
        let mut wallets = std::collections::HashSet::new();
        for user in map.values() {
            if user.wallet_verified {
                counts.verified += 1;
            } else {
                counts.unverified += 1;
            }
            if let Some(wallet) = &user.wallet_address {
                wallets.insert(wallet.clone());
            }
        }
        counts.unique_wallets = wallets.len() as u64;
        Ok(counts)
    }
}

#[derive(Clone, Default)]
pub struct MemoryAnalytics {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
}

impl MemoryAnalytics {
    pub async fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemoryAnalytics {
    async fn record(&self, event: AnalyticsEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(token: &str, account: &str, ttl_secs: i64) -> TokenRecord {
        let now = OffsetDateTime::now_utc();
        TokenRecord {
            token: token.to_string(),
            account_id: account.to_string(),
            user_id: account.to_string(),
            status: TokenStatus::Pending,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            wallet_address: None,
            source_ip: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn complete_is_a_one_shot_transition() {
        let store = MemoryTokenStore::default();
        store.insert(record("t1", "acct", 600)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(store.complete("t1", "wallet", "1.2.3.4", now).await.unwrap());
        // Second attempt fails cleanly and mutates nothing further.
        assert!(!store.complete("t1", "wallet", "1.2.3.4", now).await.unwrap());

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Completed);
        assert_eq!(stored.wallet_address.as_deref(), Some("wallet"));
        assert_eq!(stored.source_ip.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn expired_tokens_cannot_complete() {
        let store = MemoryTokenStore::default();
        store.insert(record("t1", "acct", -5)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(!store.complete("t1", "wallet", "ip", now).await.unwrap());
    }

    #[tokio::test]
    async fn find_pending_returns_the_newest_live_token() {
        let store = MemoryTokenStore::default();
        let mut old = record("old", "acct", 600);
        old.created_at -= Duration::minutes(5);
        store.insert(old).await.unwrap();
        store.insert(record("stale", "acct", -1)).await.unwrap();
        store.insert(record("new", "acct", 600)).await.unwrap();

        let found = store
            .find_pending("acct", OffsetDateTime::now_utc())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.token, "new");

        assert!(store
            .find_pending("other", OffsetDateTime::now_utc())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mark_expired_flips_only_stale_pending_rows() {
        let store = MemoryTokenStore::default();
        store.insert(record("live", "a", 600)).await.unwrap();
        store.insert(record("stale", "b", -5)).await.unwrap();

        let flipped = store.mark_expired(OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(flipped, 1);
        assert_eq!(
            store.get("stale").await.unwrap().unwrap().status,
            TokenStatus::Expired
        );
        assert_eq!(
            store.get("live").await.unwrap().unwrap().status,
            TokenStatus::Pending
        );
    }

    #[tokio::test]
    async fn link_wallet_enforces_uniqueness() {
        let store = MemoryUserStore::default();

        assert!(store.link_wallet("alice", "wallet-1").await.unwrap());
        // Same account relinking its own wallet is fine.
        assert!(store.link_wallet("alice", "wallet-1").await.unwrap());
        // A different account cannot take it.
        assert!(!store.link_wallet("bob", "wallet-1").await.unwrap());

        let bob = store.get("bob").await.unwrap();
        assert!(bob.is_none());
    }

    #[tokio::test]
    async fn verification_counts_add_up() {
        let store = MemoryUserStore::default();
        store.link_wallet("alice", "wallet-1").await.unwrap();
        store.link_wallet("bob", "wallet-2").await.unwrap();
        store
            .put(UserRecord {
                discord_id: "carol".into(),
                wallet_address: None,
                wallet_verified: false,
            })
            .await;

        let counts = store.verification_counts().await.unwrap();
        assert_eq!(counts.verified, 2);
        assert_eq!(counts.unverified, 1);
        assert_eq!(counts.unique_wallets, 2);
    }
}
