// server/src/store/postgres.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Postgres backends via sqlx.
//!
//! Every statement uses bound placeholders. Retry-with-backoff wraps only
//! the initial pool establishment, never per-query calls; individual queries
//! are bounded by the pool's acquire timeout. The partial unique index on
//! `users.wallet_address` turns the wallet-uniqueness race into a 23505
//! conflict, which `link_wallet` reports as `Ok(false)`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    AnalyticsEvent, AnalyticsSink, TokenRecord, TokenStatus, TokenStatusCounts, TokenStore,
    UserCounts, UserRecord, UserStore,
};

const CONNECT_ATTEMPTS: u32 = 3;
const UNIQUE_VIOLATION: &str = "23505";

#[derive(sqlx::FromRow)]
struct TokenRow {
    token: String,
    account_id: String,
    user_id: String,
    status: String,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    wallet_address: Option<String>,
    source_ip: Option<String>,
    metadata: serde_json::Value,
}

impl TokenRow {
    fn into_record(self) -> Result<TokenRecord> {
        Ok(TokenRecord {
            status: self.status.parse::<TokenStatus>()?,
            token: self.token,
            account_id: self.account_id,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            wallet_address: self.wallet_address,
            source_ip: self.source_ip,
            metadata: self.metadata,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    discord_id: String,
    wallet_address: Option<String>,
    wallet_verified: bool,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            discord_id: row.discord_id,
            wallet_address: row.wallet_address,
            wallet_verified: row.wallet_verified,
        }
    }
}

/// One pool backing all three store traits.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    /// Establish the pool with bounded retries (multiplicative backoff) and
    /// run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let mut delay = Duration::from_secs(2);
        for attempt in 1..=CONNECT_ATTEMPTS {
            let connect = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(30))
                .connect(database_url)
                .await;

            match connect {
                Ok(pool) => {
                    sqlx::migrate!("./migrations")
                        .run(&pool)
                        .await
                        .context("run database migrations")?;
                    info!("database pool ready");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    warn!(attempt, "database connect failed: {e}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e).context("connect to database"),
            }
        }
        unreachable!()
    }

    /// Release all pool connections. Called on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TokenStore for PgStores {
    async fn insert(&self, record: TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens
                (token, account_id, user_id, status, created_at, expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.token)
        .bind(&record.account_id)
        .bind(&record.user_id)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await
        .context("insert verification token")?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT * FROM verification_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("fetch verification token")?;

        row.map(TokenRow::into_record).transpose()
    }

    async fn find_pending(
        &self,
        account_id: &str,
        now: OffsetDateTime,
    ) -> Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT * FROM verification_tokens
            WHERE account_id = $1 AND status = 'pending' AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("find pending token")?;

        row.map(TokenRow::into_record).transpose()
    }

    async fn complete(
        &self,
        token: &str,
        wallet_address: &str,
        source_ip: &str,
        now: OffsetDateTime,
    ) -> Result<bool> {
        // The WHERE clause makes the pending -> completed transition
        // first-writer-wins; replays match zero rows.
        let result = sqlx::query(
            r#"
            UPDATE verification_tokens
            SET status = 'completed', wallet_address = $2, source_ip = $3
            WHERE token = $1 AND status = 'pending' AND expires_at > $4
            "#,
        )
        .bind(token)
        .bind(wallet_address)
        .bind(source_ip)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("complete verification token")?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE verification_tokens SET status = 'expired' \
             WHERE status = 'pending' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .context("expire stale tokens")?;

        Ok(result.rows_affected())
    }

    async fn status_counts_since(&self, since: OffsetDateTime) -> Result<TokenStatusCounts> {
        let (pending, completed, expired) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending' AND expires_at > $2),
                COUNT(*) FILTER (WHERE status = 'completed'),
                COUNT(*) FILTER (WHERE status = 'expired'
                                 OR (status = 'pending' AND expires_at <= $2))
            FROM verification_tokens
            WHERE created_at > $1
            "#,
        )
        .bind(since)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .context("count token statuses")?;

        Ok(TokenStatusCounts {
            pending: pending as u64,
            completed: completed as u64,
            expired: expired as u64,
        })
    }
}

#[async_trait]
impl UserStore for PgStores {
    async fn get(&self, discord_id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT discord_id, wallet_address, wallet_verified FROM users WHERE discord_id = $1",
        )
        .bind(discord_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch user")?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_wallet(&self, wallet_address: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT discord_id, wallet_address, wallet_verified FROM users \
             WHERE wallet_address = $1",
        )
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await
        .context("fetch user by wallet")?;

        Ok(row.map(UserRecord::from))
    }

    async fn link_wallet(&self, discord_id: &str, wallet_address: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (discord_id, wallet_address, wallet_verified)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (discord_id) DO UPDATE
                SET wallet_address = EXCLUDED.wallet_address,
                    wallet_verified = TRUE,
                    updated_at = now()
            "#,
        )
        .bind(discord_id)
        .bind(wallet_address)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            // The partial unique index rejected the link: held elsewhere.
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                warn!(wallet = %wallet_address, "wallet already held (unique index)");
                Ok(false)
            }
            Err(e) => Err(e).context("link wallet"),
        }
    }

    async fn verification_counts(&self) -> Result<UserCounts> {
        let (verified, unverified, unique_wallets) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE wallet_verified),
                COUNT(*) FILTER (WHERE NOT wallet_verified),
                COUNT(DISTINCT wallet_address) FILTER (WHERE wallet_address IS NOT NULL)
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("count users")?;

        Ok(UserCounts {
            verified: verified as u64,
            unverified: unverified as u64,
            unique_wallets: unique_wallets as u64,
        })
    }
}

#[async_trait]
impl AnalyticsSink for PgStores {
    async fn record(&self, event: AnalyticsEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO analytics_events (event_type, user_id, scope, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&event.event_type)
        .bind(&event.user_id)
        .bind(&event.scope)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .context("record analytics event")?;
        Ok(())
    }
}
