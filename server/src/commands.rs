// server/src/commands.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Discord command surface, by contract.
//!
//! The gateway process (slash commands, buttons, embeds, permission checks)
//! is an external collaborator; it calls into this surface and renders the
//! structured results. Kept deliberately thin: issue-or-reuse a token,
//! aggregate stats, describe the persistent verification button.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::store::{
    AnalyticsEvent, AnalyticsSink, TokenRecord, TokenStatus, TokenStore, UserStore,
};
use crate::token::TokenIssuer;

/// Where a start-verification request came from; recorded as provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOrigin {
    Command,
    Button,
}

impl CommandOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOrigin::Command => "discord_command",
            CommandOrigin::Button => "verification_button",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartVerification {
    /// Nothing to do; the account already holds a verified wallet.
    AlreadyVerified { wallet_address: String },
    /// An unexpired pending token exists; the same link is returned instead
    /// of minting a duplicate.
    PendingLink { url: String },
    /// A fresh token was issued and stored.
    FreshLink { url: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerificationStats {
    pub verified_users: u64,
    pub unverified_users: u64,
    pub unique_wallets: u64,
    /// Token buckets cover the last 24 hours.
    pub pending_tokens: u64,
    pub completed_tokens: u64,
    pub expired_tokens: u64,
}

/// Descriptor for the persistent verification button an admin can post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationPrompt {
    pub custom_id: &'static str,
    pub label: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Clone)]
pub struct CommandSurface {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    analytics: Arc<dyn AnalyticsSink>,
    issuer: TokenIssuer,
    base_url: String,
}

impl CommandSurface {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        analytics: Arc<dyn AnalyticsSink>,
        issuer: TokenIssuer,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            users,
            analytics,
            issuer,
            base_url: base_url.into(),
        }
    }

    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/verify/{token}", self.base_url.trim_end_matches('/'))
    }

    /// Backing for the "start verification" command and the persistent
    /// button. Reuses a live pending token rather than minting duplicates.
    pub async fn start_verification(
        &self,
        account_id: &str,
        user_id: &str,
        origin: CommandOrigin,
    ) -> Result<StartVerification> {
        if let Some(user) = self.users.get(account_id).await? {
            if user.wallet_verified {
                return Ok(StartVerification::AlreadyVerified {
                    wallet_address: user.wallet_address.unwrap_or_else(|| "unknown".into()),
                });
            }
        }

        let now = OffsetDateTime::now_utc();
        if let Some(pending) = self.tokens.find_pending(account_id, now).await? {
            return Ok(StartVerification::PendingLink {
                url: self.verification_url(&pending.token),
            });
        }

        let issued = self.issuer.issue(account_id, user_id)?;
        let record = TokenRecord {
            token: issued.token.clone(),
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
            status: TokenStatus::Pending,
            created_at: OffsetDateTime::from_unix_timestamp(issued.claims.issued_at)?,
            // The stored deadline is written from the claim, so the row and
            // the token always agree.
            expires_at: OffsetDateTime::from_unix_timestamp(issued.claims.expires_at)?,
            wallet_address: None,
            source_ip: None,
            metadata: json!({ "created_via": origin.as_str() }),
        };
        self.tokens.insert(record).await?;

        let event = AnalyticsEvent::new(
            "verification_request_created",
            account_id,
            "global",
            json!({ "created_via": origin.as_str() }),
        );
        if let Err(e) = self.analytics.record(event).await {
            warn!("analytics record failed: {e:#}");
        }

        Ok(StartVerification::FreshLink {
            url: self.verification_url(&issued.token),
        })
    }

    /// Aggregates for the admin stats command.
    pub async fn verification_stats(&self) -> Result<VerificationStats> {
        let users = self.users.verification_counts().await?;
        let since = OffsetDateTime::now_utc() - Duration::hours(24);
        let tokens = self.tokens.status_counts_since(since).await?;

        Ok(VerificationStats {
            verified_users: users.verified,
            unverified_users: users.unverified,
            unique_wallets: users.unique_wallets,
            pending_tokens: tokens.pending,
            completed_tokens: tokens.completed,
            expired_tokens: tokens.expired,
        })
    }

    /// Payload for the admin "post a verification button" command.
    pub fn verification_prompt(&self) -> VerificationPrompt {
        VerificationPrompt {
            custom_id: "verify_wallet_button",
            label: "Verify Wallet",
            title: "Solana Wallet Verification",
            description: "Click the button below to link your Solana wallet \
                          and unlock XP earning.",
        }
    }
}
