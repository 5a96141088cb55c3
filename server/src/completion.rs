// server/src/completion.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Verification completion: consume the token, link the wallet, kick off
//! side effects.
//!
//! The check-then-link sequence is a classic check-then-act race under
//! concurrent submissions for the same wallet. It is closed twice: a
//! per-wallet async mutex held across steps 1-4, and the storage layer's own
//! uniqueness guarantee (`link_wallet` returning false) as the backstop.

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::VerifyError;
use crate::sidefx::{SideEffects, VerificationCompleted};
use crate::store::{TokenRecord, TokenStore, UserStore};

/// Per-wallet mutual exclusion. Entries are pruned once no completion holds
/// them, so the map tracks only wallets currently in flight.
#[derive(Clone, Default)]
struct WalletLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl WalletLocks {
    async fn acquire(&self, wallet: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(wallet.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

#[derive(Clone)]
pub struct CompletionHandler {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    effects: SideEffects,
    locks: WalletLocks,
}

impl CompletionHandler {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        effects: SideEffects,
    ) -> Self {
        Self {
            tokens,
            users,
            effects,
            locks: WalletLocks::default(),
        }
    }

    /// Consume `record` and link `wallet_address` to its account.
    ///
    /// Callers that may be cancelled mid-request should drive this through
    /// `tokio::spawn` so the sequence runs to the end once started.
    pub async fn complete(
        &self,
        record: TokenRecord,
        wallet_address: String,
        source_ip: String,
    ) -> Result<(), VerifyError> {
        let _guard = self.locks.acquire(&wallet_address).await;
        let now = OffsetDateTime::now_utc();

        // Is the wallet already claimed by someone else?
        if let Some(holder) = self
            .users
            .find_by_wallet(&wallet_address)
            .await
            .map_err(VerifyError::Internal)?
        {
            if holder.discord_id != record.account_id {
                warn!(
                    wallet = %wallet_address,
                    holder = %holder.discord_id,
                    requester = %record.account_id,
                    "wallet already linked to another account"
                );
                return Err(VerifyError::WalletTaken);
            }
        }

        // Consume the token: pending -> completed, exactly once. A replay
        // lands here and fails without re-running anything below.
        let consumed = self
            .tokens
            .complete(&record.token, &wallet_address, &source_ip, now)
            .await
            .map_err(VerifyError::Internal)?;
        if !consumed {
            return Err(VerifyError::InvalidToken);
        }

        // Link; the storage uniqueness constraint backs up the pre-check.
        let linked = self
            .users
            .link_wallet(&record.account_id, &wallet_address)
            .await
            .map_err(VerifyError::Internal)?;
        if !linked {
            return Err(VerifyError::WalletTaken);
        }

        info!(
            account = %record.account_id,
            wallet = %wallet_address,
            "wallet verification completed"
        );

        // Best-effort from here on; the link above is the outcome.
        self.effects.dispatch(VerificationCompleted {
            account_id: record.account_id,
            user_id: record.user_id,
            wallet_address,
            source_ip,
        });

        Ok(())
    }
}
