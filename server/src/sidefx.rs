// server/src/sidefx.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Post-completion side effects: role grant, user notification, analytics.
//!
//! These run as a spawned background task, decoupled from the HTTP response
//! path. Each call is bounded by a timeout and failures are logged only —
//! the wallet link is the authoritative outcome and is never rolled back
//! here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::store::{AnalyticsEvent, AnalyticsSink};

/// Port to the Discord-facing process. The gateway itself (connection,
/// guild/member lookup, embeds) lives in the collaborator that embeds this
/// server; everything behind this trait is best effort.
#[async_trait]
pub trait CommunityGateway: Send + Sync {
    /// Grant `role_name` to the member in every guild where they are present.
    async fn grant_role(&self, user_id: &str, role_name: &str) -> Result<()>;

    /// Tell the user their wallet was linked.
    async fn notify_verified(&self, user_id: &str, wallet_address: &str) -> Result<()>;
}

/// Stand-in when no Discord process is attached (standalone server, tests).
pub struct NullGateway;

#[async_trait]
impl CommunityGateway for NullGateway {
    async fn grant_role(&self, user_id: &str, role_name: &str) -> Result<()> {
        info!(user = %user_id, role = %role_name, "no gateway attached; skipping role grant");
        Ok(())
    }

    async fn notify_verified(&self, user_id: &str, wallet_address: &str) -> Result<()> {
        info!(user = %user_id, wallet = %wallet_address, "no gateway attached; skipping notification");
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct VerificationCompleted {
    pub account_id: String,
    pub user_id: String,
    pub wallet_address: String,
    pub source_ip: String,
}

#[derive(Clone)]
pub struct SideEffects {
    gateway: Arc<dyn CommunityGateway>,
    analytics: Arc<dyn AnalyticsSink>,
    role_name: String,
    call_timeout: Duration,
}

impl SideEffects {
    pub fn new(
        gateway: Arc<dyn CommunityGateway>,
        analytics: Arc<dyn AnalyticsSink>,
        role_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            analytics,
            role_name: role_name.into(),
            call_timeout,
        }
    }

    /// Fire-and-forget: the caller's response never waits on Discord.
    pub fn dispatch(&self, event: VerificationCompleted) {
        let this = self.clone();
        tokio::spawn(async move { this.run(event).await });
    }

    /// Run all effects inline. Used by `dispatch` and by tests that need
    /// deterministic completion.
    pub async fn run(&self, event: VerificationCompleted) {
        self.best_effort(
            "role grant",
            self.gateway.grant_role(&event.user_id, &self.role_name),
        )
        .await;

        self.best_effort(
            "verification notice",
            self.gateway
                .notify_verified(&event.user_id, &event.wallet_address),
        )
        .await;

        self.best_effort(
            "analytics event",
            self.analytics.record(AnalyticsEvent::new(
                "wallet_verification_completed",
                &event.account_id,
                "global",
                json!({
                    "wallet_address": event.wallet_address,
                    "ip_address": event.source_ip,
                    "verification_method": "signature",
                }),
            )),
        )
        .await;
    }

    async fn best_effort<F>(&self, what: &str, fut: F)
    where
        F: Future<Output = Result<()>>,
    {
        match timeout(self.call_timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{what} failed: {e:#}"),
            Err(_) => warn!("{what} timed out after {:?}", self.call_timeout),
        }
    }
}
