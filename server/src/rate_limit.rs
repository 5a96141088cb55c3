// server/src/rate_limit.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Per-client sliding-window rate limiting for verification submissions.
//!
//! State is process-local and resets on restart; this is abuse mitigation,
//! not an authentication boundary. A rejected request does not consume a
//! slot, so a blocked client regains capacity as soon as the window slides
//! past its oldest accepted request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

#[derive(Clone)]
pub struct SubmissionRateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl SubmissionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record the request if the client has capacity, otherwise reject
    /// without touching the window.
    pub async fn check(&self, client: &str) -> Result<(), RateLimited> {
        self.check_at(client, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut state = self.state.lock().await;

        // Drop clients whose whole window has passed so the map stays bounded.
        let window = self.config.window;
        state.retain(|_, hits| hits.iter().any(|&t| now.duration_since(t) < window));

        let hits = state.entry(client.to_string()).or_default();
        hits.retain(|&t| now.duration_since(t) < window);

        if hits.len() >= self.config.max_requests as usize {
            // Entries are appended in order, so the front is the oldest.
            let oldest = hits[0];
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return Err(RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        hits.push(now);
        Ok(())
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.state.lock().await.len()
    }
}
