// server/src/lib.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod pages;
pub mod rate_limit;
pub mod routes;
pub mod sidefx;
pub mod signature;
pub mod startup;
pub mod store;
pub mod token;

pub use state::AppState;

pub mod state {
    use std::sync::Arc;

    use crate::completion::CompletionHandler;
    use crate::rate_limit::SubmissionRateLimiter;
    use crate::store::TokenStore;
    use crate::token::TokenIssuer;

    /// Shared state behind the HTTP handlers.
    pub struct AppState {
        pub tokens: Arc<dyn TokenStore>,
        pub issuer: TokenIssuer,
        pub rate_limiter: SubmissionRateLimiter,
        pub completion: Arc<CompletionHandler>,
        /// Trust X-Forwarded-For when extracting client addresses.
        pub behind_proxy: bool,
    }
}
