// SPDX-License-Identifier: Apache-2.0 OR MIT
// Shared fixtures for the end-to-end tests: an in-process app built on the
// in-memory stores, plus helpers for driving the router and signing
// submissions with a real ed25519 keypair.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use time::Duration;
use tower::ServiceExt;

use walletgate_server::commands::CommandSurface;
use walletgate_server::completion::CompletionHandler;
use walletgate_server::rate_limit::{RateLimitConfig, SubmissionRateLimiter};
use walletgate_server::sidefx::{CommunityGateway, SideEffects};
use walletgate_server::startup::router;
use walletgate_server::store::{MemoryAnalytics, MemoryTokenStore, MemoryUserStore};
use walletgate_server::token::{signing_message, TokenIssuer};
use walletgate_server::AppState;

pub struct CountingGateway {
    pub roles: AtomicUsize,
    pub notices: AtomicUsize,
}

#[async_trait::async_trait]
impl CommunityGateway for CountingGateway {
    async fn grant_role(&self, _user_id: &str, _role_name: &str) -> Result<()> {
        self.roles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_verified(&self, _user_id: &str, _wallet: &str) -> Result<()> {
        self.notices.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub surface: CommandSurface,
    pub tokens: Arc<MemoryTokenStore>,
    pub users: Arc<MemoryUserStore>,
    pub analytics: Arc<MemoryAnalytics>,
    pub gateway: Arc<CountingGateway>,
    pub issuer: TokenIssuer,
}

pub fn test_app() -> TestApp {
    test_app_with(false, Duration::minutes(10))
}

pub fn proxied_test_app() -> TestApp {
    test_app_with(true, Duration::minutes(10))
}

pub fn test_app_with(behind_proxy: bool, token_ttl: Duration) -> TestApp {
    let tokens = Arc::new(MemoryTokenStore::default());
    let users = Arc::new(MemoryUserStore::default());
    let analytics = Arc::new(MemoryAnalytics::default());
    let gateway = Arc::new(CountingGateway {
        roles: AtomicUsize::new(0),
        notices: AtomicUsize::new(0),
    });

    let issuer = TokenIssuer::new("integration-test-secret", token_ttl);
    let effects = SideEffects::new(
        gateway.clone(),
        analytics.clone(),
        "Verified",
        StdDuration::from_secs(1),
    );
    let completion = Arc::new(CompletionHandler::new(
        tokens.clone(),
        users.clone(),
        effects,
    ));

    let state = Arc::new(AppState {
        tokens: tokens.clone(),
        issuer: issuer.clone(),
        rate_limiter: SubmissionRateLimiter::new(RateLimitConfig::default()),
        completion,
        behind_proxy,
    });

    let surface = CommandSurface::new(
        tokens.clone(),
        users.clone(),
        analytics.clone(),
        issuer.clone(),
        "http://localhost:8080",
    );

    TestApp {
        router: router(state),
        surface,
        tokens,
        users,
        analytics,
        gateway,
        issuer,
    }
}

/// A deterministic wallet keypair plus its base58 address.
pub fn wallet(seed: u8) -> (SigningKey, String) {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
    (key, address)
}

/// Build a submission body with a genuine signature over the token message.
pub fn signed_submission(token: &str, key: &SigningKey, address: &str) -> serde_json::Value {
    let sig = key.sign(signing_message(token).as_bytes());
    serde_json::json!({
        "token": token,
        "walletAddress": address,
        "signature": sig.to_bytes().to_vec(),
    })
}

pub async fn post_json(
    router: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn post_json_forwarded(
    router: &Router,
    uri: &str,
    body: &serde_json::Value,
    forwarded_for: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

/// Pull the token out of a verification URL.
pub fn token_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap().to_string()
}

/// Give spawned side-effect tasks a moment to land.
pub async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(50)).await;
}
