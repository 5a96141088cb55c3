// server/src/routes/verify.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Submission endpoint. The pipeline runs strictly in order: rate limit,
//! structural validation, wallet format, token checks, signature, then the
//! completion handler. Each rejection short-circuits with its own error
//! class; anything unexpected becomes a generic 500 at the boundary.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use time::OffsetDateTime;
use walletgate_common::api::{VerifyAccepted, VerifySubmission};

use crate::error::VerifyError;
use crate::signature;
use crate::token::signing_message;
use crate::AppState;

/// Client address used for rate limiting. `X-Forwarded-For` is honoured only
/// when the server is explicitly configured as proxied.
pub fn client_ip(
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    behind_proxy: bool,
    headers: &HeaderMap,
) -> String {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    connect_info
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// POST /api/verify
pub async fn handle(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<VerifySubmission>, JsonRejection>,
) -> Result<Json<VerifyAccepted>, VerifyError> {
    let ip = client_ip(connect_info.as_ref(), state.behind_proxy, &headers);

    // A 429 does not consume a verification attempt.
    state.rate_limiter.check(&ip).await?;

    let Json(submission) = payload.map_err(|_| VerifyError::MissingData)?;
    if submission.token.is_empty()
        || submission.wallet_address.is_empty()
        || submission.signature.is_empty()
    {
        return Err(VerifyError::MissingData);
    }

    if !signature::is_valid_wallet_address(&submission.wallet_address) {
        return Err(VerifyError::InvalidWallet);
    }

    // The token is self-describing: its MAC and embedded expiry must hold,
    // and the stored row must still be pending. One generic error either way.
    let now = OffsetDateTime::now_utc();
    state
        .issuer
        .decode_valid_at(&submission.token, now)
        .map_err(|_| VerifyError::InvalidToken)?;
    let record = state
        .tokens
        .get(&submission.token)
        .await
        .map_err(VerifyError::Internal)?
        .filter(|r| r.is_pending_at(now))
        .ok_or(VerifyError::InvalidToken)?;

    let message = signing_message(&record.token);
    signature::validate(&submission.wallet_address, &submission.signature, &message)?;

    // Spawned so a dropped client connection cannot abandon the sequence
    // between the token transition and the wallet link.
    let completion = state.completion.clone();
    let wallet = submission.wallet_address.clone();
    tokio::spawn(async move { completion.complete(record, wallet, ip).await })
        .await
        .map_err(|e| VerifyError::Internal(anyhow::anyhow!("completion task failed: {e}")))??;

    Ok(Json(VerifyAccepted::new(
        "Wallet verified successfully! You can now return to Discord.",
    )))
}

/// OPTIONS /api/verify — an empty response the CORS layer decorates.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}
