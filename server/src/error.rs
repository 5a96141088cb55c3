// server/src/error.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Request-level error taxonomy for the verification surface.
//!
//! Every rejection maps to the stable `{success:false, error}` body; internal
//! faults are logged with full detail server-side and the caller only ever
//! sees a generic message. Token failures (missing, expired, consumed) share
//! one message so the response does not leak which case occurred.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;
use walletgate_common::api::VerifyRejected;

use crate::rate_limit::RateLimited;
use crate::signature::SignatureError;

#[derive(Debug)]
pub enum VerifyError {
    /// Required fields absent or the body failed to parse.
    MissingData,
    /// Wallet address fails the chain's format constraints.
    InvalidWallet,
    /// Token not found, expired, or already completed.
    InvalidToken,
    /// Signature does not verify over the expected message.
    InvalidSignature,
    RateLimited { retry_after_secs: u64 },
    /// Wallet already linked to a different account. No state was mutated.
    WalletTaken,
    Internal(anyhow::Error),
}

impl VerifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerifyError::MissingData
            | VerifyError::InvalidWallet
            | VerifyError::InvalidToken
            | VerifyError::InvalidSignature
            | VerifyError::WalletTaken => StatusCode::BAD_REQUEST,
            VerifyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            VerifyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::MissingData => {
                write!(f, "Missing data: token, walletAddress and signature are required")
            }
            VerifyError::InvalidWallet => write!(f, "Invalid Solana wallet address"),
            VerifyError::InvalidToken => write!(f, "Invalid or expired verification token"),
            VerifyError::InvalidSignature => write!(f, "Signature verification failed"),
            VerifyError::RateLimited { .. } => {
                write!(f, "Rate limit exceeded. Please try again later.")
            }
            VerifyError::WalletTaken => {
                write!(f, "This wallet is already linked to another account")
            }
            VerifyError::Internal(_) => {
                write!(f, "Internal server error. Please try again later.")
            }
        }
    }
}

impl From<anyhow::Error> for VerifyError {
    fn from(e: anyhow::Error) -> Self {
        VerifyError::Internal(e)
    }
}

impl From<RateLimited> for VerifyError {
    fn from(e: RateLimited) -> Self {
        VerifyError::RateLimited {
            retry_after_secs: e.retry_after_secs,
        }
    }
}

impl From<SignatureError> for VerifyError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::InvalidAddress => VerifyError::InvalidWallet,
            SignatureError::InvalidSignature => VerifyError::InvalidSignature,
        }
    }
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        if let VerifyError::Internal(ref cause) = self {
            error!("verification request failed: {cause:#}");
        }
        let body = Json(VerifyRejected::new(self.to_string()));
        (self.status_code(), body).into_response()
    }
}
