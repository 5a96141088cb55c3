// common/src/api.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Wire types for the verification HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/verify`.
///
/// The signature arrives as the raw byte array produced by wallet
/// extensions (`Array.from(signedMessage.signature)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySubmission {
    pub token: String,
    pub wallet_address: String,
    pub signature: Vec<u8>,
}

/// Successful submission response.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyAccepted {
    pub success: bool,
    pub message: String,
}

impl VerifyAccepted {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Every rejection shares this shape, whatever the HTTP status.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRejected {
    pub success: bool,
    pub error: String,
}

impl VerifyRejected {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResp {
    pub status: String,
    pub timestamp: String,
}
