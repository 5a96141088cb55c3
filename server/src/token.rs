// server/src/token.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Verification token issuance.
//!
//! A token is the string the wallet owner signs, and also the lookup key for
//! the stored verification attempt. It is self-describing:
//! `base64url(claims) "." base64url(HMAC-SHA256(secret, payload))`, where the
//! claims carry the requesting identity, issuance/expiry timestamps and a
//! 128-bit random nonce. The embedded expiry and the stored row's expiry are
//! written from the same claims, so the two always agree.

use std::fmt;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

type HmacSha256 = Hmac<Sha256>;

/// Literal prefix of the message the wallet extension signs.
pub const SIGNING_MESSAGE_PREFIX: &str = "Confirming wallet ownership for request: ";

/// The exact string a wallet owner is asked to sign for `token`.
pub fn signing_message(token: &str) -> String {
    format!("{SIGNING_MESSAGE_PREFIX}{token}")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account whose wallet gets linked.
    #[serde(rename = "sub")]
    pub account_id: String,
    /// User to notify and role-grant (usually the same as `sub`).
    #[serde(rename = "uid")]
    pub user_id: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    pub nonce: String,
}

#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::BadSignature => write!(f, "token signature mismatch"),
            TokenError::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Mints and validates HMAC-signed verification tokens.
///
/// Issuance is side-effect free; persisting the token is the caller's
/// separate, explicit step so construction and storage failures stay
/// distinguishable.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<Vec<u8>>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account_id: &str, user_id: &str) -> anyhow::Result<IssuedToken> {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let now = OffsetDateTime::now_utc();
        let claims = TokenClaims {
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
            issued_at: now.unix_timestamp(),
            expires_at: (now + self.ttl).unix_timestamp(),
            nonce: Base64UrlUnpadded::encode_string(&nonce),
        };

        let token = self.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    fn encode(&self, claims: &TokenClaims) -> anyhow::Result<String> {
        let payload = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims)?);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("hmac init: {e}"))?;
        mac.update(payload.as_bytes());
        let digest = mac.finalize().into_bytes();
        let tag = Base64UrlUnpadded::encode_string(digest.as_slice());
        Ok(format!("{payload}.{tag}"))
    }

    /// Verify the MAC and parse the claims. Does not check expiry.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (payload, tag) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let tag = Base64UrlUnpadded::decode_vec(tag).map_err(|_| TokenError::Malformed)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Malformed)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).map_err(|_| TokenError::BadSignature)?;

        let raw = Base64UrlUnpadded::decode_vec(payload).map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)
    }

    /// `decode`, plus the embedded expiry checked against `now`.
    pub fn decode_valid_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.decode(token)?;
        if now.unix_timestamp() >= claims.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
