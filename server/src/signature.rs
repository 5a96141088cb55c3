// server/src/signature.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

//! Wallet signature validation.
//!
//! Pure functions, no I/O. A Solana wallet address is the base58 encoding of
//! an ed25519 public key, so validation decodes the address and performs real
//! signature verification over the expected message.

use std::fmt;

use ed25519_dalek::{Signature, VerifyingKey};

/// ed25519 signatures are exactly this long on the wire.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    /// The wallet address is not a valid base58-encoded ed25519 key.
    InvalidAddress,
    /// Wrong length, or the signature does not verify over the message.
    InvalidSignature,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::InvalidAddress => write!(f, "invalid wallet address"),
            SignatureError::InvalidSignature => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for SignatureError {}

fn decode_address(address: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(address).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Base58 string that decodes to a 32-byte key. Length bounds first: valid
/// encodings fall in 32..=44 characters.
pub fn is_valid_wallet_address(address: &str) -> bool {
    (32..=44).contains(&address.len()) && decode_address(address).is_some()
}

/// Verify that `signature` is a valid ed25519 signature over `message` under
/// the public key encoded in `wallet_address`.
pub fn validate(
    wallet_address: &str,
    signature: &[u8],
    message: &str,
) -> Result<(), SignatureError> {
    let key_bytes = decode_address(wallet_address).ok_or(SignatureError::InvalidAddress)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidAddress)?;

    let sig_bytes: [u8; SIGNATURE_LEN] = signature
        .try_into()
        .map_err(|_| SignatureError::InvalidSignature)?;
    let sig = Signature::from_bytes(&sig_bytes);

    key.verify_strict(message.as_bytes(), &sig)
        .map_err(|_| SignatureError::InvalidSignature)
}
