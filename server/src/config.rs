// server/src/config.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;
use walletgate_common::duration::env_duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Base of the links handed to users; switches between the self-hosted
    /// server and an externally hosted verification page.
    pub base_url: String,
    pub token_secret: String,
    pub token_ttl: time::Duration,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub behind_proxy: bool,
    /// Unset means in-memory stores (development only).
    pub database_url: Option<String>,
    pub verified_role_name: String,
    pub tls: Option<TlsConfig>,
    pub side_effect_timeout: Duration,
    pub sweep_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr: SocketAddr = bind_str
            .parse()
            .context(format!("Invalid BIND_ADDR: {bind_str}"))?;

        let base_url =
            env::var("VERIFICATION_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let token_secret = match env::var("TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("⚠️  TOKEN_SECRET not set; using an ephemeral secret (tokens will not survive restarts)");
                let mut buf = [0u8; 32];
                OsRng.fill_bytes(&mut buf);
                Base64UrlUnpadded::encode_string(&buf)
            }
        };

        let token_ttl_secs = env_duration("TOKEN_TTL", 600).clamp(60, 24 * 3600);

        Ok(Self {
            bind_addr,
            base_url,
            token_secret,
            token_ttl: time::Duration::seconds(token_ttl_secs as i64),
            rate_limit_max: env_u32("RATE_LIMIT_MAX", 10),
            rate_limit_window: Duration::from_secs(env_duration("RATE_LIMIT_WINDOW", 60)),
            behind_proxy: env_bool("BEHIND_PROXY"),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            verified_role_name: env::var("VERIFIED_ROLE_NAME")
                .unwrap_or_else(|_| "Verified".to_string()),
            tls: TlsConfig::from_env(),
            side_effect_timeout: Duration::from_secs(env_duration("SIDE_EFFECT_TIMEOUT", 10)),
            sweep_interval: Duration::from_secs(env_duration("TOKEN_SWEEP_INTERVAL", 60).max(1)),
        })
    }
}

impl TlsConfig {
    fn from_env() -> Option<Self> {
        // Only serve TLS when both halves of the pair are configured.
        match (env::var("SSL_CERT_PATH"), env::var("SSL_KEY_PATH")) {
            (Ok(cert), Ok(key)) if !cert.is_empty() && !key.is_empty() => Some(Self {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        }
    }
}

// Helpers
fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BIND_ADDR",
            "VERIFICATION_URL",
            "TOKEN_SECRET",
            "TOKEN_TTL",
            "RATE_LIMIT_MAX",
            "RATE_LIMIT_WINDOW",
            "BEHIND_PROXY",
            "DATABASE_URL",
            "VERIFIED_ROLE_NAME",
            "SSL_CERT_PATH",
            "SSL_KEY_PATH",
            "SIDE_EFFECT_TIMEOUT",
            "TOKEN_SWEEP_INTERVAL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_are_sane() {
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.token_ttl.whole_seconds(), 600);
        assert_eq!(config.rate_limit_max, 10);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert!(!config.behind_proxy);
        assert!(config.database_url.is_none());
        assert_eq!(config.verified_role_name, "Verified");
        assert!(config.tls.is_none());
        // Ephemeral secret was generated.
        assert!(!config.token_secret.is_empty());
    }

    #[test]
    #[serial]
    fn ttl_accepts_human_readable_durations_and_clamps() {
        clear_env();

        env::set_var("TOKEN_TTL", "5m");
        assert_eq!(Config::from_env().unwrap().token_ttl.whole_seconds(), 300);

        env::set_var("TOKEN_TTL", "5s");
        assert_eq!(Config::from_env().unwrap().token_ttl.whole_seconds(), 60);

        env::remove_var("TOKEN_TTL");
    }

    #[test]
    #[serial]
    fn tls_requires_both_paths() {
        clear_env();

        env::set_var("SSL_CERT_PATH", "/tmp/cert.pem");
        assert!(Config::from_env().unwrap().tls.is_none());

        env::set_var("SSL_KEY_PATH", "/tmp/key.pem");
        let tls = Config::from_env().unwrap().tls.unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/tmp/cert.pem"));
        assert_eq!(tls.key_path, PathBuf::from("/tmp/key.pem"));

        env::remove_var("SSL_CERT_PATH");
        env::remove_var("SSL_KEY_PATH");
    }

    #[test]
    #[serial]
    fn invalid_bind_addr_is_an_error() {
        clear_env();

        env::set_var("BIND_ADDR", "not-an-address");
        assert!(Config::from_env().is_err());
        env::remove_var("BIND_ADDR");
    }

    #[test]
    #[serial]
    fn explicit_secret_is_kept() {
        clear_env();

        env::set_var("TOKEN_SECRET", "a-configured-secret");
        assert_eq!(Config::from_env().unwrap().token_secret, "a-configured-secret");
        env::remove_var("TOKEN_SECRET");
    }
}
