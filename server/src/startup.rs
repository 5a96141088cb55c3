// server/src/startup.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::commands::CommandSurface;
use crate::completion::CompletionHandler;
use crate::config::Config;
use crate::rate_limit::{RateLimitConfig, SubmissionRateLimiter};
use crate::routes;
use crate::sidefx::{CommunityGateway, NullGateway, SideEffects};
use crate::store::{
    AnalyticsSink, MemoryAnalytics, MemoryTokenStore, MemoryUserStore, PgStores, TokenStore,
    UserStore,
};
use crate::token::TokenIssuer;
use crate::AppState;

pub struct Application {
    listener: TcpListener,
    router: Router,
    tls: Option<RustlsConfig>,
    surface: CommandSurface,
    port: u16,
}

impl Application {
    /// Build with no Discord process attached; role grants and notifications
    /// are logged and skipped.
    pub async fn build(config: Config) -> Result<Self> {
        Self::build_with_gateway(config, Arc::new(NullGateway)).await
    }

    /// Build with a live gateway. The embedding Discord process passes its
    /// implementation here so completions reach the guilds.
    pub async fn build_with_gateway(
        config: Config,
        gateway: Arc<dyn CommunityGateway>,
    ) -> Result<Self> {
        // 1. Storage backend selection
        let (tokens, users, analytics): (
            Arc<dyn TokenStore>,
            Arc<dyn UserStore>,
            Arc<dyn AnalyticsSink>,
        ) = match &config.database_url {
            Some(url) => {
                let stores = PgStores::connect(url)
                    .await
                    .context("Failed to initialize postgres stores")?;
                (
                    Arc::new(stores.clone()),
                    Arc::new(stores.clone()),
                    Arc::new(stores),
                )
            }
            None => {
                warn!("⚠️  DATABASE_URL not set; using in-memory stores (state is lost on restart)");
                (
                    Arc::new(MemoryTokenStore::default()),
                    Arc::new(MemoryUserStore::default()),
                    Arc::new(MemoryAnalytics::default()),
                )
            }
        };

        // 2. Core components
        let issuer = TokenIssuer::new(config.token_secret.clone(), config.token_ttl);
        let effects = SideEffects::new(
            gateway,
            analytics.clone(),
            config.verified_role_name.clone(),
            config.side_effect_timeout,
        );
        let completion = Arc::new(CompletionHandler::new(
            tokens.clone(),
            users.clone(),
            effects,
        ));
        let rate_limiter = SubmissionRateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit_max,
            window: config.rate_limit_window,
        });

        let state = Arc::new(AppState {
            tokens: tokens.clone(),
            issuer: issuer.clone(),
            rate_limiter,
            completion,
            behind_proxy: config.behind_proxy,
        });

        // 3. Expiry sweeper: stale pending rows are flipped explicitly so
        // stats and audits see them, not just derived-expired.
        let sweeper_tokens = tokens.clone();
        let sweep_interval = config.sweep_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                match sweeper_tokens.mark_expired(OffsetDateTime::now_utc()).await {
                    Ok(0) => {}
                    Ok(n) => debug!("expired {n} stale verification tokens"),
                    Err(e) => warn!("token expiry sweep failed: {e:#}"),
                }
            }
        });

        // 4. Router & listener
        let router = router(state);

        let tls = match &config.tls {
            Some(tls_conf) => {
                let rustls = RustlsConfig::from_pem_file(&tls_conf.cert_path, &tls_conf.key_path)
                    .await
                    .context("Failed to load TLS certificate/key pair")?;
                info!("🔐 TLS enabled");
                Some(rustls)
            }
            None => None,
        };

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .context("Failed to bind TCP listener")?;
        let port = listener.local_addr()?.port();

        info!("🚀 Verification server ready at {}", config.bind_addr);

        let surface = CommandSurface::new(tokens, users, analytics, issuer, config.base_url);

        Ok(Self {
            listener,
            router,
            tls,
            surface,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Handle for the Discord collaborator: commands and buttons act on the
    /// same stores and issuer as the HTTP surface.
    pub fn command_surface(&self) -> CommandSurface {
        self.surface.clone()
    }

    pub async fn run(self) -> Result<()> {
        let make_service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            Some(tls) => {
                let std_listener = self
                    .listener
                    .into_std()
                    .context("Failed to convert listener")?;
                axum_server::from_tcp_rustls(std_listener, tls)
                    .serve(make_service)
                    .await
                    .context("Server error")
            }
            None => axum::serve(self.listener, make_service)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error"),
        }
    }
}

/// Route table shared by the binary and the integration tests.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/verify/:token", get(routes::page::handle))
        .route(
            "/api/verify",
            post(routes::verify::handle).options(routes::verify::preflight),
        )
        .route("/health", get(routes::health::handle))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
}
