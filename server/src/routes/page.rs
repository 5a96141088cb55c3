// server/src/routes/page.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use time::OffsetDateTime;
use tracing::error;

use crate::pages;
use crate::AppState;

/// GET /verify/:token
///
/// Missing, expired and consumed tokens all render the same generic page so
/// the URL does not reveal which case occurred.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Html<String> {
    let now = OffsetDateTime::now_utc();
    match state.tokens.get(&token).await {
        Ok(Some(record)) if record.is_pending_at(now) => {
            Html(pages::verification_page(&record.token))
        }
        Ok(_) => Html(pages::error_page()),
        Err(e) => {
            error!("token lookup failed: {e:#}");
            Html(pages::error_page())
        }
    }
}
