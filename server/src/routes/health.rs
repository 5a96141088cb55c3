// server/src/routes/health.rs
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2026 Walletgate Contributors

use axum::Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use walletgate_common::api::HealthResp;

/// GET /health
pub async fn handle() -> Json<HealthResp> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(HealthResp {
        status: "healthy".into(),
        timestamp,
    })
}
