// SPDX-License-Identifier: Apache-2.0 OR MIT
// Wallet uniqueness under contention: two accounts racing to claim the same
// wallet must resolve to exactly one winner, and the table never ends up
// with the wallet on two accounts.

mod support;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use walletgate_server::commands::{CommandOrigin, StartVerification};
use walletgate_server::store::{TokenStore, UserStore};

use support::*;

async fn issue_token(app: &TestApp, account: &str) -> String {
    match app
        .surface
        .start_verification(account, account, CommandOrigin::Command)
        .await
        .unwrap()
    {
        StartVerification::FreshLink { url } => token_from_url(&url),
        other => panic!("expected a fresh link, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_submissions_have_a_single_winner() {
    let app = test_app();
    let (key, address) = wallet(42);

    let token_a = issue_token(&app, "alice").await;
    let token_b = issue_token(&app, "bob").await;

    let body_a = signed_submission(&token_a, &key, &address);
    let body_b = signed_submission(&token_b, &key, &address);

    let ((status_a, json_a), (status_b, json_b)) = tokio::join!(
        post_json(&app.router, "/api/verify", &body_a),
        post_json(&app.router, "/api/verify", &body_b),
    );

    let outcomes = [(status_a, &json_a), (status_b, &json_b)];
    let winners = outcomes.iter().filter(|(s, _)| *s == StatusCode::OK).count();
    assert_eq!(winners, 1, "exactly one submission may succeed");

    let (_, loser_body) = outcomes
        .iter()
        .find(|(s, _)| *s == StatusCode::BAD_REQUEST)
        .expect("the other submission must fail with 400");
    assert_eq!(
        loser_body["error"],
        "This wallet is already linked to another account"
    );

    // The wallet belongs to exactly one of the two accounts.
    let holder = app.users.find_by_wallet(&address).await.unwrap().unwrap();
    assert!(["alice", "bob"].contains(&holder.discord_id.as_str()));

    let verified = [
        app.users.get("alice").await.unwrap(),
        app.users.get("bob").await.unwrap(),
    ]
    .into_iter()
    .flatten()
    .filter(|u| u.wallet_verified)
    .count();
    assert_eq!(verified, 1);

    // Side effects fired only for the winner.
    settle().await;
    assert_eq!(app.gateway.roles.load(Ordering::SeqCst), 1);
    assert_eq!(app.gateway.notices.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequential_claim_of_a_taken_wallet_fails_cleanly() {
    let app = test_app();
    let (key, address) = wallet(42);

    // Alice links the wallet.
    let token_a = issue_token(&app, "alice").await;
    let (status, _) =
        post_json(&app.router, "/api/verify", &signed_submission(&token_a, &key, &address)).await;
    assert_eq!(status, StatusCode::OK);

    // Bob tries the same wallet with his own valid token.
    let token_b = issue_token(&app, "bob").await;
    let (status, json) =
        post_json(&app.router, "/api/verify", &signed_submission(&token_b, &key, &address)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "This wallet is already linked to another account"
    );

    // Bob is untouched; his token was not consumed by the conflict.
    assert!(app.users.get("bob").await.unwrap().is_none());
    let record = app.tokens.get(&token_b).await.unwrap().unwrap();
    assert!(record.is_pending_at(time::OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn an_account_may_resubmit_its_own_wallet() {
    use walletgate_server::store::{TokenRecord, TokenStatus};

    let app = test_app();
    let (key, address) = wallet(42);

    let token_a = issue_token(&app, "alice").await;
    let (status, _) =
        post_json(&app.router, "/api/verify", &signed_submission(&token_a, &key, &address)).await;
    assert_eq!(status, StatusCode::OK);

    // The command surface would short-circuit a verified account, so seed a
    // second live token directly: the conflict pre-check sees the same
    // holder and lets the relink through.
    let issued = app.issuer.issue("alice", "alice").unwrap();
    let now = time::OffsetDateTime::now_utc();
    app.tokens
        .insert(TokenRecord {
            token: issued.token.clone(),
            account_id: "alice".into(),
            user_id: "alice".into(),
            status: TokenStatus::Pending,
            created_at: now,
            expires_at: now + time::Duration::minutes(10),
            wallet_address: None,
            source_ip: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    let (status, json) =
        post_json(&app.router, "/api/verify", &signed_submission(&issued.token, &key, &address))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}
