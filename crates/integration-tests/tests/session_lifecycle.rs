//! Session lifecycle against the in-process backend.
//!
//! Covers sign-up, sign-in and sign-out, background reconciliation through
//! `check_user`, lazy profile creation and reactions to auth push events.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use tokio::time::timeout;

use trendmart_integration_tests::{PASSWORD, TestShop};
use trendmart_storefront::models::{ProfileUpdate, SessionPhase};
use trendmart_storefront::services::auth::{AuthError, AuthProvider};
use trendmart_storefront::session::SessionError;

const EVENT_WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_check_user_without_session_settles_unauthenticated() {
    let shop = TestShop::new();
    let session = shop.session();
    assert_eq!(session.snapshot().phase(), SessionPhase::Authenticating);

    session.check_user().await;

    let state = session.snapshot();
    assert!(state.user().is_none());
    assert!(state.profile().is_none());
    assert!(!state.loading());
    assert_eq!(state.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_check_user_creates_missing_profile_from_email() {
    let shop = TestShop::new();
    let user = shop.register_without_profile("dana.k@example.com").await;

    shop.session().check_user().await;

    let state = shop.session().snapshot();
    assert_eq!(state.user().unwrap().id, user.id);
    let profile = state.profile().unwrap();
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.username, "dana.k");
    assert!(!state.loading());

    // A second reconciliation finds the row instead of inserting again.
    shop.session().check_user().await;
    assert_eq!(shop.profile_rows().len(), 1);
}

#[tokio::test]
async fn test_concurrent_profile_fetches_create_one_profile() {
    let shop = TestShop::new();
    let user = shop.register_without_profile("erin@example.com").await;
    let other_tab = shop.second_session();

    // The first tab finds no profile and stalls right before inserting one.
    let release = shop.data.pause_next_insert();
    let first_tab = tokio::spawn({
        let session = shop.session().clone();
        async move { session.check_user().await }
    });
    shop.data.insert_paused().await;

    other_tab.check_user().await;
    assert_eq!(shop.profile_rows().len(), 1);

    // Its insert now collides on the id and it adopts the existing row.
    release.notify_one();
    first_tab.await.unwrap();

    let rows = shop.profile_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], user.id.as_str());

    let mine = shop.session().snapshot();
    let theirs = other_tab.snapshot();
    assert_eq!(mine.profile().unwrap().username, "erin");
    assert_eq!(mine.profile(), theirs.profile());
}

#[tokio::test]
async fn test_repeated_profile_fetches_on_one_controller() {
    let shop = TestShop::new();
    let user = shop.register_without_profile("erin@example.com").await;
    shop.session().check_user().await;

    tokio::join!(
        shop.session().fetch_user_profile(&user.id),
        shop.session().fetch_user_profile(&user.id),
    );

    assert_eq!(shop.profile_rows().len(), 1);
    assert_eq!(shop.session().snapshot().profile().unwrap().username, "erin");
}

#[tokio::test]
async fn test_colliding_default_username_gets_id_suffix() {
    let shop = TestShop::new();
    shop.seed_profile("someone-else", "frank");
    let user = shop.register_without_profile("frank@example.com").await;

    shop.session().check_user().await;

    let profile = shop.session().snapshot().profile().cloned().unwrap();
    let suffix: String = user
        .id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(6)
        .collect();
    assert_eq!(profile.username, format!("frank_{suffix}"));
    assert_eq!(shop.profile_rows().len(), 2);
}

#[tokio::test]
async fn test_stale_check_user_does_not_override_sign_out() {
    let shop = TestShop::new();
    let session = shop.session();
    session.sign_up("gia@example.com", PASSWORD, "gia").await.unwrap();

    let release = shop.auth.pause_next_user_read();
    let slow_check = tokio::spawn({
        let session = session.clone();
        async move { session.check_user().await }
    });
    shop.auth.user_read_paused().await;

    session.sign_out().await.unwrap();
    release.notify_one();
    slow_check.await.unwrap();

    let state = session.snapshot();
    assert!(state.user().is_none());
    assert!(state.profile().is_none());
    assert!(!state.loading());
}

#[tokio::test]
async fn test_recheck_keeps_signed_in_user_authenticated() {
    let shop = TestShop::new();
    let session = shop.session();
    session.sign_up("gil@example.com", PASSWORD, "gil").await.unwrap();

    let release = shop.auth.pause_next_user_read();
    let recheck = tokio::spawn({
        let session = session.clone();
        async move { session.check_user().await }
    });
    shop.auth.user_read_paused().await;

    let during = session.snapshot();
    assert!(!during.loading());
    assert!(during.profile().is_some());
    assert_eq!(during.phase(), SessionPhase::Authenticated);

    release.notify_one();
    recheck.await.unwrap();
    assert_eq!(session.snapshot().phase(), SessionPhase::Authenticated);
    assert_eq!(session.snapshot().profile().unwrap().username, "gil");
}

// ============================================================================
// Sign up / sign in / sign out
// ============================================================================

#[tokio::test]
async fn test_sign_up_creates_account_and_profile() {
    let shop = TestShop::new();
    let user = shop
        .session()
        .sign_up("hana@example.com", PASSWORD, "  hana  ")
        .await
        .unwrap();

    assert_eq!(user.user_metadata.username.as_deref(), Some("hana"));
    let state = shop.session().snapshot();
    assert_eq!(state.phase(), SessionPhase::Authenticated);
    assert_eq!(state.profile().unwrap().username, "hana");
    assert_eq!(shop.auth.sign_up_calls(), 1);
}

#[tokio::test]
async fn test_sign_up_with_taken_username_never_reaches_provider() {
    let shop = TestShop::new();
    shop.seed_profile("existing-user", "ivan");

    let result = shop
        .session()
        .sign_up("ivan@example.com", PASSWORD, "ivan")
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::UsernameTaken));
    assert_eq!(err.to_string(), "Username is already taken. Please choose another one.");
    assert_eq!(shop.auth.sign_up_calls(), 0);
    assert_eq!(shop.memory_auth.account_count(), 0);
}

#[tokio::test]
async fn test_sign_up_never_falls_back_to_another_username() {
    let shop = TestShop::new();

    // Someone claims the username after the check but before the insert.
    let release = shop.data.pause_next_insert();
    let sign_up = tokio::spawn({
        let session = shop.session().clone();
        async move { session.sign_up("yara@example.com", PASSWORD, "yara").await }
    });
    shop.data.insert_paused().await;
    shop.seed_profile("someone-else", "yara");
    release.notify_one();

    let result = sign_up.await.unwrap();
    assert!(matches!(result, Err(SessionError::UsernameTaken)));
    assert_eq!(shop.auth.sign_up_calls(), 1);

    let rows = shop.profile_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "someone-else");

    // The account exists and stays signed in without a profile.
    let state = shop.session().snapshot();
    assert!(state.user().is_some());
    assert!(state.profile().is_none());
    assert!(!state.loading());
}

#[tokio::test]
async fn test_sign_up_rejects_blank_username_and_bad_email() {
    let shop = TestShop::new();

    let blank = shop.session().sign_up("jo@example.com", PASSWORD, "   ").await;
    assert!(matches!(blank, Err(SessionError::UsernameRequired)));

    let bad_email = shop.session().sign_up("not-an-email", PASSWORD, "jo").await;
    assert!(matches!(bad_email, Err(SessionError::InvalidEmail(_))));

    assert_eq!(shop.auth.sign_up_calls(), 0);
}

#[tokio::test]
async fn test_sign_up_surfaces_provider_message() {
    let shop = TestShop::new();
    let err = shop
        .session()
        .sign_up("kim@example.com", "12345", "kim")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    let state = shop.session().snapshot();
    assert!(state.user().is_none());
    assert!(!state.loading());
}

#[tokio::test]
async fn test_sign_in_loads_existing_profile() {
    let shop = TestShop::new();
    let created = shop
        .session()
        .sign_up("lee@example.com", PASSWORD, "lee")
        .await
        .unwrap();
    shop.session().sign_out().await.unwrap();
    assert!(shop.session().current_user().is_none());

    let user = shop.session().sign_in("lee@example.com", PASSWORD).await.unwrap();

    assert_eq!(user.id, created.id);
    let state = shop.session().snapshot();
    assert_eq!(state.profile().unwrap().username, "lee");
    assert_eq!(shop.profile_rows().len(), 1);
}

#[tokio::test]
async fn test_sign_in_with_wrong_password() {
    let shop = TestShop::new();
    shop.session()
        .sign_up("max@example.com", PASSWORD, "max")
        .await
        .unwrap();
    shop.session().sign_out().await.unwrap();

    let err = shop
        .session()
        .sign_in("max@example.com", "wrong-password")
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Auth(AuthError::InvalidCredentials)));
    assert_eq!(err.to_string(), "Invalid login credentials");
    let state = shop.session().snapshot();
    assert_eq!(state.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_sign_out_clears_state_even_when_provider_fails() {
    let shop = TestShop::new();
    shop.session()
        .sign_up("noor@example.com", PASSWORD, "noor")
        .await
        .unwrap();
    shop.auth.fail_sign_out(true);

    let err = shop.session().sign_out().await.unwrap_err();

    assert_eq!(err.to_string(), "503 Service Unavailable");
    let state = shop.session().snapshot();
    assert!(state.user().is_none());
    assert!(state.profile().is_none());
    assert!(!state.loading());
}

// ============================================================================
// Profile edits
// ============================================================================

#[tokio::test]
async fn test_update_profile() {
    let shop = TestShop::new();
    shop.seed_profile("someone-else", "taken");
    shop.session()
        .sign_up("olga@example.com", PASSWORD, "olga")
        .await
        .unwrap();

    let saved = shop
        .session()
        .update_profile(ProfileUpdate {
            username: "olga_p".to_owned(),
            full_name: Some("Olga Petrova".to_owned()),
            address: Some("  ".to_owned()),
            phone: None,
        })
        .await
        .unwrap();

    assert_eq!(saved.username, "olga_p");
    assert_eq!(saved.full_name.as_deref(), Some("Olga Petrova"));
    assert!(saved.address.is_none());
    assert_eq!(shop.session().snapshot().profile(), Some(&saved));

    let clash = shop
        .session()
        .update_profile(ProfileUpdate {
            username: "taken".to_owned(),
            ..ProfileUpdate::default()
        })
        .await;
    assert!(matches!(clash, Err(SessionError::UsernameTaken)));
    assert_eq!(shop.session().snapshot().profile().unwrap().username, "olga_p");
}

#[tokio::test]
async fn test_update_profile_requires_sign_in() {
    let shop = TestShop::new();
    shop.session().check_user().await;

    let result = shop
        .session()
        .update_profile(ProfileUpdate {
            username: "pat".to_owned(),
            ..ProfileUpdate::default()
        })
        .await;

    assert!(matches!(result, Err(SessionError::NotAuthenticated)));
}

// ============================================================================
// Auth events
// ============================================================================

#[tokio::test]
async fn test_listener_follows_remote_sign_out_until_unsubscribed() {
    let shop = TestShop::new();
    let session = shop.session();
    session.sign_up("quinn@example.com", PASSWORD, "quinn").await.unwrap();

    let listener = session.listen();
    assert!(listener.is_active());
    let mut changes = session.subscribe();

    shop.memory_auth.revoke_session();
    timeout(
        EVENT_WAIT,
        changes.wait_for(|s| s.phase() == SessionPhase::Unauthenticated),
    )
    .await
    .unwrap()
    .unwrap();

    listener.unsubscribe();
    tokio::task::yield_now().await;

    // Signing in behind the controller's back is no longer noticed.
    shop.memory_auth
        .sign_in_with_password(&"quinn@example.com".parse().unwrap(), PASSWORD)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.snapshot().phase(), SessionPhase::Unauthenticated);

    // Until the next explicit reconciliation.
    session.check_user().await;
    assert_eq!(session.snapshot().phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_listener_picks_up_sign_in_from_another_tab() {
    let shop = TestShop::new();
    let user = shop.register_without_profile("ravi@example.com").await;
    shop.memory_auth.revoke_session();

    let session = shop.session();
    session.check_user().await;
    assert_eq!(session.snapshot().phase(), SessionPhase::Unauthenticated);

    let _listener = session.listen();
    let mut changes = session.subscribe();

    shop.second_session()
        .sign_in("ravi@example.com", PASSWORD)
        .await
        .unwrap();

    timeout(EVENT_WAIT, changes.wait_for(|s| s.profile().is_some()))
        .await
        .unwrap()
        .unwrap();

    let state = session.snapshot();
    assert_eq!(state.user().unwrap().id, user.id);
    assert_eq!(state.profile().unwrap().username, "ravi");
}
