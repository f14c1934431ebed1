//! Integration tests for login token issuance and redemption.

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use relay_auth::{AuthError, TokenStore};
use relay_core::sweeper::Sweepable;
use relay_testing::MockClock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn token_store() -> (Arc<MockClock>, TokenStore) {
    let clock = Arc::new(MockClock::new());
    let store = TokenStore::new(clock.clone());
    (clock, store)
}

#[test]
fn test_issue_then_redeem_twice() {
    let (_clock, store) = token_store();

    let token = store.issue("a@x.com", None, None).unwrap();

    let intent = store.redeem(&token).unwrap();
    assert_eq!(intent.identity, "a@x.com");
    assert_eq!(store.redeem(&token), Err(AuthError::TokenInvalidOrExpired));
}

#[test]
fn test_issued_at_comes_from_clock() {
    let (clock, store) = token_store();
    clock.advance(Duration::minutes(3));

    let token = store.issue("a@x.com", None, None).unwrap();
    assert_eq!(store.redeem(&token).unwrap().issued_at, relay_testing::test_time() + Duration::minutes(3));
}

#[test]
fn test_token_expires_after_one_hour_without_sweep() {
    let (clock, store) = token_store();
    let token = store.issue("a@x.com", None, None).unwrap();

    clock.advance(Duration::minutes(59));
    assert_eq!(store.len(), 1);

    clock.advance(Duration::minutes(1));
    assert_eq!(store.redeem(&token), Err(AuthError::TokenInvalidOrExpired));
}

#[test]
fn test_token_valid_just_before_expiry() {
    let (clock, store) = token_store();
    let token = store.issue("a@x.com", None, None).unwrap();

    clock.advance(Duration::hours(1) - Duration::milliseconds(1));
    assert!(store.redeem(&token).is_ok());
}

#[test]
fn test_custom_ttl() {
    let clock = Arc::new(MockClock::new());
    let store = TokenStore::new(clock.clone()).with_ttl(Duration::minutes(15));
    let token = store.issue("a@x.com", None, None).unwrap();

    clock.advance(Duration::minutes(15));
    assert_eq!(store.redeem(&token), Err(AuthError::TokenInvalidOrExpired));
}

#[test]
fn test_concurrent_redeem_has_exactly_one_winner() {
    const CALLERS: usize = 24;

    let clock = Arc::new(MockClock::new());
    let store = Arc::new(TokenStore::new(clock));

    for _ in 0..20 {
        let token = Arc::new(store.issue("a@x.com", None, None).unwrap());
        let barrier = Arc::new(Barrier::new(CALLERS));
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let (store, token, barrier) = (store.clone(), token.clone(), barrier.clone());
                let (successes, failures) = (successes.clone(), failures.clone());
                thread::spawn(move || {
                    barrier.wait();
                    match store.redeem(&token) {
                        Ok(_) => successes.fetch_add(1, Ordering::SeqCst),
                        Err(AuthError::TokenInvalidOrExpired) => failures.fetch_add(1, Ordering::SeqCst),
                        Err(other) => unreachable!("unexpected error: {other}"),
                    };
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), CALLERS - 1);
    }
}

#[test]
fn test_sweep_removes_only_expired_tokens() {
    let (clock, store) = token_store();

    let old = store.issue("old@x.com", None, None).unwrap();
    clock.advance(Duration::minutes(30));
    let fresh = store.issue("fresh@x.com", None, None).unwrap();
    clock.advance(Duration::minutes(30));

    assert_eq!(store.sweep_expired(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.redeem(&old), Err(AuthError::TokenInvalidOrExpired));
    assert_eq!(store.redeem(&fresh).unwrap().identity, "fresh@x.com");
}
