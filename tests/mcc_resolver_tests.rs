mod common;

use adsbridge::{AdsError, IsRetryable};
use adsbridge::db::{AccountType, AdAccountUpsert, BindingUpsert};
use adsbridge::google_ads::CustomerId;
use adsbridge::service::{ManagerPolicy, ManagerResolution};
use chrono::{Duration, Utc};
use common::TestEnv;

const TARGET: &str = "1234567890";
const MANAGER: &str = "9990001111";

fn target() -> CustomerId {
    CustomerId::parse(TARGET).unwrap()
}

async fn seed_binding(env: &TestEnv, resolved: &str, age: Duration) {
    env.db
        .upsert_binding(BindingUpsert {
            user_id: "user-1".to_string(),
            customer_id: TARGET.to_string(),
            resolved_login_customer_id: resolved.to_string(),
            last_verified_at: Utc::now() - age,
        })
        .await
        .expect("seed binding");
}

#[tokio::test]
async fn fresh_binding_is_served_from_cache() {
    let env = TestEnv::start("mcc-cache-hit").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;
    seed_binding(&env, MANAGER, Duration::zero()).await;

    let resolution = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap();

    assert_eq!(
        resolution,
        ManagerResolution::Managed(CustomerId::parse(MANAGER).unwrap())
    );
    assert_eq!(env.mock.probe_calls(), 0);
    assert_eq!(env.mock.token_calls(), 0);

    env.cleanup().await;
}

#[tokio::test]
async fn expired_binding_is_reprobed() {
    let env = TestEnv::start("mcc-cache-expired").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;
    env.mock.manage(MANAGER, TARGET);
    seed_binding(&env, "5550001111", Duration::hours(25)).await;

    let resolution = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap();

    assert_eq!(resolution.manager().map(CustomerId::as_str), Some(MANAGER));
    assert_eq!(env.mock.probe_calls(), 1);

    let binding = env.db.get_binding("user-1", TARGET).await.unwrap().unwrap();
    assert_eq!(binding.resolved_login_customer_id, MANAGER);
    assert!(binding.last_verified_at > Utc::now() - Duration::minutes(1));

    env.cleanup().await;
}

#[tokio::test]
async fn negative_binding_short_circuits_probing() {
    let env = TestEnv::start("mcc-negative").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;
    env.mock.manage(MANAGER, TARGET);
    seed_binding(&env, "", Duration::hours(2)).await;

    let resolution = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap();

    assert_eq!(resolution, ManagerResolution::NotManaged);
    assert_eq!(env.mock.probe_calls(), 0);

    env.cleanup().await;
}

#[tokio::test]
async fn miss_is_cached_as_negative_binding() {
    let env = TestEnv::start("mcc-miss").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;

    let resolver = env.services().resolver;
    let first = resolver.resolve_manager_for("user-1", &target()).await.unwrap();
    assert_eq!(first, ManagerResolution::NotManaged);
    assert_eq!(env.mock.probe_calls(), 1);

    let binding = env.db.get_binding("user-1", TARGET).await.unwrap().unwrap();
    assert!(binding.is_negative());

    let second = resolver.resolve_manager_for("user-1", &target()).await.unwrap();
    assert_eq!(second, ManagerResolution::NotManaged);
    assert_eq!(env.mock.probe_calls(), 1);

    let err = resolver
        .login_customer_for("user-1", &target(), ManagerPolicy::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, AdsError::NotManaged { ref customer } if customer == "123***890"));

    env.cleanup().await;
}

#[tokio::test]
async fn first_matching_candidate_wins() {
    let env = TestEnv::start("mcc-first-match").await;
    env.seed_token("user-1", Duration::hours(1), Some("1110002222")).await;
    env.db
        .upsert_ad_account(AdAccountUpsert {
            user_id: "user-1".to_string(),
            customer_id: MANAGER.to_string(),
            descriptive_name: Some("Agency MCC".to_string()),
            account_type: AccountType::Manager,
        })
        .await
        .unwrap();
    env.db
        .upsert_ad_account(AdAccountUpsert {
            user_id: "user-1".to_string(),
            customer_id: "3330004444".to_string(),
            descriptive_name: None,
            account_type: AccountType::Manager,
        })
        .await
        .unwrap();
    env.mock.manage(MANAGER, TARGET);
    env.mock.manage("3330004444", TARGET);

    let resolution = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap();

    // Token's manager is probed first and misses, then the directory in id order.
    assert_eq!(resolution.manager().map(CustomerId::as_str), Some(MANAGER));
    assert_eq!(env.mock.probe_calls(), 2);

    env.cleanup().await;
}

#[tokio::test]
async fn formatted_and_plain_ids_share_one_cache_entry() {
    let env = TestEnv::start("mcc-sanitize").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;
    env.mock.manage(MANAGER, TARGET);

    let resolver = env.services().resolver;
    let dashed = CustomerId::parse("123-456-7890").unwrap();
    let plain = CustomerId::parse("1234567890").unwrap();

    let a = resolver.resolve_manager_for("user-1", &dashed).await.unwrap();
    let b = resolver.resolve_manager_for("user-1", &plain).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(env.mock.probe_calls(), 1);
    assert!(env.db.get_binding("user-1", TARGET).await.unwrap().is_some());

    env.cleanup().await;
}

#[tokio::test]
async fn resolution_without_token_fails() {
    let env = TestEnv::start("mcc-no-token").await;

    let err = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap_err();
    assert!(matches!(err, AdsError::TokenNotFound { .. }));

    env.cleanup().await;
}

#[tokio::test]
async fn unreachable_manager_is_not_cached_as_negative() {
    let env = TestEnv::start("mcc-transient-miss").await;
    env.seed_token("user-1", Duration::hours(1), Some(MANAGER)).await;
    env.mock.manage(MANAGER, TARGET);
    env.mock.always_fail_probes(MANAGER, 503);

    let err = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap_err();

    assert!(err.is_retryable(), "got: {err}");
    assert_eq!(env.mock.probe_calls(), 4, "one probe plus three retries");
    assert!(env.db.get_binding("user-1", TARGET).await.unwrap().is_none());

    env.cleanup().await;
}

#[tokio::test]
async fn later_candidate_matches_after_earlier_one_is_unreachable() {
    let env = TestEnv::start("mcc-transient-then-match").await;
    env.seed_token("user-1", Duration::hours(1), Some("1110002222")).await;
    env.db
        .upsert_ad_account(AdAccountUpsert {
            user_id: "user-1".to_string(),
            customer_id: MANAGER.to_string(),
            descriptive_name: Some("Agency MCC".to_string()),
            account_type: AccountType::Manager,
        })
        .await
        .unwrap();
    env.mock.always_fail_probes("1110002222", 503);
    env.mock.manage(MANAGER, TARGET);

    let resolution = env
        .services()
        .resolver
        .resolve_manager_for("user-1", &target())
        .await
        .unwrap();

    assert_eq!(resolution.manager().map(CustomerId::as_str), Some(MANAGER));
    assert_eq!(env.mock.probe_calls(), 5);
    let binding = env.db.get_binding("user-1", TARGET).await.unwrap().unwrap();
    assert_eq!(binding.resolved_login_customer_id, MANAGER);

    env.cleanup().await;
}
