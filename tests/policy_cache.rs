mod common;

use common::seed_policy;
use prompt_gateway::module::policy::model::{PatternKind, PolicyAction, Severity};
use prompt_gateway::service::policy_cache_service::PolicyCache;

fn keyword_policy(name: &str, value: &str) -> prompt_gateway::module::policy::model::Policy {
    seed_policy(name, PatternKind::Keyword, value, Severity::Low, PolicyAction::Log)
}

#[test]
fn publish_bumps_the_version_monotonically() {
    let cache = PolicyCache::new(None, 600);
    assert_eq!(cache.get().version, 0);

    let v1 = cache.publish(vec![keyword_policy("a", "alpha")]);
    let v2 = cache.publish(vec![keyword_policy("b", "beta")]);

    assert_eq!(v1, 1);
    assert_eq!(v2, 2);
    assert_eq!(cache.get().version, 2);
}

#[test]
fn readers_keep_their_snapshot_across_a_swap() {
    let cache = PolicyCache::new(None, 600);
    cache.publish(vec![keyword_policy("a", "alpha")]);

    let held = cache.get();
    cache.publish(vec![
        keyword_policy("b", "beta"),
        keyword_policy("c", "gamma"),
    ]);

    // The held snapshot is the old one, whole and untouched.
    assert_eq!(held.version, 1);
    assert_eq!(held.policies.len(), 1);
    assert_eq!(held.policies[0].name, "a");

    let fresh = cache.get();
    assert_eq!(fresh.version, 2);
    assert_eq!(fresh.policies.len(), 2);
}

#[test]
fn mutating_a_copy_never_affects_later_reads() {
    let cache = PolicyCache::new(None, 600);
    cache.publish(vec![keyword_policy("a", "alpha")]);

    let mut copied = cache.get().policies.clone();
    copied.clear();

    assert_eq!(cache.get().policies.len(), 1);
}

#[tokio::test]
async fn invalidate_without_a_store_keeps_the_snapshot() {
    let cache = PolicyCache::new(None, 600);
    cache.publish(vec![keyword_policy("a", "alpha")]);

    cache.invalidate().await.expect("invalidate");

    let snapshot = cache.get();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.policies.len(), 1);
}

#[tokio::test]
async fn start_and_stop_without_a_store() {
    let cache = PolicyCache::new(None, 600);
    cache.clone().start().await.expect("start");
    cache.stop();
    assert_eq!(cache.get().version, 0);
}
