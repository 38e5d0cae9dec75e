mod common;

use common::seed_policy;
use prompt_gateway::module::analyze::controller::reduce_verdict;
use prompt_gateway::module::analyze::schema::PolicyMatch;
use prompt_gateway::module::policy::model::{PatternKind, Policy, PolicyAction, Severity};
use prompt_gateway::service::analyzer_service::Analyzer;
use prompt_gateway::service::policy_cache_service::PolicySnapshot;
use prompt_gateway::service::profanity_service::ProfanityFilter;

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

fn snapshot_of(policies: Vec<Policy>) -> PolicySnapshot {
    PolicySnapshot {
        version: 1,
        policies,
    }
}

fn match_for(policy: &Policy, matched_pattern: &str) -> PolicyMatch {
    PolicyMatch {
        policy_id: policy.id,
        policy_name: policy.name.clone(),
        severity: policy.severity,
        matched_pattern: matched_pattern.to_string(),
    }
}

#[tokio::test]
async fn regex_match_reports_first_matching_substring() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "email",
        PatternKind::Regex,
        EMAIL_PATTERN,
        Severity::Medium,
        PolicyAction::Redact,
    );
    let snapshot = snapshot_of(vec![policy]);

    let matches = analyzer
        .analyze("reach me at a@b.io or c@d.io", &snapshot)
        .await
        .expect("analysis");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_pattern, "a@b.io");
}

#[tokio::test]
async fn profanity_match_uses_fixed_marker() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "profanity",
        PatternKind::Profanity,
        "builtin",
        Severity::Low,
        PolicyAction::Redact,
    );
    let snapshot = snapshot_of(vec![policy]);

    let matches = analyzer
        .analyze("this is fucking unacceptable", &snapshot)
        .await
        .expect("analysis");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_pattern, "profanity detected");
}

#[tokio::test]
async fn invalid_regex_in_snapshot_fails_the_evaluation() {
    let analyzer = Analyzer::new(None);
    // Bypasses create-time validation, as a hand-edited row would.
    let policy = seed_policy(
        "broken",
        PatternKind::Regex,
        "[unbalanced(",
        Severity::Low,
        PolicyAction::Block,
    );
    let snapshot = snapshot_of(vec![policy]);

    let err = analyzer
        .analyze("anything", &snapshot)
        .await
        .expect_err("evaluation must fail");
    assert!(err.contains("broken"));
}

#[tokio::test]
async fn model_policy_without_client_fails_the_evaluation() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "safety-model",
        PatternKind::Model,
        "nvidia/llama-3.1-nemoguard-8b-content-safety",
        Severity::High,
        PolicyAction::Block,
    );
    let snapshot = snapshot_of(vec![policy]);

    let err = analyzer
        .analyze("anything", &snapshot)
        .await
        .expect_err("evaluation must fail");
    assert!(err.contains("safety-model"));
}

#[tokio::test]
async fn empty_snapshot_matches_nothing() {
    let analyzer = Analyzer::new(None);
    let snapshot = snapshot_of(Vec::new());

    let matches = analyzer.analyze("anything", &snapshot).await.expect("analysis");
    assert!(matches.is_empty());
}

#[test]
fn redaction_replaces_every_occurrence() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "email",
        PatternKind::Regex,
        EMAIL_PATTERN,
        Severity::Medium,
        PolicyAction::Redact,
    );
    let matches = vec![match_for(&policy, "a@b.io")];
    let snapshot = snapshot_of(vec![policy]);

    let redacted = analyzer.redact("a@b.io wrote to c@d.io", &matches, &snapshot);
    assert_eq!(redacted, "[REDACTED] wrote to [REDACTED]");
}

#[test]
fn redaction_is_idempotent() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "email",
        PatternKind::Regex,
        EMAIL_PATTERN,
        Severity::Medium,
        PolicyAction::Redact,
    );
    let matches = vec![match_for(&policy, "user@example.com")];
    let snapshot = snapshot_of(vec![policy]);

    let once = analyzer.redact("Contact me at user@example.com", &matches, &snapshot);
    let twice = analyzer.redact(&once, &matches, &snapshot);
    assert_eq!(once, twice);
}

#[test]
fn keyword_redaction_is_case_insensitive() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "jailbreak",
        PatternKind::Keyword,
        "DAN",
        Severity::High,
        PolicyAction::Redact,
    );
    let matches = vec![match_for(&policy, "DAN")];
    let snapshot = snapshot_of(vec![policy]);

    let redacted = analyzer.redact("try the dan method", &matches, &snapshot);
    assert_eq!(redacted, "try the [REDACTED] method");
}

#[test]
fn non_redact_actions_leave_content_untouched() {
    let analyzer = Analyzer::new(None);
    let policy = seed_policy(
        "blocker",
        PatternKind::Keyword,
        "dan",
        Severity::High,
        PolicyAction::Block,
    );
    let matches = vec![match_for(&policy, "dan")];
    let snapshot = snapshot_of(vec![policy]);

    let redacted = analyzer.redact("try the dan method", &matches, &snapshot);
    assert_eq!(redacted, "try the dan method");
}

#[test]
fn verdict_blocks_iff_a_block_policy_triggered() {
    let redact_policy = seed_policy(
        "email",
        PatternKind::Regex,
        EMAIL_PATTERN,
        Severity::Medium,
        PolicyAction::Redact,
    );
    let block_policy = seed_policy(
        "jailbreak",
        PatternKind::Keyword,
        "DAN",
        Severity::Critical,
        PolicyAction::Block,
    );
    let redact_match = match_for(&redact_policy, "a@b.io");
    let block_match = match_for(&block_policy, "DAN");
    let snapshot = snapshot_of(vec![redact_policy, block_policy]);

    let allow_verdict = reduce_verdict(std::slice::from_ref(&redact_match), &snapshot);
    assert_eq!(allow_verdict.action, "allow");
    assert!(allow_verdict.allowed);

    let block_verdict = reduce_verdict(&[redact_match, block_match], &snapshot);
    assert_eq!(block_verdict.action, "block");
    assert!(!block_verdict.allowed);
    assert_eq!(block_verdict.highest_severity, Some(Severity::Critical));
}

#[test]
fn verdict_ignores_matches_missing_from_the_snapshot() {
    let policy = seed_policy(
        "jailbreak",
        PatternKind::Keyword,
        "DAN",
        Severity::High,
        PolicyAction::Block,
    );
    let stray = match_for(&policy, "DAN");
    let snapshot = snapshot_of(Vec::new());

    let verdict = reduce_verdict(&[stray], &snapshot);
    assert_eq!(verdict.action, "allow");
    assert!(verdict.allowed);
}

#[test]
fn profanity_filter_censors_and_detects() {
    let filter = ProfanityFilter;
    assert!(filter.is_profane("this is fucking unacceptable"));
    assert!(!filter.is_profane("have a pleasant afternoon"));

    let censored = filter.censor("this is fucking unacceptable");
    assert_ne!(censored, "this is fucking unacceptable");
    assert!(censored.contains("this is"));
}
