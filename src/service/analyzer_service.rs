use crate::module::analyze::schema::PolicyMatch;
use crate::module::policy::model::{PatternKind, Policy, PolicyAction};
use crate::service::model_client_service::ModelClient;
use crate::service::policy_cache_service::PolicySnapshot;
use crate::service::profanity_service::ProfanityFilter;
use regex::Regex;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::task::JoinSet;

const REDACTION_TOKEN: &str = "[REDACTED]";

/// Matches content against a policy snapshot. Regex, keyword, and profanity
/// checks run inline on the caller task; model policies do remote I/O and are
/// fanned out concurrently, with the losers aborted once the evaluation is
/// decided. An evaluation returns at most one match: the first hit is enough
/// to decide a block, so the remaining checks are cancelled rather than
/// enumerated.
#[derive(Debug)]
pub struct Analyzer {
    pattern_cache: RwLock<HashMap<String, Regex>>,
    profanity: ProfanityFilter,
    model: Option<ModelClient>,
}

impl Analyzer {
    pub fn new(model: Option<ModelClient>) -> Self {
        Self {
            pattern_cache: RwLock::new(HashMap::new()),
            profanity: ProfanityFilter,
            model,
        }
    }

    pub async fn analyze(
        &self,
        content: &str,
        snapshot: &PolicySnapshot,
    ) -> Result<Vec<PolicyMatch>, String> {
        let enabled: Vec<&Policy> = snapshot.policies.iter().filter(|p| p.enabled).collect();
        if enabled.is_empty() {
            return Ok(Vec::new());
        }

        let (remote, local): (Vec<&Policy>, Vec<&Policy>) = enabled
            .into_iter()
            .partition(|p| p.pattern_type == PatternKind::Model);

        let mut tasks: JoinSet<Result<Option<PolicyMatch>, String>> = JoinSet::new();
        for policy in remote {
            let Some(client) = self.model.clone() else {
                return Err(format!(
                    "error matching policy {}: no safety model client configured",
                    policy.name
                ));
            };
            let policy = policy.clone();
            let content = content.to_string();
            tasks.spawn(async move {
                let evaluation = client
                    .evaluate(&policy.pattern_value, &content)
                    .await
                    .map_err(|e| format!("error matching policy {}: {e}", policy.name))?;
                if !evaluation.triggered {
                    return Ok(None);
                }
                Ok(Some(PolicyMatch {
                    policy_id: policy.id,
                    policy_name: policy.name,
                    severity: policy.severity,
                    matched_pattern: evaluation.detail,
                }))
            });
        }

        for policy in local {
            match self.check_local(policy, content) {
                Ok(Some(found)) => {
                    tasks.abort_all();
                    return Ok(vec![found]);
                }
                Ok(None) => {}
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(found))) => {
                    tasks.abort_all();
                    return Ok(vec![found]);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tasks.abort_all();
                    return Err(format!("policy evaluation task failed: {e}"));
                }
            }
        }

        Ok(Vec::new())
    }

    /// Replaces content matched by `redact` policies. Idempotent: the
    /// replacement token does not match the patterns it replaces.
    pub fn redact(
        &self,
        content: &str,
        matches: &[PolicyMatch],
        snapshot: &PolicySnapshot,
    ) -> String {
        let mut redacted = content.to_string();

        for found in matches {
            let Some(policy) = snapshot.policies.iter().find(|p| p.id == found.policy_id) else {
                continue;
            };
            if policy.action != PolicyAction::Redact {
                continue;
            }

            match policy.pattern_type {
                PatternKind::Regex => {
                    if let Ok(re) = self.compiled_pattern(&policy.pattern_value) {
                        redacted = re.replace_all(&redacted, REDACTION_TOKEN).into_owned();
                    }
                }
                PatternKind::Keyword => {
                    let escaped = format!("(?i){}", regex::escape(&policy.pattern_value));
                    if let Ok(re) = self.compiled_pattern(&escaped) {
                        redacted = re.replace_all(&redacted, REDACTION_TOKEN).into_owned();
                    }
                }
                PatternKind::Profanity => {
                    redacted = self.profanity.censor(&redacted);
                }
                PatternKind::Model => {}
            }
        }

        redacted
    }

    fn check_local(&self, policy: &Policy, content: &str) -> Result<Option<PolicyMatch>, String> {
        let matched_pattern = match policy.pattern_type {
            PatternKind::Regex => self
                .match_regex(&policy.pattern_value, content)
                .map_err(|e| format!("error matching policy {}: {e}", policy.name))?,
            PatternKind::Keyword => match_keyword(&policy.pattern_value, content),
            PatternKind::Profanity => self
                .profanity
                .is_profane(content)
                .then(|| "profanity detected".to_string()),
            // Matched on the remote path.
            PatternKind::Model => None,
        };

        Ok(matched_pattern.map(|matched_pattern| PolicyMatch {
            policy_id: policy.id,
            policy_name: policy.name.clone(),
            severity: policy.severity,
            matched_pattern,
        }))
    }

    fn match_regex(&self, pattern: &str, content: &str) -> Result<Option<String>, String> {
        let re = self.compiled_pattern(pattern)?;
        Ok(re.find(content).map(|m| m.as_str().to_string()))
    }

    /// Cached compile; `Regex` clones share the compiled program.
    fn compiled_pattern(&self, pattern: &str) -> Result<Regex, String> {
        {
            let cache = self
                .pattern_cache
                .read()
                .map_err(|_| "pattern cache lock poisoned".to_string())?;
            if let Some(re) = cache.get(pattern) {
                return Ok(re.clone());
            }
        }

        let re = Regex::new(pattern).map_err(|e| format!("invalid regex pattern: {e}"))?;
        let mut cache = self
            .pattern_cache
            .write()
            .map_err(|_| "pattern cache lock poisoned".to_string())?;
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

fn match_keyword(keyword: &str, content: &str) -> Option<String> {
    content
        .to_lowercase()
        .contains(&keyword.to_lowercase())
        .then(|| keyword.to_string())
}
