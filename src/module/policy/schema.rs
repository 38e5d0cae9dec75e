use super::model::Policy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub pattern_type: String,
    pub pattern_value: String,
    pub severity: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePolicyResponse {
    pub created: bool,
    pub policy: Option<Policy>,
    pub error_code: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPoliciesResponse {
    pub count: usize,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPolicyResponse {
    pub found: bool,
    pub policy: Option<Policy>,
    pub error_code: Option<String>,
    pub reason: String,
}
