use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEvaluation {
    pub triggered: bool,
    pub detail: String,
}

/// Client for the external content-safety endpoint. The endpoint speaks the
/// chat-completions wire format and returns its verdict as a JSON object
/// embedded in the first choice's message content.
#[derive(Debug, Clone)]
pub struct ModelClient {
    api_key: String,
    endpoint: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct SafetyRequest<'a> {
    model: &'a str,
    messages: Vec<SafetyMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SafetyMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SafetyResponse {
    #[serde(default)]
    choices: Vec<SafetyChoice>,
}

#[derive(Debug, Deserialize)]
struct SafetyChoice {
    message: SafetyChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct SafetyChoiceMessage {
    #[serde(default)]
    content: String,
}

impl ModelClient {
    pub fn new(api_key: String, endpoint: String) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("failed to build safety http client: {e}"))?;
        Ok(Self {
            api_key,
            endpoint,
            http,
        })
    }

    pub async fn evaluate(&self, model: &str, content: &str) -> Result<ModelEvaluation, String> {
        if model.trim().is_empty() {
            return Err("model identifier is required for safety evaluation".to_string());
        }

        let payload = SafetyRequest {
            model,
            messages: vec![SafetyMessage {
                role: "user",
                content,
            }],
            stream: false,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("safety endpoint request failed: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!(
                "safety endpoint returned status {}",
                resp.status()
            ));
        }

        let decoded = resp
            .json::<SafetyResponse>()
            .await
            .map_err(|e| format!("failed to decode safety response: {e}"))?;

        let Some(choice) = decoded.choices.first() else {
            return Err("safety response contained no choices".to_string());
        };

        let verdict_json = choice.message.content.trim();
        if verdict_json.is_empty() {
            return Ok(ModelEvaluation {
                triggered: false,
                detail: String::new(),
            });
        }

        let verdict: HashMap<String, String> = serde_json::from_str(verdict_json)
            .map_err(|e| format!("failed to parse safety verdict: {e}"))?;

        let user_safety = verdict
            .get("User Safety")
            .map(|v| v.trim())
            .unwrap_or_default();
        if user_safety.eq_ignore_ascii_case("unsafe") {
            return Ok(ModelEvaluation {
                triggered: true,
                detail: format!("User Safety verdict: {user_safety}"),
            });
        }

        Ok(ModelEvaluation {
            triggered: false,
            detail: String::new(),
        })
    }
}
