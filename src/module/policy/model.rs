use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Regex,
    Keyword,
    Profanity,
    Model,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Keyword => "keyword",
            Self::Profanity => "profanity",
            Self::Model => "model",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "regex" => Ok(Self::Regex),
            "keyword" => Ok(Self::Keyword),
            "profanity" => Ok(Self::Profanity),
            "model" => Ok(Self::Model),
            other => Err(format!("unknown pattern type: {other}")),
        }
    }
}

/// Ordered so that `Ord` reflects increasing criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Log,
    Block,
    Redact,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Block => "block",
            Self::Redact => "redact",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "log" => Ok(Self::Log),
            "block" => Ok(Self::Block),
            "redact" => Ok(Self::Redact),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pattern_type: PatternKind,
    pub pattern_value: String,
    pub severity: Severity,
    pub action: PolicyAction,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
