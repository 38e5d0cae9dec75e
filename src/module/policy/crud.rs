use super::model::{PatternKind, Policy, PolicyAction, Severity};
use super::schema::CreatePolicyRequest;
use crate::module::error::AppError;
use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const POLICY_COLUMNS: &str = "id, name, description, pattern_type, pattern_value, \
     severity, action, enabled, created_at, updated_at";

/// Enabled policies only, newest first. This is the refresh-loop read path.
pub async fn list_enabled(pool: &PgPool) -> Result<Vec<Policy>, AppError> {
    let query = format!(
        "SELECT {POLICY_COLUMNS} FROM policies WHERE enabled = true ORDER BY created_at DESC"
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::internal("POLICY_QUERY_FAILED", format!("failed to list policies: {e}")))?;

    rows.iter().map(policy_from_row).collect()
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Policy, AppError> {
    let query = format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal("POLICY_QUERY_FAILED", format!("failed to get policy: {e}")))?;

    match row {
        Some(row) => policy_from_row(&row),
        None => Err(AppError::not_found("POLICY_NOT_FOUND", "policy not found")),
    }
}

pub async fn create(pool: &PgPool, req: CreatePolicyRequest) -> Result<Policy, AppError> {
    validate_create_request(&req)?;

    let query = format!(
        "INSERT INTO policies (name, description, pattern_type, pattern_value, severity, action, enabled) \
         VALUES ($1, $2, $3, $4, $5, $6, true) \
         RETURNING {POLICY_COLUMNS}"
    );
    let row = sqlx::query(&query)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.pattern_type)
        .bind(&req.pattern_value)
        .bind(&req.severity)
        .bind(&req.action)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::internal("POLICY_INSERT_FAILED", format!("failed to create policy: {e}")))?;

    policy_from_row(&row)
}

pub fn validate_create_request(req: &CreatePolicyRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("INVALID_NAME", "name is required"));
    }
    let kind = PatternKind::parse(&req.pattern_type)
        .map_err(|e| AppError::bad_request("INVALID_PATTERN_TYPE", e))?;
    if req.pattern_value.is_empty() {
        return Err(AppError::bad_request(
            "INVALID_PATTERN_VALUE",
            "pattern_value is required",
        ));
    }
    Severity::parse(&req.severity).map_err(|e| AppError::bad_request("INVALID_SEVERITY", e))?;
    PolicyAction::parse(&req.action).map_err(|e| AppError::bad_request("INVALID_ACTION", e))?;

    if kind == PatternKind::Regex {
        Regex::new(&req.pattern_value).map_err(|e| {
            AppError::bad_request("INVALID_REGEX_PATTERN", format!("pattern does not compile: {e}"))
        })?;
    }
    Ok(())
}

fn policy_from_row(row: &PgRow) -> Result<Policy, AppError> {
    let pattern_type: String = column(row, "pattern_type")?;
    let severity: String = column(row, "severity")?;
    let action: String = column(row, "action")?;

    Ok(Policy {
        id: column(row, "id")?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        pattern_type: PatternKind::parse(&pattern_type)
            .map_err(|e| AppError::internal("POLICY_ROW_INVALID", e))?,
        pattern_value: column(row, "pattern_value")?,
        severity: Severity::parse(&severity)
            .map_err(|e| AppError::internal("POLICY_ROW_INVALID", e))?,
        action: PolicyAction::parse(&action)
            .map_err(|e| AppError::internal("POLICY_ROW_INVALID", e))?,
        enabled: column(row, "enabled")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal("POLICY_ROW_INVALID", format!("bad column {name}: {e}")))
}
