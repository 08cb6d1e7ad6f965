//! Databricks SQL Statement Execution API client.
//!
//! One client backs all three capabilities: syntax checks run `EXPLAIN`,
//! execution runs the statement itself, and AI conversion runs
//! `SELECT AI_QUERY(model, prompt)` on the same warehouse.

use crate::error::{CapabilityError, CapabilityResult};
use crate::traits::{
    AiConverter, ConversionRequest, QueryExecutor, SyntaxValidator, SyntaxVerdict, AI_CONVERTER,
    QUERY_EXECUTOR, SYNTAX_VALIDATOR,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sp_core::{Config, ExecutionVerdict};

/// Statement API path, relative to the workspace host
const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

/// Longest synchronous wait the API accepts
const WAIT_TIMEOUT: &str = "50s";

/// Plan text Databricks returns from EXPLAIN instead of failing the statement
const PLANNING_ERROR: &str = "Error occurred during query planning";

/// Characters of the failure reason included in an AI prompt
const PROMPT_REASON_CHARS: usize = 200;

/// Connection and model settings for [`DatabricksClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabricksSettings {
    /// Workspace URL, e.g. `https://adb-123.azuredatabricks.net`
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    /// Serving endpoint used by `AI_QUERY`
    pub ai_model: String,
    pub max_prompt_chars: usize,
}

impl DatabricksSettings {
    /// Resolve settings from configuration and the environment variables it names
    pub fn from_config(config: &Config) -> CapabilityResult<Self> {
        let warehouse = &config.warehouse;
        let host = required_env(&warehouse.host_env)?;
        let token = required_env(&warehouse.token_env)?;
        let warehouse_id =
            warehouse
                .resolve_warehouse_id()
                .ok_or_else(|| CapabilityError::NotConfigured {
                    service: "Databricks",
                    message: "set warehouse.warehouse_id or DATABRICKS_WAREHOUSE_ID".to_string(),
                })?;
        Ok(Self {
            host,
            token,
            warehouse_id,
            catalog: warehouse.catalog.clone(),
            schema: warehouse.schema.clone(),
            ai_model: config.escalation.ai_model.clone(),
            max_prompt_chars: config.escalation.max_prompt_chars,
        })
    }
}

fn required_env(name: &str) -> CapabilityResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CapabilityError::NotConfigured {
            service: "Databricks",
            message: format!("environment variable {} is not set", name),
        })
}

/// Databricks SQL warehouse client
pub struct DatabricksClient {
    settings: DatabricksSettings,
    http: reqwest::Client,
    endpoint: String,
}

impl std::fmt::Debug for DatabricksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // token stays out of logs
        f.debug_struct("DatabricksClient")
            .field("endpoint", &self.endpoint)
            .field("warehouse_id", &self.settings.warehouse_id)
            .finish()
    }
}

impl DatabricksClient {
    pub fn new(settings: DatabricksSettings) -> CapabilityResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CapabilityError::NotConfigured {
                service: "Databricks",
                message: format!("failed to create HTTP client: {}", e),
            })?;
        let host = settings.host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        Ok(Self {
            endpoint: format!("{}{}", host, STATEMENTS_PATH),
            settings,
            http,
        })
    }

    pub fn from_config(config: &Config) -> CapabilityResult<Self> {
        Self::new(DatabricksSettings::from_config(config)?)
    }

    pub fn settings(&self) -> &DatabricksSettings {
        &self.settings
    }

    /// Submit a statement and wait for it synchronously
    async fn run(&self, sql: &str, service: &'static str) -> CapabilityResult<StatementResult> {
        let request = StatementRequest {
            statement: sql,
            warehouse_id: &self.settings.warehouse_id,
            catalog: self.settings.catalog.as_deref(),
            schema: self.settings.schema.as_deref(),
            wait_timeout: WAIT_TIMEOUT,
            on_wait_timeout: "CANCEL",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };
        log::debug!("{}: submitting {} chars", service, sql.len());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.settings.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::Transient {
                service,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| CapabilityError::Transient {
            service,
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(http_error(service, status, &body));
        }

        let parsed: StatementResponse =
            serde_json::from_str(&body).map_err(|e| CapabilityError::UnexpectedResponse {
                service,
                message: format!("invalid statement response: {}", e),
            })?;
        parsed.into_result(service)
    }
}

#[async_trait]
impl SyntaxValidator for DatabricksClient {
    async fn validate(&self, sql: &str) -> CapabilityResult<SyntaxVerdict> {
        match self.run(&explain_statement(sql), SYNTAX_VALIDATOR).await? {
            StatementResult::Succeeded { rows } => Ok(interpret_explain(&rows)),
            StatementResult::Failed { message } => Ok(SyntaxVerdict::Invalid { message }),
        }
    }

    fn name(&self) -> &'static str {
        "databricks EXPLAIN"
    }
}

#[async_trait]
impl QueryExecutor for DatabricksClient {
    async fn execute(&self, sql: &str) -> CapabilityResult<ExecutionVerdict> {
        let sql = sql.trim().trim_end_matches(';');
        match self.run(sql, QUERY_EXECUTOR).await? {
            StatementResult::Succeeded { .. } => Ok(ExecutionVerdict::Pass),
            StatementResult::Failed { message } => Ok(ExecutionVerdict::Fail { message }),
        }
    }
}

#[async_trait]
impl AiConverter for DatabricksClient {
    async fn convert(&self, request: &ConversionRequest) -> CapabilityResult<String> {
        let prompt = build_prompt(request, self.settings.max_prompt_chars);
        let sql = ai_query_statement(&self.settings.ai_model, &prompt);
        match self.run(&sql, AI_CONVERTER).await? {
            StatementResult::Succeeded { rows } => {
                let text = rows
                    .first()
                    .and_then(|row| row.first())
                    .and_then(|cell| cell.as_deref())
                    .map(strip_fences)
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(CapabilityError::UnexpectedResponse {
                        service: AI_CONVERTER,
                        message: "AI_QUERY returned an empty result".to_string(),
                    });
                }
                Ok(text)
            }
            StatementResult::Failed { message } => Err(CapabilityError::Rejected {
                service: AI_CONVERTER,
                message,
            }),
        }
    }
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    wait_timeout: &'a str,
    on_wait_timeout: &'a str,
    disposition: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    status: StatementStatus,
    #[serde(default)]
    result: Option<ResultData>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
}

/// Terminal outcome of a statement the API accepted
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatementResult {
    Succeeded { rows: Vec<Vec<Option<String>>> },
    /// The warehouse ran the statement and it failed
    Failed { message: String },
}

impl StatementResponse {
    fn into_result(self, service: &'static str) -> CapabilityResult<StatementResult> {
        match self.status.state.as_str() {
            "SUCCEEDED" => Ok(StatementResult::Succeeded {
                rows: self.result.unwrap_or_default().data_array,
            }),
            "FAILED" => {
                let message = match self.status.error {
                    Some(ServiceError {
                        error_code,
                        message: Some(message),
                    }) => match error_code {
                        Some(code) if !message.contains(&code) => format!("[{}] {}", code, message),
                        _ => message,
                    },
                    Some(ServiceError {
                        error_code: Some(code),
                        message: None,
                    }) => code,
                    _ => "statement failed without an error message".to_string(),
                };
                Ok(StatementResult::Failed { message })
            }
            // still queued or cancelled by the wait timeout
            other => Err(CapabilityError::Transient {
                service,
                message: format!(
                    "statement {} ended in state {}",
                    self.statement_id.as_deref().unwrap_or("?"),
                    other
                ),
            }),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Map a non-success HTTP status to a capability error
fn http_error(service: &'static str, status: StatusCode, body: &str) -> CapabilityError {
    let message = format!("HTTP {}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        CapabilityError::Transient { service, message }
    } else {
        CapabilityError::Rejected { service, message }
    }
}

/// `EXPLAIN` form of a statement
pub fn explain_statement(sql: &str) -> String {
    format!("EXPLAIN {}", sql.trim().trim_end_matches(';').trim_end())
}

fn interpret_explain(rows: &[Vec<Option<String>>]) -> SyntaxVerdict {
    let plan = rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_deref())
        .unwrap_or("");
    if plan.trim_start().starts_with(PLANNING_ERROR) {
        SyntaxVerdict::Invalid {
            message: plan.trim().to_string(),
        }
    } else {
        SyntaxVerdict::Valid
    }
}

/// Conversion prompt for `AI_QUERY`
pub fn build_prompt(request: &ConversionRequest, max_statement_chars: usize) -> String {
    let reason: String = request.reason.chars().take(PROMPT_REASON_CHARS).collect();
    let statement: String = request.original.chars().take(max_statement_chars).collect();
    let rewritten: String = request.rewritten.chars().take(max_statement_chars).collect();
    let dialect = match request.dialect {
        sp_core::SourceDialect::Hive => "Hive HQL",
        sp_core::SourceDialect::Trino => "Trino SQL",
    };

    let mut prompt = format!(
        "You are a SQL converter. Convert this {} to Databricks Spark SQL.\n\n\
         ERROR: {}\n\n\
         CRITICAL RULES:\n\
         - Return ONLY executable SQL code\n\
         - NO explanations, NO markdown, NO commentary\n",
        dialect, reason
    );
    if !request.hints.is_empty() {
        prompt.push_str("- Apply these conversions:\n");
        for hint in &request.hints {
            prompt.push_str(&format!("  * {}\n", hint));
        }
    }
    prompt.push_str(&format!("\nINPUT {}:\n{}\n", dialect.to_uppercase(), statement));
    if rewritten.trim() != statement.trim() {
        prompt.push_str(&format!("\nPARTIAL CONVERSION SO FAR:\n{}\n", rewritten));
    }
    prompt.push_str("\nOUTPUT (SQL only):");
    prompt
}

/// Spark SQL string literal; backslash and quote are escaped
fn sql_string(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `SELECT AI_QUERY(model, prompt)` statement
pub fn ai_query_statement(model: &str, prompt: &str) -> String {
    format!(
        "SELECT AI_QUERY({}, {}) AS converted_sql",
        sql_string(model),
        sql_string(prompt)
    )
}

/// Remove markdown code fences from a model response
pub fn strip_fences(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
#[path = "databricks_test.rs"]
mod tests;
