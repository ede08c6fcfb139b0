//! Note-vault integration backed by the GitHub contents API.
//!
//! The vault is a repository of Markdown notes. Reads and writes go to a
//! single branch chosen when the client is built, so a non-production
//! deployment never touches the production notes.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hestia_core::error::{IntegrationError, ToolError};
use hestia_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "vault";
const GITHUB_API: &str = "https://api.github.com";

/// Note that `add_task` appends to.
pub const TASKS_NOTE: &str = "Tasks.md";

/// Client for one branch of a GitHub-hosted vault.
pub struct VaultClient {
    owner: String,
    repository: String,
    branch: String,
    token: String,
    api_base: String,
    client: reqwest::Client,
}

/// A note's decoded text plus the blob sha needed to update it.
#[derive(Debug, Clone)]
pub struct Note {
    pub path: String,
    pub text: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

impl VaultClient {
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: branch.into(),
            token: token.into(),
            api_base: GITHUB_API.into(),
            client: crate::http_client(SERVICE)?,
        })
    }

    /// Point the client at a different API host (GitHub Enterprise).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn contents_url(&self, path: &str) -> Result<String, IntegrationError> {
        for (field, value) in [
            ("owner", &self.owner),
            ("repository", &self.repository),
            ("branch", &self.branch),
        ] {
            if value.is_empty() {
                return Err(IntegrationError::NotConfigured {
                    service: SERVICE,
                    field,
                });
            }
        }
        Ok(format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repository,
            path.trim_start_matches('/')
        ))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Read a note. A missing note is `IntegrationError::NotFound`.
    pub async fn read_note(&self, path: &str) -> Result<Note, IntegrationError> {
        let url = self.contents_url(path)?;
        let response = self
            .request(reqwest::Method::GET, &url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(network)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IntegrationError::NotFound(path.to_string()));
        }
        let response = check_status(response).await?;
        let body: ContentsResponse = response.json().await.map_err(|e| invalid(e.to_string()))?;

        Ok(Note {
            path: body.path,
            text: decode_content(&body.content)?,
            sha: body.sha,
        })
    }

    /// Write a note, creating it when `sha` is `None`.
    pub async fn write_note(
        &self,
        path: &str,
        text: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), IntegrationError> {
        let url = self.contents_url(path)?;
        let mut body = serde_json::json!({
            "message": message,
            "content": STANDARD.encode(text),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::json!(sha);
        }

        debug!(path, branch = %self.branch, "Writing vault note");
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        check_status(response).await?;
        Ok(())
    }

    /// Append a line to a note, creating the note if needed.
    pub async fn append_to_note(&self, path: &str, line: &str) -> Result<(), IntegrationError> {
        let (existing, sha) = match self.read_note(path).await {
            Ok(note) => (note.text, Some(note.sha)),
            Err(IntegrationError::NotFound(_)) => (String::new(), None),
            Err(e) => return Err(e),
        };
        let updated = append_line(&existing, line);
        self.write_note(path, &updated, sha.as_deref(), &format!("hestia: update {path}"))
            .await
    }
}

/// GitHub returns base64 wrapped at 60 columns.
fn decode_content(content: &str) -> Result<String, IntegrationError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| invalid(format!("content is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("content is not UTF-8: {e}")))
}

fn append_line(existing: &str, line: &str) -> String {
    let mut text = existing.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text.push('\n');
    text
}

fn invalid(reason: String) -> IntegrationError {
    IntegrationError::InvalidResponse {
        service: SERVICE,
        reason,
    }
}

fn network(e: reqwest::Error) -> IntegrationError {
    IntegrationError::Network {
        service: SERVICE,
        reason: e.to_string(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(IntegrationError::Api {
        service: SERVICE,
        status_code: status.as_u16(),
        message,
    })
}

// --- Tools ---

pub struct ReadNoteTool {
    client: Arc<VaultClient>,
}

impl ReadNoteTool {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadNoteTool {
    fn name(&self) -> &str {
        "read_note"
    }

    fn description(&self) -> &str {
        "Read a Markdown note from the personal vault, e.g. \"Tasks.md\"."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the note inside the vault" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        match self.client.read_note(path).await {
            Ok(note) => Ok(ToolResult::ok(note.text)),
            Err(IntegrationError::NotFound(_)) => Ok(ToolResult {
                success: false,
                output: format!("No note named {path}"),
            }),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            }),
        }
    }
}

pub struct AddTaskTool {
    client: Arc<VaultClient>,
}

impl AddTaskTool {
    pub fn new(client: Arc<VaultClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AddTaskTool {
    fn name(&self) -> &str {
        "add_task"
    }

    fn description(&self) -> &str {
        "Add a to-do task to the task list in the personal vault."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "Short description of the task" }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let task = arguments["task"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;

        self.client
            .append_to_note(TASKS_NOTE, &format!("- [ ] {task}"))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(format!("Added 1 task: {task}")))
    }
}
