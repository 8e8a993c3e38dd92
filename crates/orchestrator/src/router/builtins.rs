//! Built-in tools: file access, search, and shell.
//!
//! Every agent's router carries this small fixed set (filtered by the
//! agent's `allowed_tools`). All paths resolve against the agent's working
//! directory; relative paths never escape interpretation by the caller.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::process::Command;

use covey_core::{Error, Result};

/// Cap on the number of matching lines `search` reports.
const MAX_SEARCH_RESULTS: usize = 50;

/// The fixed built-in tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    /// Read a file: `{path}`.
    ReadFile,
    /// Write a file: `{path, content}`.
    WriteFile,
    /// Regex search over files: `{pattern, path?}`.
    Search,
    /// Run a shell command: `{command}`.
    Bash,
}

impl BuiltinTool {
    /// All built-in tools, in advertisement order.
    pub const ALL: [Self; 4] = [Self::ReadFile, Self::WriteFile, Self::Search, Self::Bash];

    /// The tool's wire name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::Search => "search",
            Self::Bash => "bash",
        }
    }

    /// Resolve a wire name to a built-in tool.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Short description for tool listings.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ReadFile => "Read a file from the agent's working directory",
            Self::WriteFile => "Write content to a file in the agent's working directory",
            Self::Search => "Search files for a regex pattern",
            Self::Bash => "Run a shell command in the agent's working directory",
        }
    }

    /// JSON-schema-shaped input contract.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        match self {
            Self::ReadFile => json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
            Self::WriteFile => json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"]
            }),
            Self::Search => json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" }
                },
                "required": ["pattern"]
            }),
            Self::Bash => json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"]
            }),
        }
    }

    /// Execute the tool against `directory` with loose-JSON arguments.
    pub async fn run(&self, directory: &Path, args: &Value) -> Result<String> {
        match self {
            Self::ReadFile => read_file(directory, args).await,
            Self::WriteFile => write_file(directory, args).await,
            Self::Search => search(directory, args).await,
            Self::Bash => bash(directory, args).await,
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str, tool: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_config(format!("{tool} requires a '{key}' argument")))
}

fn resolve(directory: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        directory.join(candidate)
    }
}

async fn read_file(directory: &Path, args: &Value) -> Result<String> {
    let path = resolve(directory, required_str(args, "path", "read_file")?);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| Error::file_read_failed(path, e.to_string()))
}

async fn write_file(directory: &Path, args: &Value) -> Result<String> {
    let path = resolve(directory, required_str(args, "path", "write_file")?);
    let content = required_str(args, "content", "write_file")?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::file_write_failed(&path, e.to_string()))?;
    }
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| Error::file_write_failed(&path, e.to_string()))?;

    Ok(format!("wrote {} bytes to {}", content.len(), path.display()))
}

async fn search(directory: &Path, args: &Value) -> Result<String> {
    let pattern = required_str(args, "pattern", "search")?;
    let regex = regex::Regex::new(pattern)
        .map_err(|e| Error::invalid_config(format!("invalid search pattern: {e}")))?;

    let scope = args.get("path").and_then(Value::as_str).unwrap_or("**/*");
    let glob_pattern = resolve(directory, scope).display().to_string();
    let entries = glob::glob(&glob_pattern)
        .map_err(|e| Error::invalid_config(format!("invalid search path: {e}")))?;

    let mut matches = Vec::new();
    for entry in entries.flatten() {
        if !entry.is_file() {
            continue;
        }
        // Binary and unreadable files are silently skipped.
        let Ok(content) = tokio::fs::read_to_string(&entry).await else {
            continue;
        };
        for (line_no, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!(
                    "{}:{}: {}",
                    entry.display(),
                    line_no.saturating_add(1),
                    line.trim_end()
                ));
                if matches.len() >= MAX_SEARCH_RESULTS {
                    matches.push("... (truncated)".to_string());
                    return Ok(matches.join("\n"));
                }
            }
        }
    }

    if matches.is_empty() {
        Ok(format!("no matches for '{pattern}'"))
    } else {
        Ok(matches.join("\n"))
    }
}

async fn bash(directory: &Path, args: &Value) -> Result<String> {
    let command = required_str(args, "command", "bash")?;

    let output = Command::new("bash")
        .arg("-c")
        .arg(command)
        .current_dir(directory)
        .output()
        .await
        .map_err(|e| Error::command_failed(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::command_failed(format!(
            "exit status {}: {}",
            output.status, stderr.trim()
        )))
    }
}
