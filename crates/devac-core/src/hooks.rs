//! Hook output contract and validation ingest types
//!
//! Assistant hook adapters exchange UTF-8 JSON documents with the core. On
//! write the core emits only the current shapes; on read it also accepts the
//! legacy `Stop` event wrapper.

use crate::error::DevacError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a validator-reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
}

/// Which validator produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSource {
    Tsc,
    Eslint,
    Biome,
    Test,
    Coverage,
}

/// One issue handed to the core by a validation adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub severity: ValidationSeverity,
    pub source: ValidationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Document returned to a hook caller.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutput {
    /// Blocks the triggering action with a reason.
    Stop { stop_reason: String },
    /// Injects additional context into the conversation. The payload MUST
    /// be wrapped in `<system-reminder>` tags (empty body permitted).
    UserPromptContext { additional_context: String },
}

impl HookOutput {
    /// Serialize to the wire shape. Context output is validated: a payload
    /// outside `<system-reminder>…</system-reminder>` is a schema violation.
    pub fn to_json(&self) -> Result<String, DevacError> {
        match self {
            HookOutput::Stop { stop_reason } => {
                Ok(serde_json::json!({ "stopReason": stop_reason }).to_string())
            }
            HookOutput::UserPromptContext { additional_context } => {
                if !is_system_reminder_wrapped(additional_context) {
                    return Err(DevacError::SchemaViolation(
                        "additionalContext must be wrapped in <system-reminder> tags".to_string(),
                    ));
                }
                Ok(serde_json::json!({
                    "hookSpecificOutput": {
                        "hookEventName": "UserPromptSubmit",
                        "additionalContext": additional_context,
                    }
                })
                .to_string())
            }
        }
    }

    /// Wrap a payload in `<system-reminder>` tags and build a context output.
    pub fn context(payload: &str) -> Self {
        HookOutput::UserPromptContext {
            additional_context: format!("<system-reminder>{payload}</system-reminder>"),
        }
    }
}

/// Error and warning counts extracted from validator text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub errors: u32,
    pub warnings: u32,
}

/// Result of parsing a hook's stdout document.
#[derive(Debug, Clone, PartialEq)]
pub struct HookParse {
    pub valid: bool,
    pub counts: IssueCounts,
    pub error: Option<String>,
}

fn invalid(reason: &str) -> HookParse {
    HookParse {
        valid: false,
        counts: IssueCounts::default(),
        error: Some(reason.to_string()),
    }
}

fn is_system_reminder_wrapped(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("<system-reminder>") && trimmed.ends_with("</system-reminder>")
}

/// Count error/warning mentions in free-form validator text,
/// case-insensitively. "No issues found" yields zeros.
pub fn count_issues(text: &str) -> IssueCounts {
    let error_re = Regex::new(r"(?i)(\d+)\s+(?:\w+\s+)?errors?").unwrap();
    let warning_re = Regex::new(r"(?i)(\d+)\s+(?:\w+\s+)?warnings?").unwrap();
    let grab = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    IssueCounts {
        errors: grab(&error_re),
        warnings: grab(&warning_re),
    }
}

/// Parse a `DevAC Status: …` summary line into issue counts.
pub fn parse_status_line(line: &str) -> IssueCounts {
    count_issues(line)
}

/// Parse a hook's stdout. Accepts the current `stopReason` shape, the
/// current `UserPromptSubmit` shape, and the legacy `Stop` event wrapper;
/// anything else fails schema validation.
pub fn parse_hook_output(stdout: &str) -> HookParse {
    let doc: Value = match serde_json::from_str(stdout) {
        Ok(v) => v,
        Err(_) => return invalid("Invalid JSON"),
    };

    if let Some(reason) = doc.get("stopReason").and_then(Value::as_str) {
        return HookParse {
            valid: true,
            counts: count_issues(reason),
            error: None,
        };
    }

    let Some(specific) = doc.get("hookSpecificOutput") else {
        return invalid("Schema validation failed");
    };
    let event = specific.get("hookEventName").and_then(Value::as_str);
    let context = specific.get("additionalContext").and_then(Value::as_str);
    match event {
        Some("UserPromptSubmit") => {
            let Some(context) = context else {
                return invalid("Schema validation failed");
            };
            if !is_system_reminder_wrapped(context) {
                return invalid("Schema validation failed");
            }
            HookParse {
                valid: true,
                counts: count_issues(context),
                error: None,
            }
        }
        // Legacy shape, read-only. New code emits stopReason instead.
        Some("Stop") => HookParse {
            valid: true,
            counts: context.map(count_issues).unwrap_or_default(),
            error: None,
        },
        _ => invalid("Schema validation failed"),
    }
}
