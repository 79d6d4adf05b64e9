//! Hub record types

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Active,
    Stale,
    Removed,
    Missing,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Removed => "removed",
            Self::Missing => "missing",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "stale" => Some(Self::Stale),
            "removed" => Some(Self::Removed),
            "missing" => Some(Self::Missing),
            _ => None,
        }
    }
}

/// One repository registered with the workspace hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRegistration {
    pub repo_id: String,
    pub local_path: String,
    pub manifest_hash: Option<String>,
    pub last_synced: Option<String>,
    pub status: RepoStatus,
}

impl RepoRegistration {
    pub fn new(repo_id: impl Into<String>, local_path: impl Into<String>) -> Self {
        RepoRegistration {
            repo_id: repo_id.into(),
            local_path: local_path.into(),
            manifest_hash: None,
            last_synced: None,
            status: RepoStatus::Active,
        }
    }
}

/// An edge whose source and target live in different registered repos.
/// Primary key: (source_entity_id, target_entity_id, edge_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRepoEdge {
    pub source_repo: String,
    pub source_entity_id: String,
    pub target_repo: String,
    pub target_entity_id: String,
    pub edge_type: String,
    pub metadata: Option<String>,
}

/// Which validator or integration produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticSource {
    Tsc,
    Eslint,
    Biome,
    Test,
    Coverage,
    CiCheck,
    GithubIssue,
    PrReview,
}

impl DiagnosticSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tsc => "tsc",
            Self::Eslint => "eslint",
            Self::Biome => "biome",
            Self::Test => "test",
            Self::Coverage => "coverage",
            Self::CiCheck => "ci-check",
            Self::GithubIssue => "github-issue",
            Self::PrReview => "pr-review",
        }
    }

    pub fn parse_source(s: &str) -> Option<Self> {
        match s {
            "tsc" => Some(Self::Tsc),
            "eslint" => Some(Self::Eslint),
            "biome" => Some(Self::Biome),
            "test" => Some(Self::Test),
            "coverage" => Some(Self::Coverage),
            "ci-check" => Some(Self::CiCheck),
            "github-issue" => Some(Self::GithubIssue),
            "pr-review" => Some(Self::PrReview),
            _ => None,
        }
    }
}

/// Diagnostic severity, ordered critical → note for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Critical,
    Error,
    Warning,
    Suggestion,
    Note,
}

impl DiagnosticSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
            Self::Note => "note",
        }
    }

    pub fn parse_severity(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "suggestion" => Some(Self::Suggestion),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    /// Sort rank: lower is more severe.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Critical => 0,
            Self::Error => 1,
            Self::Warning => 2,
            Self::Suggestion => 3,
            Self::Note => 4,
        }
    }
}

/// One normalized diagnostic, whatever its origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDiagnostic {
    pub diagnostic_id: String,
    pub repo_id: String,
    pub source: DiagnosticSource,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub severity: DiagnosticSeverity,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub code: Option<String>,
    pub suggestion: Option<String>,
    pub resolved: bool,
    pub actionable: bool,
    /// Source-specific reference: PR number, issue URL, CI run id.
    pub reference: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Filter for diagnostic queries; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticFilter {
    pub repo_id: Option<String>,
    pub source: Option<DiagnosticSource>,
    pub severity: Option<DiagnosticSeverity>,
    pub category: Option<String>,
    pub file: Option<String>,
    pub resolved: Option<bool>,
    pub actionable: Option<bool>,
    pub limit: Option<usize>,
}

/// Grouping key for diagnostic summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryGroupBy {
    Source,
    Severity,
    Category,
    Repo,
}

impl SummaryGroupBy {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Severity => "severity",
            Self::Category => "category",
            Self::Repo => "repo_id",
        }
    }
}

/// One row of a grouped summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSummaryRow {
    pub key: String,
    pub total: i64,
    pub unresolved: i64,
}

/// Overall diagnostic counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    pub total: i64,
    pub unresolved: i64,
    pub critical: i64,
    pub errors: i64,
    pub warnings: i64,
}
