use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Analysis lifecycle ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states carry a processing time and accept no further
    /// writes from a running workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Clause taxonomy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseType {
    Obligation,
    Restriction,
    Right,
    Termination,
    Confidentiality,
    IntellectualProperty,
    Liability,
    Payment,
    Duration,
    Other,
}

impl ClauseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Obligation => "obligation",
            Self::Restriction => "restriction",
            Self::Right => "right",
            Self::Termination => "termination",
            Self::Confidentiality => "confidentiality",
            Self::IntellectualProperty => "intellectual_property",
            Self::Liability => "liability",
            Self::Payment => "payment",
            Self::Duration => "duration",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "obligation" => Some(Self::Obligation),
            "restriction" => Some(Self::Restriction),
            "right" => Some(Self::Right),
            "termination" => Some(Self::Termination),
            "confidentiality" => Some(Self::Confidentiality),
            "intellectual_property" => Some(Self::IntellectualProperty),
            "liability" => Some(Self::Liability),
            "payment" => Some(Self::Payment),
            "duration" => Some(Self::Duration),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

// ── Domain records ───────────────────────────────────────────────────────

/// One legally meaningful provision extracted from a document.
/// Produced once by the extraction stage and immutable afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub title: String,
    /// Verbatim excerpt from the document.
    pub content: String,
    #[serde(rename = "type")]
    pub clause_type: ClauseType,
    /// 1 = very low … 5 = very high.
    pub risk_level: u8,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    /// 1 = low, 2 = medium, 3 = high.
    pub priority: u8,
    pub suggested_text: Option<String>,
    /// Clause titles; not enforced to exist.
    #[serde(default)]
    pub related_clauses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    /// 1 = very low … 5 = very high.
    pub level: u8,
    pub impact: String,
    pub mitigation: Option<String>,
}

/// A prior legal case or reference judged relevant to a clause.
///
/// Two provenances: vector-retrieved (score = cosine similarity) and
/// generative (score fixed at 0.95, unverified but model-asserted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precedent {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub relevance: String,
    pub source: Option<String>,
    pub similarity_score: f64,
}

/// Aggregate produced exactly once, at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub precedents: Vec<Precedent>,
    pub summary: Option<String>,
    /// At minimum: document_type and analysis_date.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An analysis record as stored in the durable store.
///
/// Invariants: `results` is non-null iff `status == completed`; `error` is
/// non-null only when `status == failed`. Mutated only through
/// [`crate::progress::ProgressTracker`] while a run owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub document_id: String,
    /// Free-form document type ("nda", "employment", ...).
    pub document_type: String,
    pub status: AnalysisStatus,
    /// Checkpoint fraction in [0.0, 1.0], not a measured percentage.
    pub progress: f64,
    pub results: Option<AnalysisResults>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Wall-clock `updated_at - created_at`, set only on terminal states.
    pub processing_time_secs: Option<f64>,
}
