//! Quality gating for extracted label drafts and barcode lookups.
//!
//! Decides whether an OCR/vision-extracted label is trustworthy enough to be
//! scored on its own, whether the numeric score must be muted, and whether a
//! human should review the extraction.
//!
//! ### Thresholds
//! - Review below 0.75 confidence or 0.70 coverage.
//! - Label-only scoring requires 0.85 confidence and 0.85 coverage.
//!
//! These are fixed; changing them changes behavior.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Confidence below which review is recommended.
pub const REVIEW_CONFIDENCE: f64 = 0.75;
/// Coverage below which review is recommended.
pub const REVIEW_COVERAGE: f64 = 0.70;
/// Confidence required for label-only scoring.
pub const ELIGIBLE_CONFIDENCE: f64 = 0.85;
/// Coverage required for label-only scoring.
pub const ELIGIBLE_COVERAGE: f64 = 0.85;

/// Issue tag attached to a draft by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueTag {
    UnitInvalid,
    ValueAnomaly,
    LowCoverage,
    IncompleteIngredients,
    MissingServingSize,
    DuplicateIngredient,
    OcrNoise,
    Other(String),
}

impl IssueTag {
    /// Tags that force review regardless of confidence or coverage.
    pub const BLOCKING: [IssueTag; 4] =
        [IssueTag::UnitInvalid, IssueTag::ValueAnomaly, IssueTag::LowCoverage, IssueTag::IncompleteIngredients];

    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueTag::UnitInvalid => "unit_invalid",
            IssueTag::ValueAnomaly => "value_anomaly",
            IssueTag::LowCoverage => "low_coverage",
            IssueTag::IncompleteIngredients => "incomplete_ingredients",
            IssueTag::MissingServingSize => "missing_serving_size",
            IssueTag::DuplicateIngredient => "duplicate_ingredient",
            IssueTag::OcrNoise => "ocr_noise",
            IssueTag::Other(tag) => tag,
        }
    }
}

impl From<&str> for IssueTag {
    fn from(tag: &str) -> Self {
        match tag {
            "unit_invalid" => IssueTag::UnitInvalid,
            "value_anomaly" => IssueTag::ValueAnomaly,
            "low_coverage" => IssueTag::LowCoverage,
            "incomplete_ingredients" => IssueTag::IncompleteIngredients,
            "missing_serving_size" => IssueTag::MissingServingSize,
            "duplicate_ingredient" => IssueTag::DuplicateIngredient,
            "ocr_noise" => IssueTag::OcrNoise,
            other => IssueTag::Other(other.to_string()),
        }
    }
}

impl From<String> for IssueTag {
    fn from(tag: String) -> Self {
        IssueTag::from(tag.as_str())
    }
}

impl From<IssueTag> for String {
    fn from(tag: IssueTag) -> Self {
        tag.as_str().to_string()
    }
}

impl schemars::JsonSchema for IssueTag {
    fn schema_name() -> Cow<'static, str> {
        "IssueTag".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        String::json_schema(generator)
    }
}

impl fmt::Display for IssueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue reported by the extractor, with optional detail text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DraftIssue {
    pub tag: IssueTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DraftIssue {
    pub fn new(tag: impl Into<IssueTag>) -> Self {
        Self { tag: tag.into(), detail: None }
    }
}

/// One ingredient line from the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct IngredientEntry {
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl IngredientEntry {
    /// An entry counts as valid when it has both an amount and a non-blank unit.
    pub fn is_valid(&self) -> bool {
        self.amount.is_some() && self.unit.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Structured extraction of a supplement label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LabelDraft {
    #[serde(default)]
    pub ingredients: Vec<IngredientEntry>,
    /// Extractor confidence in [0, 1].
    pub confidence: f64,
    /// Fraction of the label the parser accounted for, in [0, 1].
    pub coverage: f64,
    #[serde(default)]
    pub issues: Vec<DraftIssue>,
}

impl LabelDraft {
    pub fn valid_count(&self) -> usize {
        self.ingredients.iter().filter(|e| e.is_valid()).count()
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.ingredients.iter().map(|e| e.name.clone()).collect()
    }
}

/// Trust tier of an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ExtractionQuality {
    High,
    Medium,
    Low,
}

/// Outcome of gating a draft. Recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QualityVerdict {
    pub review_recommended: bool,
    pub muted_score: bool,
    pub blocking_issues: BTreeSet<IssueTag>,
    pub label_only_score_eligible: bool,
    pub extraction_quality: ExtractionQuality,
    pub valid_count: usize,
}

/// Gate a draft using its own issue list.
pub fn evaluate_draft(draft: Option<&LabelDraft>) -> QualityVerdict {
    let issues = draft.map(|d| d.issues.as_slice()).unwrap_or_default();
    evaluate(draft, issues)
}

/// Gate a draft against an explicit issue list.
///
/// Total over its input: an absent draft is a valid case that yields a
/// review-recommended, muted, `Low` verdict.
pub fn evaluate(draft: Option<&LabelDraft>, issues: &[DraftIssue]) -> QualityVerdict {
    let blocking_issues: BTreeSet<IssueTag> =
        issues.iter().filter(|i| i.tag.is_blocking()).map(|i| i.tag.clone()).collect();

    let Some(draft) = draft else {
        return QualityVerdict {
            review_recommended: true,
            muted_score: true,
            blocking_issues,
            label_only_score_eligible: false,
            extraction_quality: ExtractionQuality::Low,
            valid_count: 0,
        };
    };

    let valid_count = draft.valid_count();
    let unblocked = blocking_issues.is_empty();

    // Comparisons are written so that NaN fails every threshold.
    let meets_review = draft.confidence >= REVIEW_CONFIDENCE && draft.coverage >= REVIEW_COVERAGE;
    let meets_eligible = draft.confidence >= ELIGIBLE_CONFIDENCE && draft.coverage >= ELIGIBLE_COVERAGE;

    let review_recommended = valid_count == 0 || !meets_review || !unblocked;
    let label_only_score_eligible = meets_eligible && unblocked && valid_count >= 1;
    let muted_score = !label_only_score_eligible || review_recommended;

    let extraction_quality = if unblocked && meets_eligible {
        ExtractionQuality::High
    } else if unblocked && meets_review {
        ExtractionQuality::Medium
    } else {
        ExtractionQuality::Low
    };

    QualityVerdict {
        review_recommended,
        muted_score,
        blocking_issues,
        label_only_score_eligible,
        extraction_quality,
        valid_count,
    }
}

/// Status of a barcode product lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeStatus {
    Ok,
    NotFound,
    Error,
    #[serde(other)]
    Other,
}

/// Result of looking a barcode up in the product catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BarcodeLookup {
    pub barcode: String,
    pub status: BarcodeStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl BarcodeLookup {
    /// True when the lookup failed, either by status or by a reported error.
    pub fn error_state(&self) -> bool {
        self.status == BarcodeStatus::Error || self.error.is_some()
    }
}
