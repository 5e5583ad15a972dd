//! label_evaluate tool implementation.
//!
//! Gates a label draft (and optionally a barcode lookup) without side effects.

use labelgate_core::quality::{BarcodeLookup, DraftIssue, LabelDraft, QualityVerdict, evaluate, evaluate_draft};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the label_evaluate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabelEvaluateParams {
    /// Extracted draft. Omit when extraction produced nothing.
    #[serde(default)]
    pub draft: Option<LabelDraft>,

    /// Issues to gate on. Defaults to the draft's own issues.
    #[serde(default)]
    pub issues: Option<Vec<DraftIssue>>,

    /// Barcode lookup from the barcode path, if one ran.
    #[serde(default)]
    pub barcode: Option<BarcodeLookup>,
}

/// Output from the label_evaluate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabelEvaluateOutput {
    pub verdict: QualityVerdict,
    /// Present only when a barcode lookup was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode_error_state: Option<bool>,
}

pub fn evaluate_impl(params: LabelEvaluateParams) -> Result<CallToolResult, McpError> {
    let verdict = match &params.issues {
        Some(issues) => evaluate(params.draft.as_ref(), issues),
        None => evaluate_draft(params.draft.as_ref()),
    };

    let output = LabelEvaluateOutput { verdict, barcode_error_state: params.barcode.as_ref().map(BarcodeLookup::error_state) };
    json_result(&output)
}
