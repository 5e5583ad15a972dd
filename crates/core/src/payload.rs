//! Typed payloads persisted by the caches.
//!
//! Each payload is a tagged union over the known producers with an explicit
//! `Opaque` fallback, so stored JSON from an unknown producer still round-trips
//! without being interpreted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::quality::{BarcodeLookup, LabelDraft};

/// Raw output of the vision/OCR provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum VisionPayload {
    /// Plain OCR text with optional per-block lines.
    Ocr {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        blocks: Vec<String>,
    },
    /// Anything else the provider returned, kept verbatim.
    Opaque(serde_json::Value),
}

impl VisionPayload {
    /// Decode stored JSON, wrapping unrecognized shapes as `Opaque`.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        decode_or_opaque(json, VisionPayload::Opaque)
    }
}

/// Status reported by the analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    Failed,
    Pending,
    #[serde(other)]
    Other,
}

/// Completed (or attempted) analysis of a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnalysisPayload {
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Canonical tokens the analysis matched against the reference taxonomy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_tokens: Vec<String>,
    /// Producer-specific details, not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AnalysisPayload {
    pub fn success(score: f64) -> Self {
        Self { status: AnalysisStatus::Success, score: Some(score), summary: None, matched_tokens: Vec::new(), details: None }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }
}

/// Which extraction path produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Barcode,
    Label,
    Mixed,
}

impl SnapshotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotSource::Barcode => "barcode",
            SnapshotSource::Label => "label",
            SnapshotSource::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "barcode" => Ok(SnapshotSource::Barcode),
            "label" => Ok(SnapshotSource::Label),
            "mixed" => Ok(SnapshotSource::Mixed),
            other => Err(Error::InvalidInput(format!("unknown snapshot source: {other}"))),
        }
    }
}

/// Product snapshot stored by the snapshot cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SnapshotPayload {
    Barcode(BarcodeLookup),
    Label(LabelDraft),
    /// Combined barcode and label evidence.
    Mixed { barcode: BarcodeLookup, label: LabelDraft },
    Opaque(serde_json::Value),
}

impl SnapshotPayload {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        decode_or_opaque(json, SnapshotPayload::Opaque)
    }
}

/// Decode a tagged payload; if it isn't one of the known shapes, keep it as opaque JSON.
///
/// Only text that is not JSON at all is an error.
fn decode_or_opaque<T, F>(json: &str, opaque: F) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(serde_json::Value) -> T,
{
    let value: serde_json::Value = serde_json::from_str(json)?;
    match serde_json::from_value::<T>(value.clone()) {
        Ok(typed) => Ok(typed),
        Err(_) => Ok(opaque(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_payload_typed() {
        let payload = VisionPayload::Ocr { text: "Supplement Facts".to_string(), blocks: Vec::new() };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(VisionPayload::from_json(&json).unwrap(), payload);
    }

    #[test]
    fn test_vision_payload_unknown_shape_is_opaque() {
        let parsed = VisionPayload::from_json(r#"{"responses":[{"fullTextAnnotation":{}}]}"#).unwrap();
        assert!(matches!(parsed, VisionPayload::Opaque(v) if v.get("responses").is_some()));
    }

    #[test]
    fn test_vision_payload_rejects_non_json() {
        assert!(VisionPayload::from_json("not json").is_err());
    }

    #[test]
    fn test_analysis_unknown_status() {
        let analysis: AnalysisPayload = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Other);
        assert!(!analysis.is_success());
    }

    #[test]
    fn test_snapshot_source_parse() {
        assert_eq!("label".parse::<SnapshotSource>().unwrap(), SnapshotSource::Label);
        assert!("receipt".parse::<SnapshotSource>().is_err());
    }

    #[test]
    fn test_snapshot_payload_label() {
        let json = r#"{"kind":"label","data":{"ingredients":[],"confidence":0.5,"coverage":0.4}}"#;
        let payload = SnapshotPayload::from_json(json).unwrap();
        assert!(matches!(payload, SnapshotPayload::Label(d) if d.confidence == 0.5));
    }
}
