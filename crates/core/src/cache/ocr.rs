//! Row-level operations on the `ocr_cache` table.
//!
//! These are the raw store calls. They surface every failure; the retry and
//! fail-open policy lives in [`super::results::ResultCache`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::format_timestamp;
use crate::Error;
use crate::payload::{AnalysisPayload, VisionPayload};
use crate::quality::LabelDraft;

/// A cached extraction keyed by image fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedResult {
    pub image_hash: String,
    pub vision_raw: Option<VisionPayload>,
    pub parsed_ingredients: Option<LabelDraft>,
    pub analysis: Option<AnalysisPayload>,
    pub confidence: f64,
    /// RFC 3339 time of the first write. Never changed by later writes.
    pub created_at: String,
}

/// Content written to the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheWrite {
    #[serde(default)]
    pub vision_raw: Option<VisionPayload>,
    pub parsed_ingredients: Option<LabelDraft>,
    #[serde(default)]
    pub analysis: Option<AnalysisPayload>,
    pub confidence: f64,
}

/// JSON-encoded columns of a write, computed before entering the DB thread.
struct EncodedWrite {
    vision_raw: Option<String>,
    parsed_ingredients: String,
    analysis: Option<String>,
    confidence: f64,
}

impl EncodedWrite {
    fn encode(write: &CacheWrite) -> Result<Self, Error> {
        Ok(Self {
            vision_raw: write.vision_raw.as_ref().map(serde_json::to_string).transpose()?,
            parsed_ingredients: serde_json::to_string(&write.parsed_ingredients)?,
            analysis: write.analysis.as_ref().map(serde_json::to_string).transpose()?,
            confidence: write.confidence,
        })
    }
}

/// Raw column values read from a row.
struct RawRow {
    image_hash: String,
    vision_raw: Option<String>,
    parsed_ingredients: String,
    analysis: Option<String>,
    confidence: f64,
    created_at: String,
}

impl RawRow {
    fn decode(self) -> Result<CachedResult, Error> {
        Ok(CachedResult {
            image_hash: self.image_hash,
            vision_raw: self.vision_raw.as_deref().map(VisionPayload::from_json).transpose()?,
            parsed_ingredients: serde_json::from_str(&self.parsed_ingredients)?,
            analysis: self.analysis.as_deref().map(serde_json::from_str).transpose()?,
            confidence: self.confidence,
            created_at: self.created_at,
        })
    }
}

impl CacheDb {
    /// Get a cached result by image hash.
    ///
    /// Returns None if the hash doesn't exist in the cache.
    pub async fn get_cached_result(&self, image_hash: &str) -> Result<Option<CachedResult>, Error> {
        let image_hash = image_hash.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<RawRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT image_hash, vision_raw, parsed_ingredients, analysis, confidence, created_at
                     FROM ocr_cache WHERE image_hash = ?1",
                )?;

                let result = stmt.query_row(params![image_hash], |row| {
                    Ok(RawRow {
                        image_hash: row.get(0)?,
                        vision_raw: row.get(1)?,
                        parsed_ingredients: row.get(2)?,
                        analysis: row.get(3)?,
                        confidence: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(RawRow::decode).transpose()
    }

    /// Insert or update a cached result.
    ///
    /// Uses UPSERT semantics keyed on `image_hash`. `created_at` is only
    /// written on insert: it is absent from the update set, so a conflicting
    /// write keeps the original value.
    pub async fn upsert_cached_result(
        &self, image_hash: &str, write: &CacheWrite, now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let image_hash = image_hash.to_string();
        let encoded = EncodedWrite::encode(write)?;
        let created_at = format_timestamp(now);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO ocr_cache (image_hash, vision_raw, parsed_ingredients, analysis, confidence, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(image_hash) DO UPDATE SET
                        vision_raw = excluded.vision_raw,
                        parsed_ingredients = excluded.parsed_ingredients,
                        analysis = excluded.analysis,
                        confidence = excluded.confidence",
                    params![
                        image_hash,
                        encoded.vision_raw,
                        encoded.parsed_ingredients,
                        encoded.analysis,
                        encoded.confidence,
                        created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Set only the analysis column of an existing row.
    ///
    /// Returns false if no row has this hash.
    pub async fn update_cached_analysis(&self, image_hash: &str, analysis: &AnalysisPayload) -> Result<bool, Error> {
        let image_hash = image_hash.to_string();
        let analysis = serde_json::to_string(analysis)?;

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE ocr_cache SET analysis = ?2 WHERE image_hash = ?1",
                    params![image_hash, analysis],
                )?;
                Ok(updated > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete results first written before `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_cached_results_before(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = format_timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM ocr_cache WHERE created_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_image_hash;
    use crate::quality::IngredientEntry;
    use chrono::Duration;

    fn make_write(confidence: f64) -> CacheWrite {
        CacheWrite {
            vision_raw: Some(VisionPayload::Ocr { text: "Supplement Facts".to_string(), blocks: Vec::new() }),
            parsed_ingredients: Some(LabelDraft {
                ingredients: vec![IngredientEntry {
                    name: "Magnesium".to_string(),
                    amount: Some(200.0),
                    unit: Some("mg".to_string()),
                }],
                confidence,
                coverage: 0.9,
                issues: Vec::new(),
            }),
            analysis: None,
            confidence,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let hash = compute_image_hash(b"image");
        let write = make_write(0.9);

        db.upsert_cached_result(&hash, &write, Utc::now()).await.unwrap();

        let row = db.get_cached_result(&hash).await.unwrap().unwrap();
        assert_eq!(row.parsed_ingredients, write.parsed_ingredients);
        assert_eq!(row.vision_raw, write.vision_raw);
        assert_eq!(row.confidence, 0.9);
        assert!(row.analysis.is_none());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_cached_result("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conflict_keeps_created_at() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let hash = compute_image_hash(b"image");
        let first = Utc::now() - Duration::days(3);

        db.upsert_cached_result(&hash, &make_write(0.5), first).await.unwrap();
        db.upsert_cached_result(&hash, &make_write(0.8), Utc::now()).await.unwrap();

        let row = db.get_cached_result(&hash).await.unwrap().unwrap();
        assert_eq!(row.created_at, format_timestamp(first));
        assert_eq!(row.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_update_analysis_only() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let hash = compute_image_hash(b"image");
        let write = make_write(0.9);
        db.upsert_cached_result(&hash, &write, Utc::now()).await.unwrap();

        let updated = db.update_cached_analysis(&hash, &AnalysisPayload::success(72.0)).await.unwrap();
        assert!(updated);

        let row = db.get_cached_result(&hash).await.unwrap().unwrap();
        assert_eq!(row.analysis, Some(AnalysisPayload::success(72.0)));
        assert_eq!(row.parsed_ingredients, write.parsed_ingredients);

        let missing = db.update_cached_analysis("nope", &AnalysisPayload::success(1.0)).await.unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_delete_before_cutoff() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_cached_result("old", &make_write(0.9), Utc::now() - Duration::days(40))
            .await
            .unwrap();
        db.upsert_cached_result("new", &make_write(0.9), Utc::now()).await.unwrap();

        let deleted = db
            .delete_cached_results_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_cached_result("old").await.unwrap().is_none());
        assert!(db.get_cached_result("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_an_error() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO ocr_cache (image_hash, parsed_ingredients, confidence, created_at)
                     VALUES ('bad', '{not json', 0.1, '2026-01-01T00:00:00.000000Z')",
                    [],
                )
            })
            .await
            .unwrap();

        assert!(matches!(db.get_cached_result("bad").await, Err(Error::Serialization(_))));
    }
}
