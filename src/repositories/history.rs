use crate::errors::AppError;
use crate::models::responses::{AnalysisPayload, HistoryEntry};
use deadpool_postgres::Object;

pub(crate) struct HistoryRepository;

impl HistoryRepository {
    /// Stores a completed analysis and returns its history ID.
    pub async fn record(
        client: &Object,
        incident_ids: &[String],
        payload: &AnalysisPayload,
    ) -> Result<i64, AppError> {
        let sql = r#"
            INSERT INTO overlay_analyses (incident_ids, risk_score, region_count, result)
            VALUES ($1, $2, $3, $4::text::jsonb)
            RETURNING id
        "#;

        let result = serde_json::to_string(payload)?;
        let risk_score = i32::from(payload.risk_score);
        let region_count = i32::try_from(payload.overlapping_areas.len()).unwrap_or(i32::MAX);

        let row = client
            .query_one(sql, &[&incident_ids, &risk_score, &region_count, &result])
            .await?;
        Ok(row.get(0))
    }

    /// Returns the total number of stored analyses and one page, newest first.
    pub async fn list(client: &Object, page: i64, limit: i64) -> Result<(i64, Vec<HistoryEntry>), AppError> {
        let total: i64 = client
            .query_one("SELECT COUNT(*) FROM overlay_analyses", &[])
            .await?
            .get(0);

        let sql = r#"
            SELECT id, incident_ids, risk_score, region_count,
                   to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"'),
                   result::text
            FROM overlay_analyses
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
        "#;

        let offset = (page - 1).saturating_mul(limit);
        let rows = client.query(sql, &[&limit, &offset]).await?;

        let items = rows
            .iter()
            .map(|row| -> Result<HistoryEntry, AppError> {
                let raw: String = row.get(5);
                Ok(HistoryEntry {
                    id: row.get(0),
                    incident_ids: row.get(1),
                    risk_score: row.get(2),
                    region_count: row.get(3),
                    created_at: row.get(4),
                    result: serde_json::from_str(&raw)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok((total, items))
    }
}
