use serde::Serialize;
use utoipa::ToSchema;

use crate::analysis::risk::RiskLevel;
use crate::analysis::Priority;

#[derive(Serialize, ToSchema)]
pub struct HealthPayload {
    pub status: String,
}

/// Result of `POST /analysis/overlay`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    /// Distinct requested IDs, including unknown ones and incidents without a usable area.
    pub total_incidents: usize,
    pub overlapping_areas: Vec<OverlappingArea>,
    /// 0-100.
    pub risk_score: u8,
    pub recommendations: Vec<String>,
    /// Incidents skipped or excluded from the geometric analysis.
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverlappingArea {
    /// GeoJSON polygon rings in [lon, lat], exterior first.
    pub coordinates: Vec<Vec<[f64; 2]>>,
    pub incident_count: usize,
    pub incident_ids: Vec<String>,
    pub risk_level: RiskLevel,
    /// Square kilometres.
    pub area: f64,
    pub max_priority: Priority,
    pub span_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWarning {
    pub incident_id: String,
    pub kind: String,
    pub message: String,
}

impl AnalysisWarning {
    pub fn new(incident_id: &str, kind: &str, message: &str) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub incident_ids: Vec<String>,
    pub risk_score: i32,
    pub region_count: i32,
    /// RFC 3339, UTC.
    pub created_at: String,
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryPagePayload {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub items: Vec<HistoryEntry>,
}
