use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRequest {
    /// Incidents to compare. At least 2 distinct IDs.
    #[validate(custom(function = "crate::validation::validate_incident_id_entries"))]
    pub incident_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be 1 or greater"))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}
