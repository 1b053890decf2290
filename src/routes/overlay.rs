use actix_web::{web, HttpResponse, Result as ActixResult};
use deadpool_postgres::Pool;
use validator::Validate;

use crate::analysis;
use crate::config::AnalysisSettings;
use crate::errors::AppError;
use crate::models::{AnalysisPayload, OverlayRequest};
use crate::repositories::{HistoryRepository, IncidentRepository};
use crate::validation::validate_incident_ids;

/// Repeat-disaster overlay analysis over a set of incidents.
#[utoipa::path(
    post,
    path = "/analysis/overlay",
    tag = "Analysis",
    summary = "Overlapping affected areas and risk score",
    description = "Intersects the affected-area polygons of the given incidents and returns every \
        area where two or more of them overlap, each with a risk level, plus an overall 0-100 \
        risk score and response recommendations.\n\n\
        Incidents without an affected area, with an unusable polygon, or whose ID is unknown are \
        skipped and listed under `warnings`. The request fails with `INSUFFICIENT_INPUT` when \
        fewer than 2 distinct IDs resolve, and with `TOO_MANY_INCIDENTS` when more IDs are sent \
        than the server allows.",
    request_body = OverlayRequest,
    responses(
        (status = 200, description = "Overlay analysis result", body = AnalysisPayload),
        (status = 400, description = "Invalid, insufficient, or too many incident IDs")
    )
)]
pub(crate) async fn analyze_overlay(
    pool: web::Data<Pool>,
    settings: web::Data<AnalysisSettings>,
    body: web::Json<OverlayRequest>,
) -> ActixResult<HttpResponse> {
    body.validate().map_err(|e| {
        AppError::Validation(format!("Validation failed: {e}"))
    })?;
    let ids = validate_incident_ids(&body.incident_ids, settings.policy.max_incidents)?;

    let client = pool.get().await.map_err(AppError::from)?;
    configure_conn(&client).await;

    let incidents = IncidentRepository::find_by_ids(&client, &ids).await?;
    let payload = analysis::analyze_overlay(&ids, incidents, &settings.policy).map_err(AppError::from)?;

    if settings.history_enabled {
        match HistoryRepository::record(&client, &ids, &payload).await {
            Ok(id) => log::debug!("Recorded overlay analysis {id}"),
            Err(err) => log::warn!("Failed to record overlay analysis history: {err}"),
        }
    }

    Ok(HttpResponse::Ok().json(payload))
}

async fn configure_conn(client: &deadpool_postgres::Object) {
    client.execute("SET statement_timeout = '30s'", &[]).await.ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use deadpool_postgres::{Config as PgConfig, Runtime};
    use serde_json::{json, Value};
    use tokio_postgres::NoTls;

    // Never connects: every case here is rejected before a client is checked out.
    fn unconnected_pool() -> Pool {
        let mut cfg = PgConfig::new();
        cfg.host = Some("127.0.0.1".into());
        cfg.port = Some(1);
        cfg.dbname = Some("test".into());
        cfg.create_pool(Some(Runtime::Tokio1), NoTls).unwrap()
    }

    async fn post(body: Value) -> (u16, Value) {
        let mut settings = AnalysisSettings::default();
        settings.policy.max_incidents = 3;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(unconnected_pool()))
                .app_data(web::Data::new(settings))
                .configure(crate::routes::configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/v1/analysis/overlay")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status().as_u16();
        let json: Value = test::read_body_json(resp).await;
        (status, json)
    }

    #[actix_web::test]
    async fn single_id_is_insufficient() {
        let (status, json) = post(json!({ "incidentIds": ["a1"] })).await;
        assert_eq!(status, 400);
        assert_eq!(json["error"]["kind"], "INSUFFICIENT_INPUT");
    }

    #[actix_web::test]
    async fn duplicates_do_not_count_twice() {
        let (status, json) = post(json!({ "incidentIds": ["a1", " a1 "] })).await;
        assert_eq!(status, 400);
        assert_eq!(json["error"]["kind"], "INSUFFICIENT_INPUT");
    }

    #[actix_web::test]
    async fn over_cap_is_rejected() {
        let (status, json) = post(json!({ "incidentIds": ["a", "b", "c", "d"] })).await;
        assert_eq!(status, 400);
        assert_eq!(json["error"]["kind"], "TOO_MANY_INCIDENTS");
    }

    #[actix_web::test]
    async fn blank_id_fails_validation() {
        let (status, json) = post(json!({ "incidentIds": ["a", ""] })).await;
        assert_eq!(status, 400);
        assert_eq!(json["error"]["kind"], "VALIDATION");
    }
}
