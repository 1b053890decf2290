use actix_web::{web, HttpResponse, Result as ActixResult};
use deadpool_postgres::Pool;
use validator::Validate;

use crate::errors::AppError;
use crate::models::requests::HistoryQuery;
use crate::models::responses::HistoryPagePayload;
use crate::repositories::HistoryRepository;
use crate::response::ApiResponse;

#[utoipa::path(
    get,
    path = "/analysis/history",
    tag = "Analysis",
    summary = "Past overlay analyses",
    params(
        ("page" = Option<i64>, Query, description = "1-based page (default: 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "Stored analyses, newest first", body = HistoryPagePayload),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub(crate) async fn get_history(
    pool: web::Data<Pool>,
    query: web::Query<HistoryQuery>,
) -> ActixResult<HttpResponse> {
    query.validate().map_err(|e| {
        AppError::Validation(format!("Validation failed: {e}"))
    })?;

    let client = pool.get().await.map_err(AppError::from)?;
    let (total, items) = HistoryRepository::list(&client, query.page, query.limit).await?;

    Ok(ApiResponse::ok(HistoryPagePayload {
        page: query.page,
        limit: query.limit,
        total,
        items,
    }))
}
