pub mod health;
pub mod history;
pub mod overlay;

use actix_web::web;

use crate::config::API_PREFIX;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(API_PREFIX)
            .route("/health", web::get().to(health::health))
            .route("/analysis/overlay", web::post().to(overlay::analyze_overlay))
            .route("/analysis/history", web::get().to(history::get_history)),
    );
}
