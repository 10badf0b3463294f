pub mod health;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::review::handlers;
use crate::state::AppState;
use crate::upload::handlers::{handle_upload, MAX_UPLOAD_BYTES};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list_resumes)
                .post(handle_upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/resumes/:id", get(handlers::handle_get_resume))
        .route("/api/v1/resumes/:id/file", get(handlers::handle_get_file))
        .route(
            "/api/v1/resumes/:id/preview",
            get(handlers::handle_get_preview),
        )
        .with_state(state)
}
