// Route table for the Autotest API

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::metrics;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/tasks/:course/:task/tests", post(handlers::create_test))
        .route("/tasks/:course/:task/tests/:visibility", get(handlers::list_tests))
        .route(
            "/tasks/:course/:task/tests/:visibility/:name",
            get(handlers::get_test)
                .put(handlers::update_test)
                .delete(handlers::delete_test),
        )
        .route("/tasks/:course/:task/script", get(handlers::download_script))
        .route(
            "/tasks/:course/:task/script/:visibility",
            put(handlers::upload_script),
        )
        .route(
            "/tasks/:course/:task/tolerance",
            get(handlers::get_tolerance).put(handlers::set_tolerance),
        )
}
