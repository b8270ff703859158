pub mod battery;
pub mod error;
pub mod forecast;
pub mod health;
pub mod optimize;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, controller::AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/batteries",
            get(battery::list_batteries).post(battery::create_battery),
        )
        .route(
            "/batteries/:id",
            get(battery::get_battery).delete(battery::delete_battery),
        )
        .route("/batteries/:id/charge", post(battery::charge_battery))
        .route("/batteries/:id/discharge", post(battery::discharge_battery))
        .route("/optimize", post(optimize::run_optimization))
        .route("/optimize/last", get(optimize::last_optimization))
        .route("/forecasted/:source", get(forecast::get_forecast))
        .route("/forecasted/:source/:source_id", put(forecast::put_forecast))
        .route("/source-ids/:source", get(forecast::source_ids))
        .route("/device-status", get(forecast::device_status))
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::Any;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
