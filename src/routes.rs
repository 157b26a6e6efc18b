// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        admin::admin_handler,
        auth::auth_handler,
        properties::property_handler,
        uploads::upload_signature_handler,
        users::users_handler,
    },
    middleware::{auth, role_check},
    models::usermodel::UserRole,
    service::listing_expiry::expire_listings_on_request,
    AppState,
};

// Health check handler
async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "cache": app_state.db_client.cache_status()
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let admin_routes = admin_handler()
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
        .layer(middleware::from_fn(auth));

    let mut api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest(
            "/users",
            users_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest("/properties", property_handler())
        .merge(upload_signature_handler())
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http());

    if app_state.env.listing_sweep_on_request {
        tracing::info!("Listing expiry sweep runs on every API request");
        api_route = api_route.layer(middleware::from_fn(expire_listings_on_request));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(Extension(app_state))
}
