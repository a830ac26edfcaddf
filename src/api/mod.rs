pub mod auth;
mod categories;
pub mod error;
mod extract;
mod invoices;
pub mod origin;
mod products;
pub mod rate_limit;
mod requests;
mod scope;
pub mod session;
mod storage;
mod suppliers;
mod users;
mod validation;


use axum::{
    extract::DefaultBodyLimit,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;
use error::ApiError;

/// Room for multipart boundaries and text fields around the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route(
            "/login",
            post(auth::login).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_login,
            )),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/register",
            post(auth::register).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_register,
            )),
        )
        .route("/session", get(auth::session));

    let upload_limit = usize::try_from(state.config.storage.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api_routes = Router::new()
        // Users (admin only)
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", patch(users::update_user).delete(users::delete_user))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories)
                .post(categories::create_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Suppliers
        .route(
            "/suppliers",
            get(suppliers::list_suppliers)
                .post(suppliers::create_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        // Products
        .route(
            "/products",
            get(products::list_products)
                .post(products::create_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id", get(products::get_product))
        // Requests
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        // Invoices
        .route("/invoices", get(invoices::list_invoices).post(invoices::create_invoice))
        // Storage
        .route(
            "/storage",
            get(storage::list_files)
                .post(storage::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .merge(api_routes)
        .fallback(not_found)
        .layer(middleware::map_response(method_not_allowed_envelope))
        .layer(origin::cors_layer(&state.config.cors))
        .layer(middleware::from_fn_with_state(state.clone(), origin::origin_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

/// Give the router's bare 405 responses the JSON error body, keeping `Allow`
async fn method_not_allowed_envelope(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut enveloped = ApiError::method_not_allowed().into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(header::ALLOW, allow);
    }
    enveloped
}
