// Agenda API library
// Decision: Router assembly lives here so the binary and the HTTP tests share it

pub mod api;
pub mod config;
pub mod openapi;

use std::sync::Arc;

use agenda_core::EventStore;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use config::ServerConfig;
use openapi::ApiDoc;

/// Build the full HTTP application around a store.
pub fn build_app(store: Arc<EventStore>, config: &ServerConfig) -> Router {
    let api_routes = api::events::routes(api::events::AppState::new(store));

    // Health is never prefixed
    let app = Router::new()
        .route(
            "/health",
            get(api::health::health).fallback(api::common::method_not_allowed),
        )
        .merge(build_router_with_prefix(api_routes, &config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(api::common::not_found);

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    } else {
        app
    };

    app.layer(CatchPanicLayer::custom(api::common::panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Build router with optional API prefix
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
