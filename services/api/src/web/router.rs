//! services/api/src/web/router.rs
//!
//! Assembles the axum router: public routes, the authenticated routes behind
//! `require_auth`, CORS for the browser app and per-request tracing.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::web::{
    applications, auth, conversations, middleware::require_auth, profile, recommendations,
    rest::health_handler, state::AppState, turn_relay, vector_stores,
};

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn cors_layer(app_base_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    match app_base_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("APP_BASE_URL '{}' is not a valid origin: {}", app_base_url, e);
            layer
        }
    }
}

/// Builds the complete API router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/guest", post(auth::guest_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/convert_guest", post(auth::convert_guest_handler))
        .route(
            "/profile",
            get(profile::get_profile_handler)
                .put(profile::update_profile_handler)
                .delete(profile::delete_profile_handler),
        )
        .route(
            "/profile/document",
            post(profile::upload_profile_document_handler),
        )
        .route(
            "/pathways",
            get(recommendations::list_pathways_handler),
        )
        .route(
            "/pathways/generate",
            post(recommendations::generate_pathways_handler),
        )
        .route(
            "/recommendations",
            get(recommendations::list_recommendations_handler),
        )
        .route(
            "/recommendations/generate",
            post(recommendations::generate_recommendations_handler),
        )
        .route(
            "/recommendations/{id}/favorite",
            patch(recommendations::set_favorite_handler),
        )
        .route(
            "/applications",
            get(applications::list_applications_handler),
        )
        .route(
            "/applications/plan",
            post(applications::plan_application_handler),
        )
        .route(
            "/applications/{id}",
            get(applications::get_application_handler)
                .patch(applications::update_application_handler)
                .delete(applications::delete_application_handler),
        )
        .route(
            "/applications/{id}/tasks/{task_id}",
            patch(applications::update_task_handler),
        )
        .route(
            "/conversations",
            get(conversations::list_conversations_handler)
                .post(conversations::create_conversation_handler),
        )
        .route(
            "/conversations/{id}",
            delete(conversations::delete_conversation_handler),
        )
        .route(
            "/conversations/{id}/messages",
            get(conversations::list_messages_handler).post(conversations::post_message_handler),
        )
        .route(
            "/conversations/{id}/assistant_turn",
            post(conversations::assistant_turn_handler),
        )
        .route("/turn_response", post(turn_relay::turn_response_handler))
        .route(
            "/vector_stores",
            post(vector_stores::create_vector_store_handler),
        )
        .route(
            "/vector_stores/{id}",
            delete(vector_stores::delete_vector_store_handler),
        )
        .route(
            "/vector_stores/{id}/files",
            post(vector_stores::add_file_handler),
        )
        .route(
            "/vector_stores/{id}/files/{file_id}",
            delete(vector_stores::remove_file_handler),
        )
        .route(
            "/vector_stores/{id}/file_batches",
            post(vector_stores::add_file_batch_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = cors_layer(&state.config.app_base_url);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
