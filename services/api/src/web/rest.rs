//! services/api/src/web/rest.rs
//!
//! The health probe and the master definition for the OpenAPI specification.

use axum::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::error::ErrorResponse;
use crate::web::{
    applications, auth, conversations, profile, recommendations, turn_relay, vector_stores,
};
use crate::workflows::applications::PlanOutcome;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::guest_handler,
        auth::convert_guest_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::delete_profile_handler,
        profile::upload_profile_document_handler,
        recommendations::generate_pathways_handler,
        recommendations::list_pathways_handler,
        recommendations::generate_recommendations_handler,
        recommendations::list_recommendations_handler,
        recommendations::set_favorite_handler,
        applications::plan_application_handler,
        applications::list_applications_handler,
        applications::get_application_handler,
        applications::update_application_handler,
        applications::delete_application_handler,
        applications::update_task_handler,
        conversations::list_conversations_handler,
        conversations::create_conversation_handler,
        conversations::delete_conversation_handler,
        conversations::list_messages_handler,
        conversations::post_message_handler,
        conversations::assistant_turn_handler,
        turn_relay::turn_response_handler,
        vector_stores::create_vector_store_handler,
        vector_stores::delete_vector_store_handler,
        vector_stores::add_file_handler,
        vector_stores::remove_file_handler,
        vector_stores::add_file_batch_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            PlanOutcome,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::ConvertGuestRequest,
            auth::AuthResponse,
            auth::ConvertGuestResponse,
            profile::DeleteProfileResponse,
            recommendations::GenerateRecommendationsRequest,
            recommendations::FavoriteRequest,
            applications::PlanApplicationRequest,
            applications::UpdateApplicationRequest,
            applications::UpdateTaskRequest,
            profile::UpdateProfileRequest,
            conversations::CreateConversationRequest,
            conversations::PostMessageRequest,
            turn_relay::TurnResponseRequest,
            vector_stores::CreateVectorStoreRequest,
            vector_stores::AddFileRequest,
            vector_stores::FileBatchRequest,
            vector_stores::IdResponse,
        )
    ),
    tags(
        (name = "Vista Education Adviser API", description = "Profiles, recommendations, applications and the streaming adviser chat.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
