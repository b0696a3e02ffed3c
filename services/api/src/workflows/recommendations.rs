//! services/api/src/workflows/recommendations.rs
//!
//! Pathway and program generation, and the sync of program summaries into the
//! user's vector store so that file search can find them later.

use crate::web::state::AppState;
use tracing::{info, warn};
use uuid::Uuid;
use vista_core::domain::{Pathway, Profile, Recommendation};
use vista_core::ports::PortResult;

/// Recommendations plus the reason the vector store sync failed, if it did.
#[derive(Debug)]
pub struct RecommendationBatch {
    pub recommendations: Vec<Recommendation>,
    pub sync_warning: Option<String>,
}

pub async fn generate_pathways(state: &AppState, user_id: Uuid) -> PortResult<Vec<Pathway>> {
    let profile = state.db.get_profile(user_id).await?;
    let suggested = state
        .pathway_llm
        .generate_pathways(&profile.summary())
        .await?;
    let pathways = state.db.insert_pathways(user_id, &suggested).await?;
    info!("Stored {} pathways for user {}", pathways.len(), user_id);
    Ok(pathways)
}

/// Generates programs for one of the user's pathways and stores them as
/// recommendations. The vector store sync is a secondary step: its failure
/// is reported in the batch, not raised.
pub async fn generate_recommendations(
    state: &AppState,
    user_id: Uuid,
    pathway_id: Uuid,
) -> PortResult<RecommendationBatch> {
    let pathway = state.db.get_pathway(user_id, pathway_id).await?;
    let profile = state.db.get_profile(user_id).await?;

    let programs = state
        .program_llm
        .generate_programs(&profile.summary(), &pathway)
        .await?;
    if programs.is_empty() {
        return Ok(RecommendationBatch {
            recommendations: Vec::new(),
            sync_warning: None,
        });
    }

    let recommendations = state
        .db
        .upsert_recommendations(user_id, Some(pathway.id), &programs)
        .await?;
    info!(
        "Stored {} recommendations for user {} (pathway {})",
        recommendations.len(),
        user_id,
        pathway.id
    );

    let sync_warning = match sync_to_vector_store(state, &profile, &recommendations).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Vector store sync failed for user {}: {}", user_id, e);
            Some(format!("Recommendations saved but search indexing failed: {}", e))
        }
    };

    Ok(RecommendationBatch {
        recommendations,
        sync_warning,
    })
}

async fn sync_to_vector_store(
    state: &AppState,
    profile: &Profile,
    recommendations: &[Recommendation],
) -> PortResult<()> {
    let vector_store_id = match &profile.vector_store_id {
        Some(id) => id.clone(),
        None => {
            let id = state
                .vector_stores
                .create_store(&format!("vista-{}", profile.user_id))
                .await?;
            state
                .db
                .set_profile_vector_store(profile.user_id, Some(&id))
                .await?;
            id
        }
    };

    let mut file_ids = Vec::with_capacity(recommendations.len());
    for recommendation in recommendations {
        let file_id = state
            .vector_stores
            .upload_file(
                &format!("program-{}.md", recommendation.program.id),
                recommendation.program.search_document().into_bytes(),
            )
            .await?;
        file_ids.push(file_id);
    }

    state
        .vector_stores
        .add_files_batch(&vector_store_id, &file_ids)
        .await?;
    Ok(())
}
