//! services/api/src/workflows/accounts.rs
//!
//! Multi-step account operations. Each one has a required first step whose
//! failure is an error, followed by secondary steps whose failures are
//! collected as warnings.

use crate::web::state::AppState;
use tracing::{info, warn};
use uuid::Uuid;
use vista_core::domain::{Profile, ProfileUpdate, User};
use vista_core::ports::{PortError, PortResult};

/// The outcome of a guest conversion.
#[derive(Debug)]
pub struct ConversionReport {
    pub user: User,
    pub warnings: Vec<String>,
}

/// Creates the profile row and, best-effort, the user's vector store.
pub async fn provision_account(state: &AppState, user: &User) -> PortResult<Profile> {
    let mut profile = state
        .db
        .create_profile(user.user_id, user.email.as_deref())
        .await?;

    match create_vector_store(state, user.user_id).await {
        Ok(id) => profile.vector_store_id = Some(id),
        Err(e) => warn!("No vector store for user {}: {}", user.user_id, e),
    }
    Ok(profile)
}

async fn create_vector_store(state: &AppState, user_id: Uuid) -> PortResult<String> {
    let id = state
        .vector_stores
        .create_store(&format!("vista-{}", user_id))
        .await?;
    state.db.set_profile_vector_store(user_id, Some(&id)).await?;
    Ok(id)
}

/// Turns a guest into a registered user.
pub async fn convert_guest(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    hashed_password: &str,
    profile: Option<ProfileUpdate>,
) -> PortResult<ConversionReport> {
    let current = state.db.get_user(user_id).await?;
    if !current.is_guest {
        return Err(PortError::InvalidInput(
            "Only guest accounts can be converted".to_string(),
        ));
    }

    let user = state
        .db
        .attach_credentials(user_id, email, hashed_password)
        .await?;
    info!("Converted guest {} to a registered account", user_id);

    let mut warnings = Vec::new();

    let mut update = profile.unwrap_or_default().normalized();
    update.email.get_or_insert_with(|| email.to_string());
    let stored = match state.db.update_profile(user_id, &update).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!("Profile update failed during conversion of {}: {}", user_id, e);
            warnings.push(format!("Profile could not be updated: {}", e));
            None
        }
    };

    let existing_store = match stored {
        Some(profile) => Ok(profile.vector_store_id),
        None => state
            .db
            .get_profile(user_id)
            .await
            .map(|profile| profile.vector_store_id),
    };
    match existing_store {
        Ok(Some(_)) => {}
        Ok(None) => {
            if let Err(e) = create_vector_store(state, user_id).await {
                warn!("Vector store creation failed during conversion of {}: {}", user_id, e);
                warnings.push(format!("Search index could not be created: {}", e));
            }
        }
        Err(e) => {
            warn!("Could not read the profile of {} after conversion: {}", user_id, e);
            warnings.push(format!("Search index could not be checked: {}", e));
        }
    }

    Ok(ConversionReport { user, warnings })
}

/// Deletes the user and everything they own. The hosted vector store goes
/// first and its failure is returned as a warning.
pub async fn delete_account(state: &AppState, user_id: Uuid) -> PortResult<Vec<String>> {
    let mut warnings = Vec::new();

    match state.db.get_profile(user_id).await {
        Ok(Profile {
            vector_store_id: Some(store_id),
            ..
        }) => {
            if let Err(e) = state.vector_stores.delete_store(&store_id).await {
                warn!("Could not delete vector store {}: {}", store_id, e);
                warnings.push(format!("Search index {} could not be deleted: {}", store_id, e));
            }
        }
        Ok(_) | Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    state.db.delete_user(user_id).await?;
    info!("Deleted account {}", user_id);
    Ok(warnings)
}

/// Uploads a profile document, attaches it to the user's vector store and
/// records it on the profile. The previous document is detached best-effort.
pub async fn replace_profile_document(
    state: &AppState,
    user_id: Uuid,
    file_name: &str,
    contents: Vec<u8>,
) -> PortResult<Profile> {
    let profile = state.db.get_profile(user_id).await?;
    let vector_store_id = match &profile.vector_store_id {
        Some(id) => id.clone(),
        None => create_vector_store(state, user_id).await?,
    };

    let file_id = state.vector_stores.upload_file(file_name, contents).await?;
    state
        .vector_stores
        .add_file(&vector_store_id, &file_id)
        .await?;

    if let Some(previous) = &profile.profile_file_id {
        if let Err(e) = state
            .vector_stores
            .remove_file(&vector_store_id, previous)
            .await
        {
            warn!("Could not detach previous profile file {}: {}", previous, e);
        }
    }

    state.db.set_profile_file(user_id, Some(&file_id)).await?;
    state.db.get_profile(user_id).await
}
