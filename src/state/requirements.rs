use anyhow::{Context, Result};
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use serde::Serialize;
use std::time::SystemTime;

use crate::models::{Requirement, RequirementPhoto};

use super::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RequirementWithPhotos {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub photos: Vec<RequirementPhoto>,
}

pub async fn list_requirements_for_client(
    state: &AppState,
    client_id: &ObjectId,
) -> Result<Vec<Requirement>> {
    let mut cursor = state
        .requirements
        .find(doc! { "client_id": client_id })
        .sort(doc! { "created_date": 1 })
        .await?;
    let mut items = Vec::new();
    while let Some(requirement) = cursor.try_next().await? {
        items.push(requirement);
    }
    Ok(items)
}

pub async fn list_requirements_with_photos(
    state: &AppState,
    client_id: &ObjectId,
) -> Result<Vec<RequirementWithPhotos>> {
    let requirements = list_requirements_for_client(state, client_id).await?;
    let mut items = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let photos = match requirement.id {
            Some(id) => list_photos_for_requirement(state, &id).await?,
            None => Vec::new(),
        };
        items.push(RequirementWithPhotos {
            requirement,
            photos,
        });
    }
    Ok(items)
}

pub async fn list_all_requirements(state: &AppState) -> Result<Vec<Requirement>> {
    let mut cursor = state.requirements.find(doc! {}).await?;
    let mut items = Vec::new();
    while let Some(requirement) = cursor.try_next().await? {
        items.push(requirement);
    }
    Ok(items)
}

pub async fn get_requirement_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<Requirement>> {
    state
        .requirements
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_requirement(
    state: &AppState,
    client_id: &ObjectId,
    name: &str,
    description: &str,
    is_required: bool,
) -> Result<ObjectId> {
    let res = state
        .requirements
        .insert_one(Requirement {
            id: None,
            client_id: *client_id,
            requirement_name: name.to_string(),
            description: description.to_string(),
            is_required,
            is_completed: false,
            is_present: false,
            created_date: DateTime::from_system_time(SystemTime::now()),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("requirement insert missing _id")
}

/// Text/required edits only; completion is owned by the Customer Care
/// upload path.
pub async fn update_requirement_fields(
    state: &AppState,
    id: &ObjectId,
    name: &str,
    description: &str,
    is_required: bool,
) -> Result<bool> {
    let res = state
        .requirements
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "requirement_name": name,
                "description": description,
                "is_required": is_required,
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

/// Removes the requirement and its photo rows; physical files are the
/// caller's (best-effort) concern.
pub async fn delete_requirement(state: &AppState, id: &ObjectId) -> Result<Vec<RequirementPhoto>> {
    let photos = list_photos_for_requirement(state, id).await?;
    let _ = state
        .requirement_photos
        .delete_many(doc! { "requirement_id": id })
        .await;
    let _ = state.requirements.delete_one(doc! { "_id": id }).await?;
    Ok(photos)
}

pub async fn list_photos_for_requirement(
    state: &AppState,
    requirement_id: &ObjectId,
) -> Result<Vec<RequirementPhoto>> {
    let mut cursor = state
        .requirement_photos
        .find(doc! { "requirement_id": requirement_id })
        .await?;
    let mut items = Vec::new();
    while let Some(photo) = cursor.try_next().await? {
        items.push(photo);
    }
    Ok(items)
}

pub async fn get_photo_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<RequirementPhoto>> {
    state
        .requirement_photos
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn add_photo(
    state: &AppState,
    requirement_id: &ObjectId,
    photo_path: &str,
) -> Result<ObjectId> {
    let res = state
        .requirement_photos
        .insert_one(RequirementPhoto {
            id: None,
            requirement_id: *requirement_id,
            photo_path: photo_path.to_string(),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("photo insert missing _id")
}

/// Removes the row and returns it so the caller can attempt the file delete.
pub async fn delete_photo(
    state: &AppState,
    photo_id: &ObjectId,
) -> Result<Option<RequirementPhoto>> {
    let Some(photo) = get_photo_by_id(state, photo_id).await? else {
        return Ok(None);
    };
    state
        .requirement_photos
        .delete_one(doc! { "_id": photo_id })
        .await?;
    Ok(Some(photo))
}

pub async fn count_photos(state: &AppState, requirement_id: &ObjectId) -> Result<u64> {
    state
        .requirement_photos
        .count_documents(doc! { "requirement_id": requirement_id })
        .await
        .map_err(Into::into)
}

/// Derived completion on the Customer Care path: completed exactly when at
/// least one photo remains. Returns the recomputed value.
pub async fn recompute_completion(state: &AppState, requirement_id: &ObjectId) -> Result<bool> {
    let completed = count_photos(state, requirement_id).await? > 0;
    state
        .requirements
        .update_one(
            doc! { "_id": requirement_id },
            doc! { "$set": { "is_completed": completed } },
        )
        .await?;
    Ok(completed)
}

/// Planning's manual toggle endpoint; independent of the derived path.
pub async fn set_completion(state: &AppState, id: &ObjectId, is_completed: bool) -> Result<bool> {
    let res = state
        .requirements
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "is_completed": is_completed } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

/// Customer Care inspection checklist: present exactly for the submitted ids.
pub async fn set_presence(
    state: &AppState,
    client_id: &ObjectId,
    present_ids: &[ObjectId],
) -> Result<()> {
    let requirements = list_requirements_for_client(state, client_id).await?;
    for requirement in requirements {
        let Some(id) = requirement.id else { continue };
        let is_present = present_ids.contains(&id);
        state
            .requirements
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_present": is_present } },
            )
            .await?;
    }
    Ok(())
}

/// Guard input for the CustomerCare → DocumentOfficer hand-off.
pub async fn count_required_without_photos(
    state: &AppState,
    client_id: &ObjectId,
) -> Result<u64> {
    let requirements = list_requirements_for_client(state, client_id).await?;
    let mut missing = 0;
    for requirement in requirements {
        if !requirement.is_required {
            continue;
        }
        let Some(id) = requirement.id else { continue };
        if count_photos(state, &id).await? == 0 {
            missing += 1;
        }
    }
    Ok(missing)
}
