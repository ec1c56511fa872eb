#[path = "common/mod.rs"]
mod common;

use casetrack::state::{
    BirDetailsInput, ClientInput, add_photo, count_photos, create_client, create_requirement,
    delete_photo, get_requirement_by_id, list_requirements_with_photos, recompute_completion,
    set_presence,
};

fn client_input() -> ClientInput {
    ClientInput {
        email: "req@example.com".to_string(),
        client_name: "Requirements Co".to_string(),
        contact_person_number: "0917 111 2222".to_string(),
        registered_company_address: "456 Side St".to_string(),
        type_of_project: "Retainership - BIR".to_string(),
        retainership_bir: Some(BirDetailsInput {
            bir_rdo_no: Some("RDO-44".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn completion_tracks_photo_presence() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let client_id = create_client(&state, &client_input()).await.unwrap();
    let requirement_id = create_requirement(&state, &client_id, "DTI Certificate", "Scan", true)
        .await
        .unwrap();

    let requirement = get_requirement_by_id(&state, &requirement_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!requirement.is_completed);

    // First upload completes the requirement
    let photo_a = add_photo(&state, &requirement_id, "/uploads/proof-photos/a.jpg")
        .await
        .unwrap();
    assert!(recompute_completion(&state, &requirement_id).await.unwrap());

    // A second photo keeps it completed
    let photo_b = add_photo(&state, &requirement_id, "/uploads/proof-photos/b.jpg")
        .await
        .unwrap();
    assert!(recompute_completion(&state, &requirement_id).await.unwrap());
    assert_eq!(count_photos(&state, &requirement_id).await.unwrap(), 2);

    // Deleting one of two leaves it completed
    delete_photo(&state, &photo_a).await.unwrap();
    assert!(recompute_completion(&state, &requirement_id).await.unwrap());

    // Deleting the last photo reverts completion
    delete_photo(&state, &photo_b).await.unwrap();
    assert!(!recompute_completion(&state, &requirement_id).await.unwrap());
    let requirement = get_requirement_by_id(&state, &requirement_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!requirement.is_completed);

    // Deleting an already-gone photo is a no-op
    assert!(delete_photo(&state, &photo_a).await.unwrap().is_none());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn inspection_flags_are_independent_of_required_flags() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let client_id = create_client(&state, &client_input()).await.unwrap();
    let first = create_requirement(&state, &client_id, "SEC Registration", "Copy", true)
        .await
        .unwrap();
    let second = create_requirement(&state, &client_id, "Lease Contract", "Copy", false)
        .await
        .unwrap();

    set_presence(&state, &client_id, &[second]).await.unwrap();

    let requirements = list_requirements_with_photos(&state, &client_id)
        .await
        .unwrap();
    let by_id = |id| {
        requirements
            .iter()
            .find(|r| r.requirement.id == Some(id))
            .unwrap()
    };
    assert!(!by_id(first).requirement.is_present);
    assert!(by_id(first).requirement.is_required);
    assert!(by_id(second).requirement.is_present);
    assert!(!by_id(second).requirement.is_required);

    // Re-submitting without the second clears it again
    set_presence(&state, &client_id, &[]).await.unwrap();
    let requirements = list_requirements_with_photos(&state, &client_id)
        .await
        .unwrap();
    assert!(requirements.iter().all(|r| !r.requirement.is_present));

    common::teardown(Some(ctx)).await;
}
