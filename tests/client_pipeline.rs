#[path = "common/mod.rs"]
mod common;

use casetrack::models::{PROJECT_RETAINERSHIP_BIR, UserRole};
use casetrack::state::{
    BirDetailsInput, ClientInput, ClientQuery, TransitionOutcome, active_clients,
    add_photo, apply_transition, archived_clients, ArchiveQuery, clients_in_statuses,
    create_client, create_requirement, get_client_by_id, is_valid_tracking_number,
    recompute_completion, validate_client,
};
use casetrack::workflow::{SUB_FOR_REVIEW, SUB_NEW, Status, WorkflowAction};

fn bir_input(name: &str) -> ClientInput {
    ClientInput {
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        client_name: name.to_string(),
        contact_person_number: "0917 000 0000".to_string(),
        registered_company_address: "123 Main St, Makati".to_string(),
        type_of_project: PROJECT_RETAINERSHIP_BIR.to_string(),
        retainership_bir: Some(BirDetailsInput {
            bir_rdo_no: Some("RDO-39".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn client_creation_assigns_unique_tracking_numbers() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let mut tracking_numbers = Vec::new();
    for i in 0..5 {
        let input = bir_input(&format!("Client {i}"));
        assert!(validate_client(&input).is_empty());
        let id = create_client(&state, &input).await.unwrap();
        let client = get_client_by_id(&state, &id).await.unwrap().unwrap();
        assert!(
            is_valid_tracking_number(&client.tracking_number),
            "bad tracking number {}",
            client.tracking_number
        );
        assert_eq!(client.status, Status::Pending);
        assert!(client.retainership_bir.is_some());
        assert!(client.retainership_spp.is_none());
        assert!(client.one_time_transaction.is_none());
        assert!(client.external_audit.is_none());
        tracking_numbers.push(client.tracking_number);
    }
    let mut deduped = tracking_numbers.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), tracking_numbers.len());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn pipeline_hand_offs_follow_the_table() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_client(&state, &bir_input("Pipeline Co")).await.unwrap();

    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::SendToPlanning,
        &[UserRole::Finance],
        None,
        None,
    )
    .await
    .unwrap();
    let client = match outcome {
        TransitionOutcome::Applied(client) => client,
        _ => panic!("expected applied"),
    };
    assert_eq!(client.status, Status::Planning);

    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToLiaison,
        &[UserRole::PlanningOfficer],
        None,
        None,
    )
    .await
    .unwrap();
    let client = match outcome {
        TransitionOutcome::Applied(client) => client,
        _ => panic!("expected applied"),
    };
    assert_eq!(client.status, Status::CustomerCare);
    assert_eq!(client.sub_status.as_deref(), Some(SUB_NEW));

    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ReturnToPlanning,
        &[UserRole::CustomerCare],
        None,
        None,
    )
    .await
    .unwrap();
    let client = match outcome {
        TransitionOutcome::Applied(client) => client,
        _ => panic!("expected applied"),
    };
    assert_eq!(client.status, Status::Planning);
    assert_eq!(client.sub_status.as_deref(), Some(SUB_FOR_REVIEW));

    // Not a valid predecessor state for the documentation hand-off
    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToDocumentOfficer,
        &[UserRole::CustomerCare],
        None,
        None,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected(_)));
    let client = get_client_by_id(&state, &id).await.unwrap().unwrap();
    assert_eq!(client.status, Status::Planning);

    // Role outside the allow-list is rejected with no mutation
    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToLiaison,
        &[UserRole::DocumentOfficer],
        None,
        None,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected(_)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn document_officer_hand_off_requires_proof_files() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_client(&state, &bir_input("Proof Co")).await.unwrap();
    for (action, role) in [
        (WorkflowAction::SendToPlanning, UserRole::Finance),
        (WorkflowAction::ProceedToLiaison, UserRole::PlanningOfficer),
    ] {
        let outcome = apply_transition(&state, &id, action, &[role], None, None)
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied(_)));
    }

    let requirement_id = create_requirement(&state, &id, "Mayor's Permit", "Current year", true)
        .await
        .unwrap();

    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToDocumentOfficer,
        &[UserRole::CustomerCare],
        None,
        None,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected(_)));
    let client = get_client_by_id(&state, &id).await.unwrap().unwrap();
    assert_eq!(client.status, Status::CustomerCare, "guard must not mutate");

    add_photo(&state, &requirement_id, "/uploads/proof-photos/permit.jpg")
        .await
        .unwrap();
    recompute_completion(&state, &requirement_id).await.unwrap();

    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::ProceedToDocumentOfficer,
        &[UserRole::CustomerCare],
        None,
        None,
    )
    .await
    .unwrap();
    let client = match outcome {
        TransitionOutcome::Applied(client) => client,
        _ => panic!("expected applied"),
    };
    assert_eq!(client.status, Status::DocumentOfficer);
    assert_eq!(client.sub_status.as_deref(), Some(SUB_NEW));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn dashboards_filter_by_status_sets_and_search() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let pending_id = create_client(&state, &bir_input("Alpha Trading")).await.unwrap();
    let planning_id = create_client(&state, &bir_input("Beta Logistics")).await.unwrap();
    apply_transition(
        &state,
        &planning_id,
        WorkflowAction::SendToPlanning,
        &[UserRole::Finance],
        None,
        None,
    )
    .await
    .unwrap();

    let query = ClientQuery::default();
    let finance_pending = clients_in_statuses(
        &state,
        &[Status::Pending, Status::Finance],
        &query,
        5,
        false,
        None,
    )
    .await
    .unwrap();
    assert!(finance_pending.items.iter().any(|c| c.id == Some(pending_id)));
    assert!(!finance_pending.items.iter().any(|c| c.id == Some(planning_id)));

    let planning_queue =
        clients_in_statuses(&state, &[Status::Planning], &query, 10, true, None)
            .await
            .unwrap();
    assert!(planning_queue.items.iter().any(|c| c.id == Some(planning_id)));

    let search = ClientQuery {
        search: Some("beta".to_string()),
        ..Default::default()
    };
    let hits = clients_in_statuses(&state, &[Status::Planning], &search, 10, true, None)
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 1);
    assert_eq!(hits.items[0].client_name, "Beta Logistics");

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn archive_is_soft_terminal() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_client(&state, &bir_input("Gamma Holdings")).await.unwrap();
    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::Archive,
        &[UserRole::Finance],
        None,
        None,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Applied(_)));

    // Still readable from the archive listing
    let archived = archived_clients(&state, &ArchiveQuery::default()).await.unwrap();
    assert!(archived.items.iter().any(|c| c.id == Some(id)));

    // Excluded from the active directory
    let active = active_clients(&state, None).await.unwrap();
    assert!(!active.iter().any(|c| c.id == Some(id)));

    // No action leads out of Archived
    let outcome = apply_transition(
        &state,
        &id,
        WorkflowAction::SendToPlanning,
        &[UserRole::Finance],
        None,
        None,
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TransitionOutcome::Rejected(_)));

    common::teardown(Some(ctx)).await;
}
