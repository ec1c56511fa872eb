#[path = "common/mod.rs"]
mod common;

use casetrack::auth::verify_password;
use casetrack::models::UserRole;
use casetrack::state::{
    NewUser, create_session, create_user, delete_session, find_user_by_email,
    find_user_by_session, get_user_by_id, list_pending_approvals, list_users_in_role,
    set_user_approval, set_user_password,
};

fn officer(email: &str, role: UserRole) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: "Str0ng!pass".to_string(),
        full_name: "Test Officer".to_string(),
        age: Some(30),
        birth_date: None,
        address: None,
        city: None,
        state: None,
        zip_code: None,
        country: None,
        contact_number: Some("0917 222 3333".to_string()),
        roles: vec![role],
    }
}

#[tokio::test]
async fn accounts_round_trip_with_hashed_passwords() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_user(&state, officer("cc@example.com", UserRole::CustomerCare))
        .await
        .unwrap();
    let user = find_user_by_email(&state, "cc@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, Some(id));
    assert_ne!(user.password_hash, "Str0ng!pass");
    assert!(verify_password(&user.password_hash, "Str0ng!pass"));
    assert!(!verify_password(&user.password_hash, "Wrong!pass1"));

    // Second create with the same email is refused
    assert!(
        create_user(&state, officer("cc@example.com", UserRole::CustomerCare))
            .await
            .is_err()
    );

    let in_role = list_users_in_role(&state, UserRole::CustomerCare).await.unwrap();
    assert!(in_role.iter().any(|u| u.id == Some(id)));
    let in_other = list_users_in_role(&state, UserRole::Finance).await.unwrap();
    assert!(!in_other.iter().any(|u| u.id == Some(id)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn sessions_expire_by_deletion() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    create_user(&state, officer("sess@example.com", UserRole::Finance))
        .await
        .unwrap();
    let token = create_session(&state, "sess@example.com").await.unwrap();
    let user = find_user_by_session(&state, &token).await.unwrap().unwrap();
    assert_eq!(user.email, "sess@example.com");

    delete_session(&state, &token).await.unwrap();
    assert!(find_user_by_session(&state, &token).await.unwrap().is_none());

    // A fresh login invalidates older sessions for the same account
    let first = create_session(&state, "sess@example.com").await.unwrap();
    let second = create_session(&state, "sess@example.com").await.unwrap();
    assert!(find_user_by_session(&state, &first).await.unwrap().is_none());
    assert!(find_user_by_session(&state, &second).await.unwrap().is_some());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn approval_queue_tracks_unapproved_accounts() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_user(&state, officer("new@example.com", UserRole::PlanningOfficer))
        .await
        .unwrap();

    // A password reset demotes the account to pending approval
    set_user_password(&state, &id, "N3w!password").await.unwrap();
    set_user_approval(&state, &id, false).await.unwrap();

    let user = get_user_by_id(&state, &id).await.unwrap().unwrap();
    assert!(!user.is_approved);
    assert!(verify_password(&user.password_hash, "N3w!password"));

    let pending = list_pending_approvals(&state).await.unwrap();
    assert!(pending.iter().any(|u| u.id == Some(id)));

    set_user_approval(&state, &id, true).await.unwrap();
    let pending = list_pending_approvals(&state).await.unwrap();
    assert!(!pending.iter().any(|u| u.id == Some(id)));

    common::teardown(Some(ctx)).await;
}
