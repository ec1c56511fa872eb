use anyhow::Result;
use mongodb::{
    Database, IndexModel,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use std::{env, time::SystemTime};
use tracing::info;

use crate::auth::hash_password;
use crate::models::{AppUser, Client, ExpensePayment, UserRole};

const COLLECTIONS: &[&str] = &[
    "users",
    "sessions",
    "clients",
    "permit_requirements",
    "requirement_photos",
    "recurring_expenses",
    "expense_payments",
    "expenses",
];

pub(super) async fn ensure_collections(db: &Database) -> Result<()> {
    let existing = db.list_collection_names().await?;
    for name in COLLECTIONS {
        if !existing.iter().any(|n| n == name) {
            db.create_collection(*name).await?;
        }
    }
    Ok(())
}

/// Uniqueness the application logic leans on: tracking numbers are checked
/// with a read-then-insert loop, so the index is what actually closes the
/// concurrent-create race; payment overrides are at most one per month.
pub(super) async fn ensure_indexes(db: &Database) -> Result<()> {
    let unique = IndexOptions::builder().unique(true).build();

    db.collection::<Client>("clients")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tracking_number": 1 })
                .options(unique.clone())
                .build(),
        )
        .await?;

    db.collection::<AppUser>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
        )
        .await?;

    db.collection::<ExpensePayment>("expense_payments")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "recurring_expense_id": 1, "year": 1, "month": 1 })
                .options(unique)
                .build(),
        )
        .await?;

    Ok(())
}

pub(super) async fn is_database_empty(db: &Database) -> Result<bool> {
    let users = db.collection::<AppUser>("users");
    let count = users.estimated_document_count().await?;
    Ok(count == 0)
}

/// First-run bootstrap account so the admin can approve everyone else.
pub(super) async fn seed_default_admin(db: &Database) -> Result<()> {
    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@casetrack.local".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "ChangeMe#1".to_string());

    let users = db.collection::<AppUser>("users");
    users
        .insert_one(AppUser {
            id: None,
            email: email.clone(),
            password_hash: hash_password(&password)?,
            full_name: "Administrator".to_string(),
            age: None,
            birth_date: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            contact_number: None,
            roles: vec![UserRole::Admin],
            is_approved: true,
            created_at: DateTime::from_system_time(SystemTime::now()),
        })
        .await?;

    info!(email, "seeded default admin account");
    Ok(())
}
