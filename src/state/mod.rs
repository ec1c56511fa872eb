// state module: AppState, initialization, and re-exports of submodules.

use anyhow::Result;
use mongodb::{Client as MongoClient, Collection};
use std::env;

use crate::auth::{OtpStore, RateLimits};
use crate::models::{
    AppUser, Client, Expense, ExpensePayment, RecurringExpense, Requirement, RequirementPhoto,
    Session,
};
use crate::notify::Hub;

mod clients;
mod expenses;
mod requirements;
mod seed;
mod users;

pub use clients::*;
pub use expenses::*;
pub use requirements::*;
pub use users::*;

pub const SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day

#[derive(Clone)]
pub struct AppState {
    pub users: Collection<AppUser>,
    pub sessions: Collection<Session>,
    pub clients: Collection<Client>,
    pub requirements: Collection<Requirement>,
    pub requirement_photos: Collection<RequirementPhoto>,
    pub recurring_expenses: Collection<RecurringExpense>,
    pub expense_payments: Collection<ExpensePayment>,
    pub expenses: Collection<Expense>,
    pub events: Hub,
    pub limits: RateLimits,
    pub otps: OtpStore,
}

pub async fn init_state() -> Result<AppState> {
    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = env::var("MONGODB_DB").unwrap_or_else(|_| "casetrack".to_string());

    let client = MongoClient::with_uri_str(uri).await?;
    let db = client.database(&db_name);

    seed::ensure_collections(&db).await?;
    seed::ensure_indexes(&db).await?;

    // Only seed when the database is effectively empty (no users).
    if seed::is_database_empty(&db).await? {
        seed::seed_default_admin(&db).await?;
    }

    Ok(AppState {
        users: db.collection::<AppUser>("users"),
        sessions: db.collection::<Session>("sessions"),
        clients: db.collection::<Client>("clients"),
        requirements: db.collection::<Requirement>("permit_requirements"),
        requirement_photos: db.collection::<RequirementPhoto>("requirement_photos"),
        recurring_expenses: db.collection::<RecurringExpense>("recurring_expenses"),
        expense_payments: db.collection::<ExpensePayment>("expense_payments"),
        expenses: db.collection::<Expense>("expenses"),
        events: Hub::new(),
        limits: RateLimits::default(),
        otps: OtpStore::default(),
    })
}
