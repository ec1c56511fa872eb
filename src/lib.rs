pub mod auth;
pub mod backup;
pub mod export;
pub mod mailer;
pub mod models;
pub mod notify;
pub mod paginate;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod workflow;
