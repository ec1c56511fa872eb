use anyhow::{Context, Result, bail};
use data_encoding::BASE32_NOPAD;
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rand::RngCore;
use std::time::{Duration, SystemTime};

use crate::auth::hash_password;
use crate::models::{AppUser, Session, UserRole};

use super::{AppState, SESSION_TTL_SECONDS};

/// Intake payload for the admin add-user form.
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub age: Option<i32>,
    pub birth_date: Option<DateTime>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    pub roles: Vec<UserRole>,
}

/// Profile + role edits; the role list replaces the existing one.
pub struct UserUpdate {
    pub full_name: String,
    pub age: Option<i32>,
    pub birth_date: Option<DateTime>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    pub roles: Vec<UserRole>,
}

pub async fn find_user_by_email(state: &AppState, email: &str) -> Result<Option<AppUser>> {
    state
        .users
        .find_one(doc! { "email": email })
        .await
        .map_err(Into::into)
}

pub async fn get_user_by_id(state: &AppState, id: &ObjectId) -> Result<Option<AppUser>> {
    state
        .users
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn list_users(state: &AppState) -> Result<Vec<AppUser>> {
    let mut cursor = state.users.find(doc! {}).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(user);
    }
    Ok(users)
}

pub async fn list_users_in_role(state: &AppState, role: UserRole) -> Result<Vec<AppUser>> {
    let mut cursor = state.users.find(doc! { "roles": role.as_str() }).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(user);
    }
    Ok(users)
}

pub async fn list_pending_approvals(state: &AppState) -> Result<Vec<AppUser>> {
    let mut cursor = state.users.find(doc! { "is_approved": false }).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.try_next().await? {
        users.push(user);
    }
    Ok(users)
}

pub async fn create_user(state: &AppState, new: NewUser) -> Result<ObjectId> {
    if find_user_by_email(state, &new.email).await?.is_some() {
        bail!("user with this email already exists");
    }

    let res = state
        .users
        .insert_one(AppUser {
            id: None,
            email: new.email,
            password_hash: hash_password(&new.password)?,
            full_name: new.full_name,
            age: new.age,
            birth_date: new.birth_date,
            address: new.address,
            city: new.city,
            state: new.state,
            zip_code: new.zip_code,
            country: new.country,
            contact_number: new.contact_number,
            roles: new.roles,
            is_approved: true,
            created_at: DateTime::from_system_time(SystemTime::now()),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("user insert missing _id")
}

pub async fn update_user(state: &AppState, id: &ObjectId, update: UserUpdate) -> Result<()> {
    let roles: Vec<&str> = update.roles.iter().map(|r| r.as_str()).collect();
    state
        .users
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "full_name": update.full_name,
                "age": update.age,
                "birth_date": update.birth_date,
                "address": update.address,
                "city": update.city,
                "state": update.state,
                "zip_code": update.zip_code,
                "country": update.country,
                "contact_number": update.contact_number,
                "roles": roles,
            } },
        )
        .await?;
    Ok(())
}

pub async fn delete_user(state: &AppState, id: &ObjectId) -> Result<()> {
    if let Some(user) = get_user_by_id(state, id).await? {
        let _ = state
            .sessions
            .delete_many(doc! { "user_email": &user.email })
            .await;
    }
    state.users.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

pub async fn set_user_approval(state: &AppState, id: &ObjectId, approved: bool) -> Result<()> {
    state
        .users
        .update_one(doc! { "_id": id }, doc! { "$set": { "is_approved": approved } })
        .await?;
    Ok(())
}

pub async fn set_user_password(state: &AppState, id: &ObjectId, password: &str) -> Result<()> {
    let hash = hash_password(password)?;
    state
        .users
        .update_one(doc! { "_id": id }, doc! { "$set": { "password_hash": hash } })
        .await?;
    Ok(())
}

pub async fn create_session(state: &AppState, email: &str) -> Result<String> {
    let _ = state
        .sessions
        .delete_many(doc! { "user_email": email.to_string() })
        .await;

    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = BASE32_NOPAD.encode(&token_bytes);

    let expires_at =
        DateTime::from_system_time(SystemTime::now() + Duration::from_secs(SESSION_TTL_SECONDS));

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            user_email: email.to_string(),
            expires_at,
        })
        .await?;

    Ok(token)
}

pub async fn find_user_by_session(state: &AppState, token: &str) -> Result<Option<AppUser>> {
    if let Some(session) = state.sessions.find_one(doc! { "token": token }).await? {
        let expires_at = session.expires_at.to_system_time();
        if expires_at <= SystemTime::now() {
            // Remove expired session, ignore result
            let _ = state.sessions.delete_one(doc! { "token": token }).await;
            return Ok(None);
        }
        find_user_by_email(state, &session.user_email).await
    } else {
        Ok(None)
    }
}

pub async fn delete_session(state: &AppState, token: &str) -> Result<()> {
    let _ = state.sessions.delete_one(doc! { "token": token }).await?;
    Ok(())
}
