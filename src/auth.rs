//! Email + password accounts backed by the `profiles` table.
//!
//! Passwords are stored as Argon2id PHC strings. Hashing runs on the blocking
//! pool so a sign-in never stalls the request loop.

use crate::config::normalize_email;
use crate::errors::AppError;
use crate::models::{Profile, Role, UserRole};
use crate::state::AppState;
use crate::storage::{Filter, Order, Store, StoreError};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::write(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::write(format!("invalid password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Server-side role predicate: does `user_id` hold `role`?
pub async fn has_role(store: &Store, user_id: Uuid, role: Role) -> bool {
    store
        .list::<UserRole>(&Filter::owned_by(user_id), Order::Inserted)
        .await
        .iter()
        .any(|r| r.role == role)
}

pub async fn find_profile_by_email(store: &Store, email: &str) -> Option<Profile> {
    let email = normalize_email(email);
    store
        .list::<Profile>(&Filter::all(), Order::Inserted)
        .await
        .into_iter()
        .find(|p| p.email == email)
}

pub async fn find_profile(store: &Store, user_id: Uuid) -> Option<Profile> {
    store
        .list::<Profile>(&Filter::owned_by(user_id), Order::Inserted)
        .await
        .into_iter()
        .next()
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("Please enter a valid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn sign_up(state: &AppState, form: SignUp) -> Result<Profile, AppError> {
    let email = normalize_email(&form.email);
    validate_credentials(&email, &form.password)?;

    if find_profile_by_email(&state.store, &email).await.is_some() {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    let password = form.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(AppError::internal)??;

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let profile = Profile {
        id: Uuid::new_v4(),
        user_id,
        email: email.clone(),
        full_name: form
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        password_hash,
        created_at: now,
    };
    let bootstrap_admin = state.config.is_bootstrap_admin(&email);
    let profile = state
        .store
        .transaction(move |batch| {
            let profile = batch.insert(profile)?;
            let mut roles = vec![Role::User];
            if bootstrap_admin {
                roles.push(Role::Admin);
            }
            for role in roles {
                batch.insert(UserRole {
                    id: Uuid::new_v4(),
                    user_id,
                    role,
                    created_at: now,
                })?;
            }
            Ok(profile)
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict { .. } => {
                AppError::conflict("An account with this email already exists")
            }
            err => err.into(),
        })?;
    if bootstrap_admin {
        info!(user_id = %user_id, "granted admin role to bootstrap account");
    }

    info!(user_id = %user_id, "account created");
    Ok(profile)
}

pub async fn sign_in(state: &AppState, form: SignIn) -> Result<Profile, AppError> {
    let invalid = || AppError::unauthorized("Invalid email or password");

    let Some(profile) = find_profile_by_email(&state.store, &form.email).await else {
        warn!("sign-in for unknown email");
        return Err(invalid());
    };

    let password = form.password;
    let hash = profile.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(AppError::internal)??;

    if !valid {
        warn!(user_id = %profile.user_id, "sign-in with wrong password");
        return Err(invalid());
    }

    info!(user_id = %profile.user_id, "signed in");
    Ok(profile)
}
