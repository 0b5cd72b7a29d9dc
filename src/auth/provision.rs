use anyhow::Context;
use tracing::{info, warn};

use crate::{
    auth::{
        password::hash_password,
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
        services::normalize_email,
    },
    config::AdminConfig,
};

#[derive(Debug)]
pub enum ProvisionOutcome {
    Created(User),
    AlreadyExists,
}

/// Creates the admin account described by `cfg` unless its email is already registered.
/// Safe to run repeatedly.
pub async fn ensure_admin(
    store: &dyn UserStore,
    cfg: &AdminConfig,
) -> anyhow::Result<ProvisionOutcome> {
    let email = normalize_email(&cfg.email);
    anyhow::ensure!(!email.is_empty(), "admin email is required");

    if store.find_by_email(&email).await?.is_some() {
        warn!(%email, "admin user already exists, skipping");
        return Ok(ProvisionOutcome::AlreadyExists);
    }

    let hash = hash_password(&cfg.password).context("hash admin password")?;
    match store
        .insert(NewUser::admin(email.clone(), hash, cfg.full_name.trim().to_string()))
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, %email, "created admin user");
            Ok(ProvisionOutcome::Created(user))
        }
        // Lost a race with a concurrent insert of the same email.
        Err(StoreError::DuplicateEmail) => Ok(ProvisionOutcome::AlreadyExists),
        Err(e) => Err(anyhow::Error::new(e).context("insert admin user")),
    }
}
