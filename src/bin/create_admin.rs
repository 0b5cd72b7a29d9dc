//! Creates the initial admin account from `ADMIN_EMAIL`, `ADMIN_PASSWORD` and `ADMIN_NAME`.
//! Does nothing if the email is already registered.

use accountd::{
    auth::{
        provision::{ensure_admin, ProvisionOutcome},
        repo::PgUserStore,
    },
    config::AdminConfig,
    db, init_tracing,
};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = db::connect(&database_url).await?;
    db::migrate(&pool).await?;

    let store = PgUserStore::new(pool);
    match ensure_admin(&store, &AdminConfig::from_env()).await? {
        ProvisionOutcome::Created(user) => println!("Created admin user: {}", user.email),
        ProvisionOutcome::AlreadyExists => println!("Admin user already exists. Skipping."),
    }
    Ok(())
}
