//! Database migration commands.

use tracing::info;

use super::CliError;

/// Run storefront database migrations.
///
/// Migrations are embedded from `crates/storefront/migrations/` at compile
/// time. Already-applied migrations are skipped.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn storefront() -> Result<(), CliError> {
    let pool = super::connect().await?;

    info!("Running storefront migrations");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;
    info!("Storefront migrations complete");

    Ok(())
}
