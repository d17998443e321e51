//! CLI command implementations.

pub mod coupon;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use bazaar_core::{AmountError, CouponCodeError, CouponRuleError};
use bazaar_storefront::db::{self, RepositoryError};

/// Errors that can occur while running a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0} not set")]
    MissingEnvVar(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid coupon code: {0}")]
    InvalidCode(#[from] CouponCodeError),

    #[error("invalid coupon: {0}")]
    InvalidCoupon(#[from] CouponRuleError),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("coupon not found: {0}")]
    CouponNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid seed file: {0}")]
    InvalidSeed(String),
}

/// Read the storefront database URL from the environment.
///
/// `STOREFRONT_DATABASE_URL` wins over `DATABASE_URL`. A `.env` file in the
/// working directory is loaded first.
pub fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
pub async fn connect() -> Result<PgPool, CliError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    tracing::info!("Connected to database");
    Ok(pool)
}
