//! Bazaar CLI - Database migrations, coupon administration and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! bz-cli migrate
//!
//! # Create a 15% coupon capped at 20,000, valid for 100 uses
//! bz-cli coupon create -c SPRING15 -t percentage -v 15 --max-discount 20000 --usage-limit 100
//!
//! # Deactivate a coupon (coupons are never deleted)
//! bz-cli coupon deactivate -c SPRING15
//!
//! # List coupons with usage
//! bz-cli coupon list
//!
//! # Upsert catalog products from a YAML file
//! bz-cli seed products catalog.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use bazaar_core::DiscountType;

mod commands;

#[derive(Parser)]
#[command(name = "bz-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage coupons
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Seed the database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Create a new coupon
    Create {
        /// Coupon code (normalized to upper case)
        #[arg(short, long)]
        code: String,

        /// Discount type (`percentage` or `fixed`)
        #[arg(short = 't', long = "type")]
        discount_type: DiscountType,

        /// Percent off for `percentage`, whole amount off for `fixed`
        #[arg(short, long)]
        value: Decimal,

        /// Minimum cart total required
        #[arg(long)]
        min_purchase: Option<i64>,

        /// Cap on a percentage discount
        #[arg(long)]
        max_discount: Option<i64>,

        /// Total number of redemptions allowed (unlimited if omitted)
        #[arg(long)]
        usage_limit: Option<u32>,

        /// Expiry as an RFC 3339 timestamp, e.g. 2026-12-31T23:59:59Z
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Deactivate a coupon
    Deactivate {
        /// Coupon code
        #[arg(short, long)]
        code: String,
    },
    /// Re-activate a deactivated coupon
    Activate {
        /// Coupon code
        #[arg(short, long)]
        code: String,
    },
    /// List all coupons
    List,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert catalog products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Coupon { action } => match action {
            CouponAction::Create {
                code,
                discount_type,
                value,
                min_purchase,
                max_discount,
                usage_limit,
                expires_at,
            } => {
                let args = commands::coupon::CreateArgs {
                    code,
                    discount_type,
                    value,
                    min_purchase,
                    max_discount,
                    usage_limit,
                    expires_at,
                };
                commands::coupon::create(args).await?;
            }
            CouponAction::Deactivate { code } => commands::coupon::set_active(&code, false).await?,
            CouponAction::Activate { code } => commands::coupon::set_active(&code, true).await?,
            CouponAction::List => commands::coupon::list().await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coupon_create() {
        let cli = Cli::try_parse_from([
            "bz-cli",
            "coupon",
            "create",
            "-c",
            "SPRING15",
            "-t",
            "percentage",
            "-v",
            "15",
            "--usage-limit",
            "100",
            "--expires-at",
            "2026-12-31T23:59:59Z",
        ])
        .unwrap();

        let Commands::Coupon {
            action:
                CouponAction::Create {
                    discount_type,
                    value,
                    usage_limit,
                    expires_at,
                    ..
                },
        } = cli.command
        else {
            panic!("expected coupon create");
        };
        assert_eq!(discount_type, DiscountType::Percentage);
        assert_eq!(value, Decimal::new(15, 0));
        assert_eq!(usage_limit, Some(100));
        assert_eq!(expires_at.unwrap().to_rfc3339(), "2026-12-31T23:59:59+00:00");
    }

    #[test]
    fn test_parse_rejects_unknown_discount_type() {
        let result = Cli::try_parse_from([
            "bz-cli", "coupon", "create", "-c", "X", "-t", "bogo", "-v", "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_seed_products() {
        let cli = Cli::try_parse_from(["bz-cli", "seed", "products", "catalog.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Seed {
                target: SeedTarget::Products { file }
            } if file == "catalog.yaml"
        ));
    }
}
