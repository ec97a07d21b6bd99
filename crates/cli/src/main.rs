//! Palengke CLI - drive the storefront core against a live backend.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! palengke cart show
//!
//! # Add two units of product 7
//! palengke cart add 7 --quantity 2
//!
//! # Walk the location cascade
//! palengke locations cities 1
//!
//! # Run a checkout with cash on delivery
//! palengke checkout --address 3 --method delivery --payment cod
//!
//! # Confirm an online payment after the redirect
//! palengke confirm --order 42 --transaction tx-1
//! ```
//!
//! # Commands
//!
//! - `cart` - Show and modify the cart
//! - `locations` - List provinces, cities, barangays
//! - `stores` - List pickup stores
//! - `addresses` - List saved addresses
//! - `checkout` - Set address and shipping, then place the order
//! - `confirm` - Confirm an online payment
//!
//! Configuration comes from the environment (see `palengke_storefront::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use palengke_core::{
    AddressId, CityId, DeliveryMethod, OrderId, PaymentMethod, ProductId, ProvinceId, StoreId,
};
use palengke_storefront::Storefront;
use palengke_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "palengke")]
#[command(author, version, about = "Palengke storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and modify the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// List location options
    Locations {
        #[command(subcommand)]
        level: LocationLevel,
    },
    /// List pickup stores
    Stores {
        /// Filter by store name
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Manage saved addresses
    Addresses {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Set address and shipping, then place the order
    Checkout {
        /// Saved address ID
        #[arg(short, long)]
        address: AddressId,

        /// Delivery method (`delivery`, `pickup`)
        #[arg(short, long)]
        method: DeliveryMethod,

        /// Pickup store ID (pickup only)
        #[arg(short, long)]
        store: Option<StoreId>,

        /// Payment method (`cod`, `online`)
        #[arg(short, long, default_value = "cod")]
        payment: PaymentMethod,
    },
    /// Confirm an online payment
    Confirm {
        /// Order ID from the redirect
        #[arg(short, long)]
        order: OrderId,

        /// Transaction ID from the redirect
        #[arg(short, long)]
        transaction: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add a product
    Add {
        product: ProductId,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a product's quantity
    Set { product: ProductId, quantity: u32 },
    /// Remove a product
    Remove { product: ProductId },
    /// Remove everything
    Clear,
}

#[derive(Subcommand)]
enum LocationLevel {
    /// List provinces
    Provinces,
    /// List cities of a province
    Cities { province: ProvinceId },
    /// List barangays of a city
    Barangays { city: CityId },
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses
    List,
    /// Mark an address as default
    Default { address: AddressId },
    /// Delete an address
    Delete { address: AddressId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "palengke_storefront=info,palengke=info".into());

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(?config, "Loaded configuration");
    let storefront = Storefront::connect(config)?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&storefront, product, quantity).await?;
            }
            CartAction::Set { product, quantity } => {
                commands::cart::set(&storefront, product, quantity).await?;
            }
            CartAction::Remove { product } => commands::cart::remove(&storefront, product).await?,
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Locations { level } => match level {
            LocationLevel::Provinces => commands::locations::provinces(&storefront).await?,
            LocationLevel::Cities { province } => {
                commands::locations::cities(&storefront, province).await?;
            }
            LocationLevel::Barangays { city } => {
                commands::locations::barangays(&storefront, city).await?;
            }
        },
        Commands::Stores { search } => {
            commands::checkout::stores(&storefront, search.as_deref()).await?;
        }
        Commands::Addresses { action } => match action {
            AddressAction::List => commands::addresses::list(&storefront).await?,
            AddressAction::Default { address } => {
                commands::addresses::set_default(&storefront, address).await?;
            }
            AddressAction::Delete { address } => {
                commands::addresses::delete(&storefront, address).await?;
            }
        },
        Commands::Checkout {
            address,
            method,
            store,
            payment,
        } => {
            commands::checkout::run(&storefront, address, method, store, payment).await?;
        }
        Commands::Confirm { order, transaction } => {
            commands::checkout::confirm(&storefront, order, &transaction).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_checkout() {
        let cli = Cli::try_parse_from([
            "palengke", "checkout", "--address", "3", "--method", "pickup", "--store", "1",
            "--payment", "online",
        ])
        .unwrap();

        match cli.command {
            Commands::Checkout {
                address,
                method,
                store,
                payment,
            } => {
                assert_eq!(address, AddressId::new(3));
                assert_eq!(method, DeliveryMethod::Pickup);
                assert_eq!(store, Some(StoreId::new(1)));
                assert_eq!(payment, PaymentMethod::Online);
            }
            _ => panic!("expected checkout command"),
        }
    }

    #[test]
    fn test_parse_cart_add_defaults_quantity() {
        let cli = Cli::try_parse_from(["palengke", "cart", "add", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cart {
                action: CartAction::Add { quantity: 1, .. }
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_method() {
        let result = Cli::try_parse_from([
            "palengke", "checkout", "--address", "3", "--method", "drone",
        ]);
        assert!(result.is_err());
    }
}
