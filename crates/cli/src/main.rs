//! Basket CLI - migrations, catalog browsing, and cart management.
//!
//! # Usage
//!
//! ```bash
//! # Create the cart schema (CART_REMOTE=postgres)
//! basket-cli migrate
//!
//! # Browse the catalog
//! basket-cli catalog list --category Dairy --sort price-asc
//! basket-cli catalog list --search cheese --promo-only
//! basket-cli catalog categories
//!
//! # Inspect and change a user's persisted cart
//! basket-cli cart show --user 6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11
//! basket-cli cart add --user 6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11 --item 1 --qty 3
//! basket-cli cart set --user 6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11 --item 1 --qty 2
//! basket-cli cart remove --user 6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11 --item 1
//! basket-cli cart clear --user 6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run cart database migrations
//! - `catalog` - List and filter catalog items
//! - `cart` - Drive a user's cart through the cart store

#![cfg_attr(not(test), forbid(unsafe_code))]

use basket_cart::CartConfig;
use basket_core::{ItemId, UserId};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "basket-cli")]
#[command(author, version, about = "Basket CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cart database migrations
    Migrate,
    /// Browse the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Inspect or change a user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List items, optionally filtered and sorted
    List {
        /// Case-insensitive name search
        #[arg(short, long)]
        search: Option<String>,

        /// Exact category name
        #[arg(short, long)]
        category: Option<String>,

        /// Minimum unit price (inclusive)
        #[arg(long)]
        min_price: Option<Decimal>,

        /// Maximum unit price (inclusive)
        #[arg(long)]
        max_price: Option<Decimal>,

        /// Only items with a promotional badge
        #[arg(long)]
        promo_only: bool,

        /// Sort order
        #[arg(long, value_enum, default_value_t = SortArg::Default)]
        sort: SortArg,
    },
    /// List categories
    Categories,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the persisted cart with totals
    Show {
        #[arg(short, long)]
        user: UserId,

        /// Print totals and sync status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add units of an item
    Add {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        item: i32,

        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Set an item's quantity (0 or less removes it)
    Set {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        item: i32,

        #[arg(short, long, allow_negative_numbers = true)]
        qty: i64,
    },
    /// Remove an item
    Remove {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        item: i32,
    },
    /// Empty the cart
    Clear {
        #[arg(short, long)]
        user: UserId,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Default,
    PriceAsc,
    PriceDesc,
    DiscountFirst,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
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
    // Load configuration from environment (needed for Sentry init)
    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "basket_cart=info,basket_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        // process::exit skips destructors, so flush Sentry explicitly
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Catalog { action } => match action {
            CatalogAction::List {
                search,
                category,
                min_price,
                max_price,
                promo_only,
                sort,
            } => {
                let query = basket_cart::CatalogQuery {
                    text: search,
                    category,
                    min_price,
                    max_price,
                    promo_only,
                    sort: sort.into(),
                };
                commands::catalog::list(config, &query)?;
            }
            CatalogAction::Categories => commands::catalog::categories(config)?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show { user, json } => commands::cart::show(config, user, json).await?,
            CartAction::Add { user, item, qty } => {
                commands::cart::add(config, user, ItemId::new(item), qty).await?;
            }
            CartAction::Set { user, item, qty } => {
                commands::cart::set(config, user, ItemId::new(item), qty).await?;
            }
            CartAction::Remove { user, item } => {
                commands::cart::remove(config, user, ItemId::new(item)).await?;
            }
            CartAction::Clear { user } => commands::cart::clear(config, user).await?,
        },
    }
    Ok(())
}

impl From<SortArg> for basket_cart::CatalogSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Default => Self::Default,
            SortArg::PriceAsc => Self::PriceAsc,
            SortArg::PriceDesc => Self::PriceDesc,
            SortArg::DiscountFirst => Self::DiscountFirst,
        }
    }
}
