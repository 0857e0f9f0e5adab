use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use bizdesk::{
    config::{self, AppConfig},
    db,
    events::{Event, EventSender},
    logging::{setup_logger, LoggerConfig},
    models::{
        user::{Role, UserView},
        Address,
    },
    services::{
        crm::{CampaignInput, OpportunityInput},
        customers::{CustomerFilter, CustomerInput},
        products::ProductInput,
        suppliers::SupplierInput,
        users::NewUser,
        Services,
    },
    store::{SharedStore, SqlStore},
    validation::DisabledLookup,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::Migrate => migrate(&config).await?,
        Commands::CreateAdmin(args) => {
            let context = CliContext::initialize(&config).await?;
            create_admin(&context, args, cli.json).await?
        }
        Commands::Seed => {
            let context = CliContext::initialize(&config).await?;
            seed(&context, cli.json).await?
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "bizdesk-cli", about = "bizdesk database and account administration", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
    /// Load a small sample data set into an empty database
    Seed,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

struct CliContext {
    services: Services,
}

impl CliContext {
    async fn initialize(config: &AppConfig) -> Result<Self> {
        if config.uses_memory_store() {
            bail!("the memory storage backend keeps nothing between runs; configure a database");
        }

        let db_pool = db::establish_connection_from_app_config(config)
            .await
            .context("failed to connect to database")?;
        db::run_migrations(&db_pool)
            .await
            .context("failed to apply migrations")?;
        let store: SharedStore = Arc::new(SqlStore::new(Arc::new(db_pool)));

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(32);
        let event_sender = Arc::new(EventSender::new(event_tx));

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(target: "bizdesk_cli", event = ?event, "received async event");
            }
        });

        let logger = setup_logger(LoggerConfig::default());
        let services = Services::new(store, event_sender, Arc::new(DisabledLookup), &logger);
        Ok(Self { services })
    }
}

async fn migrate(config: &AppConfig) -> Result<()> {
    if config.uses_memory_store() {
        info!("memory storage backend selected; nothing to migrate");
        return Ok(());
    }

    let db_pool = db::establish_connection_from_app_config(config)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&db_pool)
        .await
        .context("failed to apply migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn create_admin(context: &CliContext, args: CreateAdminArgs, json: bool) -> Result<()> {
    let account = context
        .services
        .users
        .create_user(NewUser {
            name: args.name,
            email: args.email,
            password: args.password,
            role: Some(Role::Admin),
        })
        .await
        .context("failed to create administrator")?;
    let view = UserView::from(&account);

    if json {
        print_json(&view)?;
    } else {
        println!("Administrator {} created (id {})", view.email, view.id);
    }
    Ok(())
}

#[derive(Serialize)]
struct SeedSummary {
    suppliers: usize,
    customers: usize,
    products: usize,
    campaigns: usize,
    opportunities: usize,
}

async fn seed(context: &CliContext, json: bool) -> Result<()> {
    let services = &context.services;
    if !services
        .customers
        .list(&CustomerFilter::default())
        .await?
        .is_empty()
    {
        bail!("database already has customers; seed only runs against an empty database");
    }

    let supplier = services
        .suppliers
        .create(SupplierInput {
            name: "Distribuidora Central Ltda".into(),
            trade_name: Some("Central".into()),
            contact_name: Some("Marta Lima".into()),
            email: Some("vendas@central.example".into()),
            phone: Some("11 3333-0000".into()),
            tax_id: None,
            address: sample_address("São Paulo", "SP", "01310-100"),
            status: None,
            notes: None,
        })
        .await?;

    let mut customers = Vec::new();
    for (name, email, city, state, postal_code) in [
        ("Padaria Bom Dia", "contato@bomdia.example", "Campinas", "SP", "13010-000"),
        ("Oficina Rápida", "oficina@rapida.example", "Curitiba", "PR", "80010-000"),
        ("Ana Souza", "ana.souza@example.com", "Belo Horizonte", "MG", "30110-000"),
    ] {
        let customer = services
            .customers
            .create(CustomerInput {
                name: name.into(),
                email: Some(email.into()),
                phone: None,
                tax_id: None,
                address: sample_address(city, state, postal_code),
                status: None,
                notes: None,
            })
            .await?;
        customers.push(customer);
    }

    let mut products = 0;
    for (name, sku, price, cost, stock, min_stock) in [
        ("Café torrado 500g", "CAF-500", 2490, 1500, 40, 10),
        ("Açúcar refinado 1kg", "ACU-1000", 650, 380, 60, 15),
        ("Filtro de papel 103", "FIL-103", 890, 420, 5, 8),
        ("Garrafa térmica 1L", "GAR-1000", 8990, 5200, 12, 3),
    ] {
        services
            .products
            .create(ProductInput {
                name: name.into(),
                sku: sku.into(),
                description: None,
                category: Some("Mercearia".into()),
                unit: Some("un".into()),
                price: Decimal::new(price, 2),
                cost: Decimal::new(cost, 2),
                stock_quantity: Decimal::from(stock),
                min_stock: Decimal::from(min_stock),
                supplier_id: Some(supplier.id),
                status: None,
            })
            .await?;
        products += 1;
    }

    let today = Utc::now().date_naive();
    services
        .campaigns
        .create(CampaignInput {
            name: "Semana do café".into(),
            description: Some("Desconto progressivo em cafés".into()),
            channel: Some("email".into()),
            target_audience: Some("Clientes varejo".into()),
            start_date: today,
            end_date: Some(today + ChronoDuration::days(7)),
            budget: Decimal::new(150_000, 2),
            spent: Decimal::ZERO,
            status: None,
        })
        .await?;

    let mut opportunities = 0;
    if let Some(customer) = customers.first() {
        services
            .opportunities
            .create(OpportunityInput {
                title: "Fornecimento mensal de café".into(),
                customer_id: customer.id,
                value: Decimal::new(480_000, 2),
                stage: None,
                probability: None,
                expected_close_date: Some(today + ChronoDuration::days(30)),
                notes: None,
            })
            .await?;
        opportunities += 1;
    }

    let summary = SeedSummary {
        suppliers: 1,
        customers: customers.len(),
        products,
        campaigns: 1,
        opportunities,
    };
    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Seeded {} supplier, {} customers, {} products, {} campaign and {} opportunity",
            summary.suppliers,
            summary.customers,
            summary.products,
            summary.campaigns,
            summary.opportunities
        );
    }
    Ok(())
}

fn sample_address(city: &str, state: &str, postal_code: &str) -> Address {
    Address {
        city: Some(city.into()),
        state: Some(state.into()),
        postal_code: Some(postal_code.into()),
        ..Address::default()
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
