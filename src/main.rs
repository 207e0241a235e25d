use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use tableside::api::{ApiServer, ApiState};
use tableside::db::{self, MenuRepo, OrderRepo};
use tableside::llm::OpenAiChatModel;
use tableside::ordering::{CartLine, CatalogItem};
use tableside::printer::{self, DevicePrinter};
use tableside::prompt::PromptTemplate;
use tableside::voice::{EnergyClassifier, SpeechToText, TextToSpeech};
use tableside::{Config, SessionConfig, SessionServices};

/// Tableside - voice ordering assistant for restaurant tables
#[derive(Parser)]
#[command(name = "tableside", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "TABLESIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "TABLESIDE_PORT")]
    port: Option<u16>,

    /// `SQLite` database path
    #[arg(long, env = "TABLESIDE_DB_PATH")]
    db: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default)
    Serve,
    /// Insert or replace menu items from a TOML file
    SeedMenu {
        /// File with `[[items]]` tables
        file: PathBuf,
    },
    /// List the menu with stock
    Menu,
    /// List recent orders
    Orders {
        /// Number of orders to show
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// Print a sample kitchen ticket
    TestPrinter,
}

/// Menu seed file
#[derive(Debug, Deserialize)]
struct MenuFile {
    #[serde(default)]
    items: Vec<SeedItem>,
}

#[derive(Debug, Deserialize)]
struct SeedItem {
    dish_id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
    price: f64,
    quantity: u32,
    #[serde(default)]
    popularity_score: i64,
    #[serde(default)]
    meal_period: Option<String>,
    /// Defaults to in stock
    #[serde(default)]
    available: Option<bool>,
}

impl From<SeedItem> for CatalogItem {
    fn from(item: SeedItem) -> Self {
        Self {
            available: item.available.unwrap_or(true) && item.quantity > 0,
            dish_id: item.dish_id,
            name: item.name,
            description: item.description,
            category: item.category,
            price: item.price,
            quantity: item.quantity,
            popularity_score: item.popularity_score,
            meal_period: item.meal_period,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,tableside=info",
        1 => "info,tableside=debug",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SeedMenu { file } => seed_menu(&config, &file),
        Command::Menu => list_menu(&config),
        Command::Orders { n } => list_orders(&config, n),
        Command::TestPrinter => test_printer(&config).await,
    }
}

/// Build the adapters and run the HTTP server
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        database = %config.database_path.display(),
        "starting tableside gateway"
    );
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(&config.database_path)?;

    let transcriber = SpeechToText::from_config(
        &config.speech,
        config.api_keys.sarvam.as_ref(),
        config.api_keys.openai.as_ref(),
        config.audio.sample_rate,
    )?;
    let synthesizer = TextToSpeech::from_config(
        &config.speech,
        config.api_keys.sarvam.as_ref(),
        config.api_keys.openai.as_ref(),
    )?;
    let model = OpenAiChatModel::new(&config.llm, config.api_keys.llm.clone())?;
    let prompt = PromptTemplate::load(config.ordering.prompt_path.as_deref())?;

    if !config.printer.enabled {
        tracing::warn!("kitchen printer disabled, orders will be saved without tickets");
    }

    let services = SessionServices {
        classifier: Arc::new(EnergyClassifier::new()),
        transcriber: Arc::new(transcriber),
        model: Arc::new(model),
        synthesizer: Arc::new(synthesizer),
        menu: Arc::new(MenuRepo::new(pool.clone())),
        orders: Arc::new(OrderRepo::new(pool.clone())),
        printer: Arc::from(printer::from_config(&config.printer)),
        prompt: Arc::new(prompt),
    };

    let state = ApiState::new(
        pool,
        config.server.api_key.clone(),
        services,
        SessionConfig::from_config(&config),
    );

    ApiServer::new(state, config.server.port, config.server.static_dir.clone())
        .run()
        .await?;
    Ok(())
}

/// Upsert menu items from a TOML file
fn seed_menu(config: &Config, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let menu_file: MenuFile = toml::from_str(&content)?;

    let pool = db::init(&config.database_path)?;
    let repo = MenuRepo::new(pool);

    let count = menu_file.items.len();
    for item in menu_file.items {
        repo.upsert(&item.into())?;
    }

    println!("Seeded {count} menu items into {}", config.database_path.display());
    Ok(())
}

/// Print the catalog
fn list_menu(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let items = MenuRepo::new(pool).list_all()?;

    if items.is_empty() {
        println!("Menu is empty. Seed it with `tableside seed-menu <file.toml>`.");
        return Ok(());
    }

    for item in items {
        let flag = if item.available { "" } else { "  (unavailable)" };
        println!(
            "{:<12} {:<32} {:>8.2} qty {:>4}{flag}",
            item.dish_id, item.name, item.price, item.quantity
        );
    }
    Ok(())
}

/// Print the most recent orders
fn list_orders(config: &Config, n: usize) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let orders = OrderRepo::new(pool).list_recent(n)?;

    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in orders {
        println!(
            "#{} table {} at {}: {:.2}",
            order.id,
            order.table_number,
            order.created_at.format("%Y-%m-%d %H:%M"),
            order.total
        );
        for line in &order.lines {
            println!("    {} x{}", line.name, line.quantity);
        }
    }
    Ok(())
}

/// Send a sample ticket to the configured device
async fn test_printer(config: &Config) -> anyhow::Result<()> {
    use tableside::printer::Printer;

    let lines = [
        CartLine {
            dish_id: "sample-1".to_string(),
            name: "Masala Dosa".to_string(),
            unit_price: 80.0,
            quantity: 2,
        },
        CartLine {
            dish_id: "sample-2".to_string(),
            name: "Filter Coffee".to_string(),
            unit_price: 25.0,
            quantity: 1,
        },
    ];

    // Ignore the enabled flag so a device can be checked before turning it on
    let device = DevicePrinter::new(
        config.printer.device.clone(),
        config.printer.width,
        Duration::from_secs(config.printer.timeout_secs),
    );
    device.print_ticket(&lines, &config.ordering.default_table, 0).await?;

    println!("Sample ticket sent to {}", config.printer.device.display());
    Ok(())
}
