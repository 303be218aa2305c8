//! CLI command definitions, routing, and tracing setup.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use folio_core::{ArticleService, CategoryService};
use folio_http::{AppState, CorsConfig};
use folio_shared::{
    AppConfig, Category, ServiceConfig, expand_home, init_config, load_config, load_config_from,
};
use folio_storage::Storage;
use tokio::net::TcpListener;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Folio: articles and hierarchical categories over HTTP.
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Serve and manage a Folio article/category store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.folio/folio.toml).
    #[arg(long, global = true, env = "FOLIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding `[database] path`.
    #[arg(long, global = true, env = "FOLIO_DB")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to bind, overriding `[server] bind`.
        #[arg(long, env = "FOLIO_BIND")]
        bind: Option<String>,
    },

    /// Create or upgrade the database schema.
    Migrate,

    /// Category inspection.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum CategoryAction {
    /// Print the category hierarchy.
    Tree,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "folio=info",
        1 => "folio=debug",
        _ => "folio=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = resolve_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            cmd_serve(&config).await
        }
        Command::Migrate => cmd_migrate(&config).await,
        Command::Category { action } => match action {
            CategoryAction::Tree => cmd_category_tree(&config).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn database_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(expand_home(&config.database.path)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    let db_path = database_path(config)?;
    let storage = Arc::new(Storage::open(&db_path).await?);
    let service_config = ServiceConfig::from(config);

    let state = AppState {
        articles: ArticleService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            service_config.clone(),
        ),
        categories: CategoryService::new(storage, service_config),
    };
    let cors = CorsConfig::new(config.server.cors_allowed_origins.clone());
    let app = folio_http::router(state, cors);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .wrap_err_with(|| format!("failed to bind {}", config.server.bind))?;

    info!(
        bind = %config.server.bind,
        db = %db_path.display(),
        "starting folio"
    );
    folio_http::serve(listener, app).await?;
    Ok(())
}

async fn cmd_migrate(config: &AppConfig) -> Result<()> {
    let db_path = database_path(config)?;
    let storage = Storage::open(&db_path).await?;
    let version = storage.schema_version().await;

    println!("Database: {}", db_path.display());
    println!(
        "Schema version: {version} (latest {})",
        Storage::latest_schema_version()
    );
    Ok(())
}

async fn cmd_category_tree(config: &AppConfig) -> Result<()> {
    let db_path = database_path(config)?;
    let storage = Arc::new(Storage::open_readonly(&db_path).await?);
    let service = CategoryService::new(storage, ServiceConfig::from(config));

    let roots = service.tree().await?;
    if roots.is_empty() {
        println!("(no categories)");
        return Ok(());
    }
    print!("{}", render_tree(&roots));
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

/// Indented listing, two spaces per level.
fn render_tree(roots: &[Category]) -> String {
    fn walk(out: &mut String, nodes: &[Category], depth: usize) {
        for node in nodes {
            let _ = writeln!(
                out,
                "{:indent$}{} ({})",
                "",
                node.name,
                node.path,
                indent = depth * 2
            );
            walk(out, &node.children, depth + 1);
        }
    }

    let mut out = String::new();
    walk(&mut out, roots, 0);
    out
}
