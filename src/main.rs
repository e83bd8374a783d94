//! urlmap: redirect short paths to URLs.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                       urlmap                         │
//!                 │                                                      │
//!   GET /<key>    │  ┌─────────┐   ┌───────────────┐   ┌──────────────┐  │
//!   ──────────────┼─▶│  http   │──▶│ ActiveHandler │──▶│RedirectHandler│─┼──▶ 302 Location
//!                 │  │ server  │   │  (ArcSwap)    │   │ Arc<RouteTable>│ │
//!                 │  └─────────┘   └───────▲───────┘   └──────┬───────┘  │
//!                 │                        │ publish          │ miss     │
//!                 │                        │                  ▼          │
//!                 │  ┌───────────────┐     │          /list /static 404  │
//!   SIGUSR1 ──────┼─▶│    reload     │─────┘                  │          │
//!   file write ───┼─▶│  coordinator  │◀── config::source ◀────┤          │
//!   SIGTERM ──────┼─▶│               │         │              │          │
//!                 │  └───────────────┘         ▼              ▼          │
//!                 │                      route file     route store      │
//!                 │                                     (redb)           │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use urlmap::admin;
use urlmap::config::schema::SourceKind;
use urlmap::config::validation::{format_errors, validate_settings};
use urlmap::config::{load_settings, Settings};
use urlmap::lifecycle::startup;
use urlmap::observability::logging;

#[derive(Parser)]
#[command(name = "urlmap", version)]
#[command(about = "Redirect short paths to URLs", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Port to listen on [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Route file [default: ~/.map.json]
    #[arg(short = 'f', long = "routes")]
    routes: Option<PathBuf>,

    /// Where the live routes come from
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Route store database file
    #[arg(long)]
    store: Option<PathBuf>,

    /// Do not reload when the route file changes
    #[arg(long)]
    no_watch: bool,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the redirect server (default)
    Serve,
    /// Copy every route from a route file into the store
    Import { file: PathBuf },
    /// Save one route in the store
    Add { key: String, url: String },
    /// Delete one route from the store
    Remove { key: String },
    /// Print the stored routes as JSON
    List,
}

impl Cli {
    fn settings(&self) -> Result<Settings, Box<dyn std::error::Error>> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => Settings::default(),
        };

        if let Some(port) = self.port {
            settings.listener.port = port;
        }
        if let Some(routes) = &self.routes {
            settings.routes.file = routes.clone();
        }
        if let Some(source) = self.source {
            settings.routes.source = source;
        }
        if let Some(store) = &self.store {
            settings.store.path = store.clone();
            settings.store.in_memory = false;
        }
        if self.no_watch {
            settings.routes.watch = false;
        }
        if let Some(log_file) = &self.log_file {
            settings.logging.file = Some(log_file.clone());
        }

        validate_settings(&settings).map_err(|errors| format!("invalid settings: {}", format_errors(&errors)))?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    logging::init(&settings.logging.filter, settings.logging.file.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "urlmap starting");
            match startup::serve(settings).await {
                Ok(outcome) => tracing::info!(outcome = ?outcome, "Shutdown complete"),
                Err(e) => {
                    tracing::error!(error = %e, "Startup failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Import { file } => {
            let store = startup::open_store(&settings)?;
            let report = admin::import(&store, &file)?;
            println!("imported {} route(s) in {} transaction(s)", report.written, report.transactions);
        }
        Commands::Add { key, url } => {
            let store = startup::open_store(&settings)?;
            let record = admin::add(&store, &key, &url)?;
            println!("/{} -> {}", record.key, record.target);
        }
        Commands::Remove { key } => {
            let store = startup::open_store(&settings)?;
            if !admin::remove(&store, &key)? {
                eprintln!("no route for {}", key);
            }
        }
        Commands::List => {
            let store = startup::open_store(&settings)?;
            println!("{}", admin::list(&store)?);
        }
    }

    Ok(())
}
