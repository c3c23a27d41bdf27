use clap::{Args, Parser, Subcommand};
use mangoseed::cli::{self, Command, Console, EXIT_UNEXPECTED, EXIT_USER_ERROR};
use mangoseed::config::{AppConfig, ENV_PASSWORD};
use mangoseed::errors::SeedError;
use mangoseed::export::ExportSettings;
use mangoseed::import::ExistingEntryBehavior;
use mangoseed::logger;
use mangoseed::store::{DocumentStore, MongoStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default batch size for the command line; larger than the library default since most
/// seed documents are small.
const CLI_BATCH_SIZE: usize = 500;

#[derive(Parser, Debug)]
#[command(name = "mangoseed", version, about = "Seed MongoDB collections from JSON files and export them back", long_about = None)]
struct Cli {
    #[command(flatten)]
    shared: SharedArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SharedArgs {
    #[arg(short = 's', long, global = true, help = "Server as host:port [default: 127.0.0.1:27017]")]
    server: Option<String>,
    #[arg(short = 'u', long, global = true, help = "Username")]
    user: Option<String>,
    #[arg(short = 'p', long, global = true, help = "Password. Alternatively use environment variable MANGOSEED_DB_PW=<password>")]
    password: Option<String>,
    #[arg(long, global = true, help = "Authentication database [default: admin]")]
    authentication_db: Option<String>,
    #[arg(long, global = true, help = "Authentication mechanism: SCRAM-SHA-1 or SCRAM-SHA-256 [default: SCRAM-SHA-1]")]
    authentication_mechanism: Option<String>,
    #[arg(short = 't', long, global = true, help = "Use TLS")]
    tls_enabled: bool,
    #[arg(long, global = true, help = "Accept invalid TLS certificates")]
    allow_insecure_tls: bool,
    #[arg(short = 'd', long, global = true, help = "Database to use (or MANGOSEED_DB)")]
    db: Option<String>,
    #[arg(long, global = true, help = "Path to a config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Log4rs YAML file; overrides the built-in logging setup")]
    log_config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Import seed files into collections named after them")]
    Import {
        #[arg(short = 'f', long, help = "A json seed file, or a directory searched recursively for .json files")]
        seed_file_path: PathBuf,
        #[arg(long, help = "Number of files processed at the same time [default: 4]")]
        max_dop: Option<usize>,
        #[arg(long, help = "Documents per insert; use a higher number for small documents [default: 500]")]
        batch_size: Option<usize>,
        #[arg(long, help = "Action when an entry with a given _id already exists: none, truncate, drop, ignore or replace")]
        existing_entry_behavior: Option<ExistingEntryBehavior>,
        #[arg(long, conflicts_with_all = ["drop", "existing_entry_behavior"], help = "Delete all documents first, keeping indexes")]
        truncate: bool,
        #[arg(long, conflicts_with = "existing_entry_behavior", help = "Drop the collection first, including indexes")]
        drop: bool,
    },
    #[command(about = "Export a filtered collection as newline-separated JSON")]
    Export {
        #[arg(short = 'c', long, help = "The source collection")]
        collection: String,
        #[arg(short = 'q', long, help = "Query filter, e.g. {\"name\": \"Harry\"}")]
        query: String,
        #[arg(long, help = "Destination path [default: ./<collection>.json]")]
        destination: Option<PathBuf>,
        #[arg(long, help = "Write each document on one line")]
        disable_pretty_print: bool,
    },
}

fn flags_config(args: &Cli) -> AppConfig {
    let s = &args.shared;
    let mut cfg = AppConfig {
        server: s.server.clone(),
        database: s.db.clone(),
        user: s.user.clone(),
        authentication_db: s.authentication_db.clone(),
        authentication_mechanism: s.authentication_mechanism.clone(),
        tls_enabled: s.tls_enabled.then_some(true),
        allow_insecure_tls: s.allow_insecure_tls.then_some(true),
        ..AppConfig::default()
    };
    if let Commands::Import { max_dop, batch_size, existing_entry_behavior, truncate, drop, .. } = &args.command {
        cfg.max_dop = *max_dop;
        cfg.batch_size = *batch_size;
        cfg.existing_entry_behavior = if *truncate {
            Some(ExistingEntryBehavior::Truncate)
        } else if *drop {
            Some(ExistingEntryBehavior::Drop)
        } else {
            *existing_entry_behavior
        };
    }
    cfg
}

fn build_command(args: Cli, cfg: &AppConfig) -> Command {
    match args.command {
        Commands::Import { seed_file_path, .. } => {
            let mut settings = cfg.import_settings();
            if cfg.batch_size.is_none() {
                settings.batch_size = CLI_BATCH_SIZE;
            }
            Command::Import { source: seed_file_path, settings }
        }
        Commands::Export { collection, query, destination, disable_pretty_print } => {
            let destination = destination
                .map(|d| PathBuf::from(d.to_string_lossy().trim()))
                .unwrap_or_else(|| cli::default_destination(&collection));
            Command::Export {
                collection,
                query,
                destination,
                settings: ExportSettings { pretty_print: !disable_pretty_print },
            }
        }
    }
}

fn connect(args: &Cli, cfg: &AppConfig) -> Result<(String, Arc<dyn DocumentStore>), SeedError> {
    let database = cfg.database()?.to_string();
    let password = args.shared.password.clone().or_else(|| std::env::var(ENV_PASSWORD).ok());
    let settings = cfg.connection_settings(password)?;
    let store: Arc<dyn DocumentStore> = Arc::new(MongoStore::connect(&settings)?);
    Ok((database, store))
}

fn init_logging(args: &Cli, cfg: &AppConfig) {
    let res = match &args.shared.log_config {
        Some(path) => logger::init_path(path),
        None => logger::configure_logging(cfg.log_dir.as_deref(), cfg.log_level.as_deref(), logger::env_retention()),
    };
    if let Err(e) = res {
        eprintln!("Logging disabled: {e}");
    }
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let mut console = Console::stdio();
    let env = |k: &str| std::env::var(k).ok();
    let cfg = match flags_config(&args).layered(args.shared.config.as_deref(), env) {
        Ok(cfg) => cfg,
        Err(e) => {
            console.error("Configuration", &e.to_string());
            std::process::exit(EXIT_USER_ERROR);
        }
    };
    init_logging(&args, &cfg);
    cfg.warn_ignored_keys();
    console.info("MangoSeed", &format!("Starting MangoSeed v{}...", env!("CARGO_PKG_VERSION")));

    let (database, store) = match connect(&args, &cfg) {
        Ok(v) => v,
        Err(e) => {
            console.error("Connection", &e.to_string());
            let code = if e.is_user_error() { EXIT_USER_ERROR } else { EXIT_UNEXPECTED };
            std::process::exit(code);
        }
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, stopping");
            on_ctrl_c.cancel();
        }
    });

    let command = build_command(args, &cfg);
    let result = cli::run(store, &database, command, &mut console, &cancel).await;
    std::process::exit(cli::exit_code(&result));
}
