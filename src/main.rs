use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use taskd::config::TaskdConfig;
use taskd::rest;
use taskd::storage::{self, Storage};
use taskd::{model, AppContext};

#[derive(Parser)]
#[command(name = "taskd", version, about = "Task-management REST API daemon")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long, env = "TASKD_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the SQLite database (overrides config).
    #[arg(long, env = "TASKD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Listen port (overrides config).
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Log filter, e.g. "info" or "taskd=debug" (overrides config).
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API server (the default when no subcommand is given).
    Serve,
    /// Create a staff user.
    ///
    /// Staff status is never grantable through the API; this is the only way
    /// to mint an administrator.
    ///
    /// Examples:
    ///   taskd create-admin --username admin --email admin@example.com --password s3cret
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TaskdConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(log) = args.log {
        config.logging.level = log;
    }

    // Init once — must happen before any tracing calls.
    setup_logging(&config.logging.level, &config.logging.format);

    match args.command {
        Some(Command::CreateAdmin {
            username,
            email,
            password,
        }) => create_admin(&config, &username, &email, &password).await,
        None | Some(Command::Serve) => serve(config).await,
    }
}

async fn serve(config: TaskdConfig) -> Result<()> {
    let data_dir = config.data_dir();
    let storage = Arc::new(Storage::new(&data_dir).await?);
    let ctx = Arc::new(AppContext::new(Arc::new(config), storage));
    rest::start_rest_server(ctx).await
}

async fn create_admin(
    config: &TaskdConfig,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    model::validate_username(username)?;
    model::validate_email(email)?;
    model::validate_password(password)?;

    let storage = Storage::new(&config.data_dir()).await?;
    let hash = rest::auth::hash_password(password)?;
    match storage.create_user(username, email, &hash, true).await {
        Ok(user) => {
            println!("Created staff user {} ({})", user.username, user.id);
            Ok(())
        }
        Err(err) if storage::is_unique_violation(&err) => {
            anyhow::bail!("username '{username}' is already taken")
        }
        Err(err) => Err(err.into()),
    }
}

fn setup_logging(level: &str, format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
