use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use studyhub::config::{ServerConfig, WebhookConfig};
use studyhub::jobs::spawn_sweeper;
use studyhub::server::{AppState, create_router};
use studyhub::store::{SqliteStore, Store};
use studyhub::types::StudyPlan;

#[derive(Parser)]
#[command(name = "studyhub")]
#[command(about = "Study planner API server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "3000")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Secret for signing access tokens
        #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
        access_secret: String,

        /// Secret for signing refresh tokens (must differ from the access secret)
        #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true)]
        refresh_secret: String,

        /// Syllabus workflow endpoint that receives uploaded files.
        /// Without it, uploads complete after a short simulated delay.
        #[arg(long, env = "WEBHOOK_URL")]
        webhook_url: Option<String>,

        /// Complete jobs from the workflow's response instead of waiting for its callback
        #[arg(long, requires = "webhook_url")]
        webhook_sync: bool,

        /// HTTP relay that delivers password-reset mail. Without it, codes are only logged.
        #[arg(long, env = "MAIL_RELAY_URL")]
        mail_relay_url: Option<String>,

        /// Serve behind HTTPS: marks the refresh cookie Secure
        #[arg(long)]
        production: bool,

        /// Fail uploads still processing after this many seconds
        #[arg(long)]
        job_timeout_secs: Option<u64>,

        /// Browser origin allowed to call the API with credentials (repeatable)
        #[arg(
            long = "allowed-origin",
            env = "ALLOWED_ORIGINS",
            value_delimiter = ',',
            default_value = "http://localhost:8081"
        )]
        allowed_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the data directory and database
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Store a generated study plan for a user
    ImportPlan {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Email of the plan's owner
        #[arg(long)]
        email: String,

        /// Study plan JSON file
        #[arg(long)]
        file: PathBuf,
    },
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("Database not found. Run 'studyhub admin init' first.");
    }
    Ok(SqliteStore::new(&db_path)?)
}

fn run_init(data_dir: String) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!("Initialized database at {}", db_path.display());
    Ok(())
}

fn run_import_plan(data_dir: &str, email: &str, file: &Path) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;

    let user = store
        .get_user_by_email(email.trim())?
        .with_context(|| format!("No user with email '{email}'"))?;

    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut doc: serde_json::Value =
        serde_json::from_str(&raw).context("Study plan file is not valid JSON")?;

    let Some(obj) = doc.as_object_mut() else {
        bail!("Study plan file must contain a JSON object");
    };
    obj.insert("id".into(), Uuid::new_v4().to_string().into());
    obj.insert("userId".into(), user.id.clone().into());
    if !obj.contains_key("savedAt") {
        obj.insert("savedAt".into(), serde_json::to_value(Utc::now())?);
    }

    let plan: StudyPlan =
        serde_json::from_value(doc).context("Study plan file does not match the plan schema")?;
    store.create_study_plan(&plan)?;

    println!(
        "Imported study plan {} ({} courses) for {}",
        plan.id,
        plan.courses.len(),
        user.email
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("studyhub=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => {
                run_init(data_dir)?;
            }
            AdminCommands::ImportPlan {
                data_dir,
                email,
                file,
            } => {
                run_import_plan(&data_dir, &email, &file)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            access_secret,
            refresh_secret,
            webhook_url,
            webhook_sync,
            mail_relay_url,
            production,
            job_timeout_secs,
            allowed_origins,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                access_secret,
                refresh_secret,
                webhook: webhook_url.map(|url| WebhookConfig {
                    url,
                    sync: webhook_sync,
                }),
                mail_relay_url,
                secure_cookies: production,
                job_timeout: job_timeout_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
                allowed_origins,
                ..ServerConfig::default()
            };
            config.validate()?;

            let db_path = config.db_path();
            if !db_path.exists() {
                bail!(
                    "Server not initialized. Run 'studyhub admin init' first to create the database."
                );
            }

            let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&db_path)?);
            store.initialize()?;

            let state = Arc::new(AppState::new(Arc::clone(&store), &config)?);

            if let Some(timeout) = config.job_timeout {
                info!("Upload jobs expire after {}s", timeout.as_secs());
                spawn_sweeper(Arc::clone(&state.jobs), timeout);
            }
            match &config.webhook {
                Some(webhook) if webhook.sync => {
                    info!("Forwarding uploads to {} (synchronous)", webhook.url);
                }
                Some(webhook) => info!("Forwarding uploads to {} (callback)", webhook.url),
                None => info!("No workflow webhook configured; simulating upload processing"),
            }

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            info!("Shutting down");
            store.close()?;
        }
    }

    Ok(())
}
