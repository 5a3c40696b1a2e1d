//! cpl-pipeline - Community Partner Pipeline service
//!
//! Startup order: tracing, TOML config, root folder, database, settings,
//! external clients, engines, follow-up scheduler, HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use cpl_common::config::{resolve_root_folder, TomlConfig, DATABASE_FILE};
use cpl_common::events::EventBus;
use cpl_common::settings::{self, Settings};
use cpl_pipeline::clients::{
    AiClient, ContentGenerator, EmailSender, HttpEmailSender, LogEmailSender, PlatformInfo,
    RepositoryPartnerManager, SentimentAnalyzer,
};
use cpl_pipeline::config::{load_settings, resolve_ai_api_key, resolve_email_api_key};
use cpl_pipeline::scheduler::FollowUpScheduler;
use cpl_pipeline::services::{Clients, OutreachConfig, Repositories, Services};
use cpl_pipeline::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 5740;

#[derive(Debug, Parser)]
#[command(name = "cpl-pipeline", version, about = "Community partner pipeline service")]
struct Args {
    /// Root folder holding the database
    #[arg(long, env = "CPL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP port (overrides the TOML config)
    #[arg(long)]
    port: Option<u16>,

    /// Keep all data in memory; nothing is persisted
    #[arg(long)]
    in_memory: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => TomlConfig::load(path)?,
        None => TomlConfig::load_default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(toml_config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting cpl-pipeline (Community Partner Pipeline)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let (repos, db) = if args.in_memory {
        warn!("In-memory mode: data will be lost on shutdown");
        (Repositories::in_memory(), None)
    } else {
        let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
        let db_path = root_folder.join(DATABASE_FILE);
        info!("Database: {}", db_path.display());
        let pool = cpl_common::db::init_database(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        (Repositories::sqlite(pool.clone()), Some(pool))
    };

    let settings: Settings = load_settings(&toml_config, db.as_ref()).await?;
    let platform = PlatformInfo {
        name: settings.get_string(settings::PLATFORM_NAME, "TrashMob.eco"),
        site_url: settings.get_string(settings::PLATFORM_SITE_URL, "https://www.trashmob.eco"),
    };

    let ai = Arc::new(AiClient::new(
        resolve_ai_api_key(db.as_ref(), &toml_config).await?,
        toml_config.ai_model.clone(),
        platform.clone(),
    )?);
    if !ai.is_configured() {
        warn!("AI provider not configured; using fallback outreach content and neutral sentiment");
    }

    let email_api_key = resolve_email_api_key(db.as_ref(), &toml_config).await?;
    let email: Arc<dyn EmailSender> = match email_api_key {
        Some(key) => {
            let from = toml_config
                .email_from_address
                .clone()
                .unwrap_or_else(|| settings::DEFAULT_TEST_RECIPIENT.to_string());
            Arc::new(HttpEmailSender::new(&key, &from, &platform.name)?)
        }
        None => {
            warn!("Email API key not configured; emails will only be logged");
            Arc::new(LogEmailSender)
        }
    };

    let outreach_config = OutreachConfig::from_settings(&settings);
    info!(
        enabled = outreach_config.enabled,
        test_mode = outreach_config.test_mode,
        max_daily = outreach_config.max_daily,
        "Outreach configuration"
    );

    let event_bus = EventBus::new(100);
    let clients = Clients {
        content: ai.clone() as Arc<dyn ContentGenerator>,
        sentiment: ai as Arc<dyn SentimentAnalyzer>,
        email,
        partner_manager: Arc::new(RepositoryPartnerManager::new(
            repos.partners.clone(),
            repos.partner_admins.clone(),
        )),
        platform,
    };
    let services = Arc::new(Services::new(repos, clients, outreach_config, event_bus.clone()));

    let cancel_token = CancellationToken::new();
    let scan_interval = Duration::from_secs(u64::from(
        settings.get_u32(settings::FOLLOWUP_SCAN_INTERVAL_SECS, 3600).max(1),
    ));
    let scheduler =
        FollowUpScheduler::new(services.clone(), scan_interval, cancel_token.clone()).spawn();

    let app = cpl_pipeline::build_router(AppState::new(services, event_bus));

    let bind_address = toml_config.bind_address.as_deref().unwrap_or("127.0.0.1");
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    info!("Listening on http://{}:{}", bind_address, port);
    info!("Health check: http://{}:{}/health", bind_address, port);

    let shutdown_token = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
            shutdown_token.cancel();
        })
        .await?;

    cancel_token.cancel();
    if let Err(e) = scheduler.await {
        warn!("Follow-up scheduler task ended abnormally: {}", e);
    }

    info!("cpl-pipeline stopped");
    Ok(())
}
