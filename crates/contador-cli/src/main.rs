use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use contador_channels::{MessageChannel, TwilioChannel, run_weekly_digest};
use contador_core::clock::{Clock, SystemClock};
use contador_core::ledger::{LedgerStore, MemoryLedger, ServiceAccountTokens, SheetsStore};
use contador_core::providers::{LlmProvider, OpenAiProvider};
use contador_core::types::{ChannelType, IncomingMessage};
use contador_gateway::{GatewayServer, GatewayState, handle_inbound};
use contador_scheduler::{Schedule, ScheduleEvent, ScheduleRunner, WEEKLY_DIGEST_TASK};

mod config;

use config::ContadorConfig;

#[derive(Parser)]
#[command(name = "contador")]
#[command(version)]
#[command(about = "Contador — a personal expense bot for SMS/WhatsApp")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and the weekly digest schedule
    Start,

    /// Send the weekly digest now
    Digest,

    /// Run one message through the webhook pipeline and print the reply
    Ask {
        /// The message, as it would arrive from the phone
        message: String,

        /// Use an empty in-memory ledger instead of the spreadsheet
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
        Commands::Digest => cmd_digest(&cli.config).await,
        Commands::Ask { message, dry_run } => cmd_ask(&cli.config, &message, dry_run).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        tokio::fs::write(&config_path, config::DEFAULT_CONFIG).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("Contador initialized at {}", config_dir.display());
    println!(
        "Edit {} or set OPENAI_API_KEY, SHEET_ID and the TWILIO_* variables.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ContadorConfig::load(config_path)?;
    println!("{:#?}", cfg);
    Ok(())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ContadorConfig::load(config_path)?;
    info!("Starting contador...");

    let cancel = CancellationToken::new();

    let ledger = build_ledger(&cfg).await?;
    let state = GatewayState {
        ledger: ledger.clone(),
        assistant: build_assistant(&cfg)?,
        clock: Arc::new(SystemClock),
        daily_threshold: cfg.server.daily_threshold,
        system_prompt: cfg.openai.system_prompt.clone(),
    };

    let bind: SocketAddr = format!("{}:{}", cfg.server.bind, cfg.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", cfg.server.bind, cfg.server.port))?;
    let server = GatewayServer::new(bind, state).spawn();

    // Weekly digest schedule
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ScheduleEvent>();
    let runner = ScheduleRunner::new(event_tx);
    let digest_job = if cfg.digest.enabled {
        match build_channel(&cfg) {
            Ok(channel) => {
                runner.start(Schedule::weekly_digest(cfg.digest.cron.clone())).await?;
                info!("Weekly digest scheduled ({}) for {}", cfg.digest.cron, cfg.twilio.to_number);
                Some(Arc::new(DigestJob {
                    ledger,
                    channel: Arc::new(channel),
                    recipient: cfg.twilio.to_number.clone(),
                    clock: Arc::new(SystemClock),
                }))
            }
            Err(e) => {
                warn!("Weekly digest disabled: {:#}", e);
                None
            }
        }
    } else {
        info!("Weekly digest disabled in config");
        None
    };

    println!("Contador is running. Press Ctrl+C to stop.");

    let cancel_clone = cancel.clone();
    let main_loop = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_clone.cancelled() => {
                    info!("Event loop shutting down");
                    break;
                }
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let Some(job) = digest_job.clone() else {
                        continue;
                    };
                    tokio::spawn(async move { job.handle(&event).await });
                }
            }
        }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, shutting down...");
        }
        result = server => {
            match result {
                Ok(Ok(())) => warn!("Webhook server exited"),
                Ok(Err(e)) => error!("Webhook server failed: {:#}", e),
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
    }
    cancel.cancel();
    let _ = main_loop.await;
    runner.stop_all().await;

    println!("Contador stopped.");
    Ok(())
}

async fn cmd_digest(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ContadorConfig::load(config_path)?;
    let job = DigestJob {
        ledger: build_ledger(&cfg).await?,
        channel: Arc::new(build_channel(&cfg)?),
        recipient: cfg.twilio.to_number.clone(),
        clock: Arc::new(SystemClock),
    };
    job.run().await?;
    println!("Weekly digest sent to {}", cfg.twilio.to_number);
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str, dry_run: bool) -> Result<()> {
    let cfg = ContadorConfig::load(config_path)?;

    let ledger: Arc<dyn LedgerStore> = if dry_run {
        info!("Dry run: using an in-memory ledger");
        Arc::new(MemoryLedger::new())
    } else {
        build_ledger(&cfg).await?
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = GatewayState {
        ledger,
        assistant: build_assistant(&cfg)?,
        clock: clock.clone(),
        daily_threshold: cfg.server.daily_threshold,
        system_prompt: cfg.openai.system_prompt.clone(),
    };

    let msg = IncomingMessage {
        sender: "cli".to_string(),
        content: message.to_string(),
        channel: ChannelType::Sms,
        received_at: clock.now(),
    };
    println!("{}", handle_inbound(&state, &msg).await?);
    Ok(())
}

async fn build_ledger(cfg: &ContadorConfig) -> Result<Arc<dyn LedgerStore>> {
    if cfg.sheets.spreadsheet_id.is_empty() {
        anyhow::bail!("sheets.spreadsheet_id is not set (SHEET_ID)");
    }
    let key_path = config::expand_home(&cfg.sheets.credentials_file);
    let tokens = ServiceAccountTokens::from_key_file(&key_path).await?;
    let store = SheetsStore::new(
        cfg.sheets.spreadsheet_id.clone(),
        cfg.sheets.range.clone(),
        Box::new(tokens),
    )?;
    info!("Ledger: spreadsheet {} ({})", cfg.sheets.spreadsheet_id, cfg.sheets.range);
    Ok(Arc::new(store))
}

fn build_assistant(cfg: &ContadorConfig) -> Result<Arc<dyn LlmProvider>> {
    if cfg.openai.api_key.is_empty() {
        warn!("openai.api_key is empty; messages without an amount will fail");
    }
    let provider = OpenAiProvider::new(
        cfg.openai.api_key.clone(),
        cfg.openai.model.clone(),
        cfg.openai.base_url.clone(),
        cfg.openai.max_tokens,
    )?;
    Ok(Arc::new(provider))
}

fn build_channel(cfg: &ContadorConfig) -> Result<TwilioChannel> {
    if cfg.twilio.to_number.is_empty() {
        anyhow::bail!("twilio.to_number is not set (USER_NUMBER)");
    }
    TwilioChannel::new(
        cfg.twilio.account_sid.clone(),
        cfg.twilio.auth_token.clone(),
        cfg.twilio.from_number.clone(),
    )
}

/// Everything the weekly digest needs, shared by the schedule and `contador digest`
struct DigestJob {
    ledger: Arc<dyn LedgerStore>,
    channel: Arc<dyn MessageChannel>,
    recipient: String,
    clock: Arc<dyn Clock>,
}

impl DigestJob {
    async fn run(&self) -> Result<()> {
        run_weekly_digest(
            self.ledger.as_ref(),
            self.channel.as_ref(),
            &self.recipient,
            self.clock.now(),
        )
        .await
    }

    /// React to a schedule firing. Failures are logged, never retried.
    async fn handle(&self, event: &ScheduleEvent) {
        if event.task != WEEKLY_DIGEST_TASK {
            warn!("Ignoring unknown scheduled task '{}'", event.task);
            return;
        }
        info!("Schedule {} fired at {}", event.schedule_id, event.fired_at);
        if let Err(e) = self.run().await {
            error!("Weekly digest failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use contador_core::clock::FixedClock;
    use contador_core::types::OutgoingMessage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        async fn send(&self, msg: OutgoingMessage) -> Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        fn channel_type(&self) -> ChannelType {
            ChannelType::WhatsApp
        }
    }

    fn job(ledger: MemoryLedger, channel: Arc<RecordingChannel>) -> DigestJob {
        let now = NaiveDate::from_ymd_opt(2026, 10, 24)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        DigestJob {
            ledger: Arc::new(ledger),
            channel,
            recipient: "whatsapp:+56912345678".to_string(),
            clock: Arc::new(FixedClock(now)),
        }
    }

    fn ledger() -> MemoryLedger {
        MemoryLedger::with_rows(vec![
            vec!["Fecha".into(), "Mensaje".into(), "Monto".into(), "Categoría".into()],
            vec!["2026-10-23 08:10:00".into(), "colación".into(), "4200".into(), "Comida".into()],
        ])
    }

    #[tokio::test]
    async fn test_digest_job_run_pushes_once() {
        let channel = Arc::new(RecordingChannel::default());
        job(ledger(), channel.clone()).run().await.unwrap();

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].content,
            "📊 Resumen de la semana:\nTotal: $4.200\n• comida: $4.200"
        );
    }

    #[tokio::test]
    async fn test_digest_job_handles_weekly_event() {
        let channel = Arc::new(RecordingChannel::default());
        let event = ScheduleEvent::fired("s1".to_string(), WEEKLY_DIGEST_TASK.to_string());
        job(ledger(), channel.clone()).handle(&event).await;
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_digest_job_ignores_other_tasks() {
        let channel = Arc::new(RecordingChannel::default());
        let event = ScheduleEvent::fired("s1".to_string(), "backup".to_string());
        job(ledger(), channel.clone()).handle(&event).await;
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_digest_job_store_failure_is_swallowed_by_handle() {
        let channel = Arc::new(RecordingChannel::default());
        let job = job(MemoryLedger::failing(), channel.clone());
        assert!(job.run().await.is_err());

        let event = ScheduleEvent::fired("s1".to_string(), WEEKLY_DIGEST_TASK.to_string());
        job.handle(&event).await;
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cli_parses_ask_dry_run() {
        let cli = Cli::parse_from(["contador", "ask", "--dry-run", "Café 3000"]);
        match cli.command {
            Commands::Ask { message, dry_run } => {
                assert_eq!(message, "Café 3000");
                assert!(dry_run);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_build_channel_requires_recipient() {
        let cfg = ContadorConfig::parse("[twilio]\naccount_sid = \"AC1\"\nauth_token = \"t\"\n").unwrap();
        assert!(build_channel(&cfg).is_err());
    }
}
