use std::sync::Arc;

use regbridge::bot::{RegistrationClient, TelegramBot};
use regbridge::config::Config;
use regbridge::events::{AccountEventBus, WelcomeEmailEnqueuer};
use regbridge::gateway::{RegistrationService, gateway_routes};
use regbridge::notify::{
    InProcessQueue, MockEmailSender, NotificationSender, NotificationWorker, SmtpConfig,
    SmtpSender, TaskQueue, WorkerConfig, spawn_workers,
};
use regbridge::store::{IdentityStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC-...");
        eprintln!("  export TELEGRAM_BOT_API_SECRET=<shared secret>");
        std::process::exit(1);
    });

    eprintln!("🔗 regbridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: http://{}/create-telegram-user/", config.bind_addr);
    eprintln!("   Bot endpoint: {}", config.registration_url);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Workers: {}", config.worker_count);

    // ── Identity store + gateway ────────────────────────────────────────
    let store: Arc<dyn IdentityStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    let service = Arc::new(RegistrationService::new(store, config.api_secret.clone()));
    let app = gateway_routes(service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Gateway server failed");
    });

    // ── Event bus + notification workers ────────────────────────────────
    let queue = InProcessQueue::new();
    let bus = AccountEventBus::new();
    bus.subscribe(Arc::new(WelcomeEmailEnqueuer::new(
        queue.clone() as Arc<dyn TaskQueue>
    )))
    .await;

    let sender: Arc<dyn NotificationSender> = match SmtpConfig::from_env() {
        Some(smtp) => {
            eprintln!("   Notifications: SMTP via {}", smtp.host);
            Arc::new(SmtpSender::new(smtp))
        }
        None => {
            eprintln!("   Notifications: mock sender (EMAIL_SMTP_HOST not set)");
            Arc::new(MockEmailSender::new())
        }
    };

    let worker = Arc::new(NotificationWorker::new(
        queue.clone() as Arc<dyn TaskQueue>,
        sender,
        WorkerConfig::default(),
    ));
    let _worker_handles = spawn_workers(worker, config.worker_count);

    // `bus` is the process-wide publisher for primary-account creation.
    // The account system that owns those writes publishes here; nothing on
    // the registration path does.
    let _bus = bus;

    // ── Bot long-poll loop (runs until the process exits) ───────────────
    let registration = Arc::new(RegistrationClient::new(
        config.registration_url.clone(),
        config.api_secret.clone(),
        config.request_timeout,
    )?);
    let bot = TelegramBot::new(config.bot_token.clone(), registration);
    bot.run().await;

    Ok(())
}
