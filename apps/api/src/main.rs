use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentCellState, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use notification_cell::{LogNotifier, Notifier, ReminderScheduler, SchedulerSettings, TelegramNotifier};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{FixedOffsetClock, SharedClock};
use video_conferencing_cell::{
    InMemoryVideoSessionStore, JoinLinkBuilder, SignalingRelay, SupabaseVideoSessionStore, VideoCellState,
    VideoSessionManager, VideoSessionStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Telemed API server");

    let config = Arc::new(AppConfig::from_env());
    let clock: SharedClock = Arc::new(FixedOffsetClock::new(config.scheduling_utc_offset_hours));

    // Storage: Supabase when configured, otherwise process memory
    let appointment_store: Arc<dyn AppointmentStore>;
    let session_store: Arc<dyn VideoSessionStore>;
    if config.is_database_configured() {
        let supabase = Arc::new(SupabaseClient::new(&config));
        appointment_store = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
        session_store = Arc::new(SupabaseVideoSessionStore::new(supabase));
    } else {
        warn!("Using in-memory storage; data is lost on restart");
        appointment_store = Arc::new(InMemoryAppointmentStore::new());
        session_store = Arc::new(InMemoryVideoSessionStore::new());
    }

    let sessions = Arc::new(VideoSessionManager::new(
        session_store,
        JoinLinkBuilder::from_config(&config),
        clock.clone(),
    ));

    let video_state = VideoCellState {
        config: config.clone(),
        relay: Arc::new(SignalingRelay::new()),
        sessions: sessions.clone(),
    };
    let appointment_state =
        AppointmentCellState::new(config.clone(), appointment_store.clone(), sessions, clock.clone());

    // Reminder scheduler
    let notifier: Arc<dyn Notifier> = if config.is_telegram_configured() {
        Arc::new(TelegramNotifier::new(&config)?)
    } else {
        Arc::new(LogNotifier)
    };
    let scheduler = ReminderScheduler::new(
        appointment_store,
        notifier,
        clock,
        SchedulerSettings::from_config(&config)?,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(appointment_state, video_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for the reminder scheduler");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!("Reminder scheduler task failed: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
