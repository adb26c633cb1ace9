use chrono_tz::Tz;
use domain::gateway::fcm::FcmGateway;
use domain::{PgAttendanceReadModel, PgDeliveryHistory, PgGuardianDirectory, PgJobQueue};
use events::EventPublisher;
use log::*;
use notification::gateway::{DisabledGateway, PushGateway};
use notification::retry::RetryPolicy;
use notification::{DeliveryWorker, Enqueuer, WorkerPool};
use realtime::read_model::AttendanceReadModel;
use realtime::{Broadcaster, Hub};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting attendance relay with log level: {}",
        config.log_level_filter
    );

    let timezone = match config.school_timezone().parse::<Tz>() {
        Ok(timezone) => timezone,
        Err(e) => {
            error!("Invalid school time zone {}: {e}", config.school_timezone());
            std::process::exit(1);
        }
    };

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let (hub, hub_loop) = Hub::spawn();
    let read_model: Arc<dyn AttendanceReadModel> =
        Arc::new(PgAttendanceReadModel::new(Arc::clone(&db), timezone));

    let queue = Arc::new(
        PgJobQueue::new(Arc::clone(&db), config.queue_poll_interval())
            .with_lease(config.queue_lease()),
    );
    let directory = Arc::new(PgGuardianDirectory::new(Arc::clone(&db)));

    let broadcaster = Broadcaster::new(
        hub.clone(),
        Arc::clone(&read_model),
        config.broadcast_latency_target(),
    );
    let enqueuer = Enqueuer::new(queue.clone(), directory.clone(), timezone);
    let event_publisher = EventPublisher::new()
        .with_handler(Arc::new(broadcaster))
        .with_handler(Arc::new(enqueuer));
    info!(
        "Event publisher ready with {} handler(s)",
        event_publisher.handler_count()
    );

    let gateway: Arc<dyn PushGateway> = match FcmGateway::from_config(&config).await {
        Ok(Some(gateway)) => Arc::new(gateway),
        Ok(None) => Arc::new(DisabledGateway),
        Err(e) => {
            error!("Failed to initialize the FCM gateway: {e}");
            std::process::exit(1);
        }
    };

    let policy = RetryPolicy::new(config.retry_ceiling)
        .with_delays(config.retry_base_delay(), config.retry_max_delay());
    let worker = DeliveryWorker::new(
        queue,
        gateway,
        Arc::new(PgDeliveryHistory::new(Arc::clone(&db))),
        policy,
    )
    .with_directory(directory)
    .with_poll_wait(config.queue_poll_timeout())
    .with_delivery_timeout(config.delivery_timeout());
    let workers = WorkerPool::spawn(worker, config.delivery_worker_count);

    let app_state = AppState::new(config, &db, hub.clone(), event_publisher, read_model);

    // Live sockets end only when the hub closes their buffers.
    let shutdown = {
        let hub = hub.clone();
        async move {
            shutdown_signal().await;
            info!("Shutting down: closing live connections");
            hub.shutdown().await;
        }
    };

    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server terminated with an error: {e}");
        hub.shutdown().await;
    }

    if let Err(e) = hub_loop.await {
        error!("Hub loop terminated abnormally: {e}");
    }
    info!("Draining delivery workers");
    workers.shutdown().await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
