use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod bus;
mod config;
mod controllers;
mod db;
mod jobs;
mod kernel;
mod modelfile;
mod models;
mod processing;
mod scheduler;

use bus::{InMemoryBus, MessageBus, RedisBus};
use config::{BusBackend, Config};
use db::Database;
use jobs::{DispatchContext, JobQueue, JobWorker};
use kernel::KernelClient;
use scheduler::{Scheduler, SchedulerConfig};

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub bus: Arc<dyn MessageBus>,
    pub queue: JobQueue,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    let bus: Arc<dyn MessageBus> = match config.message_bus {
        BusBackend::Redis => {
            log::info!("Connecting to Redis at {}", config.redis_url);
            Arc::new(
                RedisBus::connect(&config.redis_url)
                    .await
                    .expect("Failed to connect to Redis"),
            )
        }
        BusBackend::Memory => {
            log::warn!("Using the in-memory bus; output channels are only visible through /api/channels on this process");
            Arc::new(InMemoryBus::new())
        }
    };

    let kernel = KernelClient::new(config.kernel_http_timeout).expect("Failed to build kernel HTTP client");

    // Job queue and worker
    let (queue, receiver) = JobQueue::new();
    let ctx = Arc::new(DispatchContext::new(
        db.clone(),
        bus.clone(),
        Arc::new(kernel),
        config.clone(),
        queue.clone(),
    ));
    let worker_shutdown = CancellationToken::new();
    let worker = JobWorker::new(ctx, receiver);
    tokio::spawn(worker.run(worker_shutdown.clone()));

    // Periodic health checks
    let scheduler_shutdown_tx = match config.health_check_interval {
        Some(every) => {
            let scheduler = Arc::new(Scheduler::new(queue.clone(), SchedulerConfig::new(every)));
            let (tx, rx) = tokio::sync::oneshot::channel();
            tokio::spawn(async move {
                scheduler.start(rx).await;
            });
            Some(tx)
        }
        None => {
            log::info!("Health check ticker disabled");
            None
        }
    };

    log::info!("Starting multichat dispatch server on port {}", port);

    let server_db = db.clone();
    let server_bus = bus.clone();
    let server_queue = queue.clone();
    let server_config = config.clone();

    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&server_db),
                config: server_config.clone(),
                bus: Arc::clone(&server_bus),
                queue: server_queue.clone(),
            }))
            .wrap(Logger::default())
            .configure(controllers::health::config)
            .configure(controllers::chat::config)
            .configure(controllers::channels::config)
            .configure(controllers::lanes::config)
            .configure(controllers::models::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    log::info!("Server stopped, shutting down background tasks");
    if let Some(tx) = scheduler_shutdown_tx {
        let _ = tx.send(());
    }
    worker_shutdown.cancel();

    result
}
