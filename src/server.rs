//! Server runtime
//!
//! [`ServerHandle`] owns the whole lifecycle: store selection and
//! migrations, seeding, the allocator and its expiry task, the REST API and
//! graceful shutdown. The CLI binary is a thin wrapper around it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{ExpiryScheduler, ParkingQueries, ReservationAllocator};
use crate::config::AppConfig;
use crate::domain::ReservationStore;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::seed::{load_seed_file, seed_locations};
use crate::infrastructure::{init_database, InMemoryReservationStore, SeaOrmReservationStore};
use crate::interfaces::http::modules::metrics::install_recorder;
use crate::interfaces::http::{create_api_router, ApiState};
use crate::notifications::{create_event_bus, SharedEventBus};
use crate::shared::shutdown::{listen_for_shutdown_signals, shutdown_with_cleanup};
use crate::shared::{ShutdownSignal, SystemClock};

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup
    pub auto_migrate: bool,
    /// Keep all state in process memory instead of SQLite
    pub in_memory: bool,
    /// Seed file; overrides `[seed] path` from the config
    pub seed_path: Option<PathBuf>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            in_memory: false,
            seed_path: None,
        }
    }
}

/// Handle to a running reservation service.
pub struct ServerHandle {
    pub event_bus: SharedEventBus,
    pub store: Arc<dyn ReservationStore>,
    pub allocator: Arc<ReservationAllocator>,
    pub config: AppConfig,
    /// Address the REST API is bound to
    pub api_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownSignal,
    api_task: JoinHandle<()>,
    expiry_task: JoinHandle<()>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        info!("Starting Parkiraj reservation service...");

        let prometheus = prometheus_handle();

        // ── Store ──────────────────────────────────────────────
        let (store, db): (Arc<dyn ReservationStore>, Option<DatabaseConnection>) = if opts.in_memory {
            info!("Using in-memory store; state is lost on exit");
            (Arc::new(InMemoryReservationStore::new()), None)
        } else {
            let db_config = app_cfg.database.to_database_config();
            info!(url = %db_config.url, "Connecting to database");
            let db = init_database(&db_config).await?;

            if opts.auto_migrate {
                info!("Running database migrations...");
                Migrator::up(&db, None).await?;
                info!("Migrations completed");
            }
            (Arc::new(SeaOrmReservationStore::new(db.clone())), Some(db))
        };

        // ── Seed ───────────────────────────────────────────────
        if let Some(path) = opts.seed_path.or_else(|| app_cfg.seed.path.clone()) {
            let locations = load_seed_file(&path)?;
            let inserted = seed_locations(store.as_ref(), locations).await?;
            info!(path = %path.display(), inserted, "Seeded parking locations");
        }

        // ── Allocator, projection, events ──────────────────────
        let clock = Arc::new(SystemClock);
        let event_bus = create_event_bus();
        let allocator = Arc::new(
            ReservationAllocator::new(store.clone(), clock.clone())
                .with_config(app_cfg.allocator_config())
                .with_event_bus(event_bus.clone()),
        );
        let queries = Arc::new(ParkingQueries::new(store.clone(), clock));

        let shutdown = ShutdownSignal::new();

        let expiry_task = ExpiryScheduler::new(allocator.clone())
            .with_config(app_cfg.reservations.expiry_config())
            .start(shutdown.clone());

        // ── REST API ───────────────────────────────────────────
        let router = create_api_router(
            ApiState {
                allocator: allocator.clone(),
                queries,
                event_bus: event_bus.clone(),
                default_duration: app_cfg.reservations.default_duration(),
                started_at: Arc::new(Instant::now()),
            },
            prometheus,
        );

        let listener = tokio::net::TcpListener::bind(app_cfg.api_address()).await?;
        let api_addr = listener.local_addr()?;
        info!("REST API listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown.clone();
        let api_task = tokio::spawn(async move {
            let server = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move {
                    api_shutdown.wait().await;
                    info!("REST API received shutdown signal");
                });
            if let Err(e) = server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            event_bus,
            store,
            allocator,
            config: app_cfg,
            api_addr,
            db,
            shutdown,
            api_task,
            expiry_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Trigger shutdown on SIGTERM / SIGINT.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.shutdown.clone()));
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for shutdown, then stop tasks within `server.shutdown_timeout`.
    pub async fn wait(self) {
        let timeout = Duration::from_secs(self.config.server.shutdown_timeout);
        let api_task = self.api_task;
        let expiry_task = self.expiry_task;

        let finished = shutdown_with_cleanup(&self.shutdown, timeout, || async move {
            match api_task.await {
                Ok(()) => info!("REST API stopped"),
                Err(e) => error!("REST API task panicked: {}", e),
            }
            match expiry_task.await {
                Ok(()) => info!("Expiry task stopped"),
                Err(e) => error!("Expiry task panicked: {}", e),
            }
        })
        .await;
        if !finished {
            warn!("Some tasks were still running at shutdown");
        }

        if let Some(db) = self.db {
            match db.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!("Error closing database connection: {}", e),
            }
        }

        info!("Parkiraj shutdown complete");
    }

    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished() || !self.expiry_task.is_finished()
    }
}

/// The global recorder can only be installed once per process; later
/// starts in the same process reuse it.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| match install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Metrics recorder unavailable, /metrics disabled");
                None
            }
        })
        .clone()
}

/// Initialize tracing from the logging config. Call once at process start.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
