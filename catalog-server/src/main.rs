use catalog::domain::CacheSettings;
use catalog::persistence::SledCatalogStore;
use catalog::planes::control::{CatalogRefresh, ReconcileOperation, ReconcileScheduler};
use catalog::planes::data::ProductCacheService;
use catalog::ports::{CacheStore, CatalogStore};
use shared::config::{Config, StoreBackend};
use std::path::Path;
use std::sync::Arc;
use storage_engine::{MokaStore, RedisStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Catalog Cache Server");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    // ============================================
    // STEP 1: Cache store and durable catalog
    // ============================================
    let store = build_store(&config.store).await?;

    let catalog_path = Path::new(&config.data_dir).join("catalog.sled");
    info!("Opening durable catalog at {}", catalog_path.display());
    let catalog: Arc<dyn CatalogStore> = Arc::new(SledCatalogStore::open(&catalog_path)?);

    let service = Arc::new(ProductCacheService::new(
        store,
        catalog.clone(),
        CacheSettings::from_config(&config),
    ));

    // ============================================
    // STEP 2: Optional warm-up from the catalog
    // ============================================
    if config.warmup_on_start {
        match CatalogRefresh::new(catalog, service.clone()).run().await {
            Ok(report) => info!(
                "Warm-up finished: {} detail(s) across {} categor(ies)",
                report.details, report.categories
            ),
            Err(e) => warn!("Warm-up failed, serving from a cold cache: {}", e),
        }
    }

    // ============================================
    // STEP 3: Spawn the reconciliation scheduler
    // ============================================
    let shutdown = CancellationToken::new();
    let reconciler = service.reconciler();
    let scheduler_handle =
        ReconcileScheduler::new(reconciler.clone(), config.reconcile_interval)
            .spawn(shutdown.clone());

    info!("Catalog cache server started successfully");
    info!("  - store: {:?}", config.store);
    info!(
        "  - reconcile every {}s",
        config.reconcile_interval.as_secs()
    );

    // ============================================
    // STEP 4: Wait for shutdown signal
    // ============================================
    shutdown_signal().await;
    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task ended abnormally: {}", e);
    }

    // Flush whatever accumulated since the last tick
    match reconciler.reconcile().await {
        Ok(report) => info!("Final reconciliation applied {} counter(s)", report.applied),
        Err(e) => error!("Final reconciliation failed: {}", e),
    }

    info!("Catalog cache server shutting down");
    Ok(())
}

async fn build_store(backend: &StoreBackend) -> shared::Result<Arc<dyn CacheStore>> {
    match backend {
        StoreBackend::Redis { url } => {
            info!("Using Redis cache store");
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
        StoreBackend::Memory { max_entries } => {
            warn!(
                "No CATALOG_REDIS_URL set, using the in-process store; counters are lost on restart"
            );
            Ok(Arc::new(MokaStore::new("catalog-cache", *max_entries)))
        }
    }
}

// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
