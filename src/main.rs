use arkiv_api::app::create_app;
use arkiv_api::config::{load_config, save_default_config};
use arkiv_api::constants::{CONFIG_PATH, DATA_DIR};
use arkiv_api::database::{create_pool, init_database};
use arkiv_api::logging::{init_logging, install_panic_hook};
use arkiv_api::pinning::{PinStore, PinataClient};
use arkiv_api::resolver::GatewayResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--init-config") {
        match save_default_config(&CONFIG_PATH) {
            Ok(_) => {
                println!("Default configuration saved to {:?}", *CONFIG_PATH);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to save default configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    init_logging();
    install_panic_hook();

    // Load configuration
    let config = Arc::new(load_config(&CONFIG_PATH));

    if config.pinning.jwt.is_empty() {
        warn!("No pinning-service token configured; set pinning.jwt or ARKIV_PINATA_JWT");
    }

    // Initialize data directory
    std::fs::create_dir_all(&*DATA_DIR).ok();

    // Create database pool
    let pool = create_pool().expect("Failed to create database pool");

    // Initialize database schema
    {
        let conn = pool.get().expect("Failed to get connection");
        init_database(&conn).expect("Failed to initialize database");
    }

    // Upstream clients
    let pinata =
        Arc::new(PinataClient::new(&config.pinning).expect("Failed to build pinning client"));
    let store: Arc<dyn PinStore> = pinata.clone();

    let resolver = Arc::new(
        GatewayResolver::from_config(&config.gateways).expect("Failed to build gateway resolver"),
    );

    // Verify pinning credentials in the background
    {
        let pinata = pinata.clone();
        tokio::spawn(async move {
            if let Err(e) = pinata.test_authentication().await {
                warn!("Pinning service authentication check failed: {}", e);
            }
        });
    }

    // Create the application
    let app = create_app(Arc::clone(&config), pool, store, resolver);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Starting Arkiv API on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server failed");
}
