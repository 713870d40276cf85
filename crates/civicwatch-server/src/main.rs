#![forbid(unsafe_code)]

use civicwatch_server::{
    auth, build_router, validate_startup_config, AdminSeed, AppState, ServerConfig,
};
use civicwatch_store::Store;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn admin_seed_from_env() -> Option<AdminSeed> {
    let email = env::var("CIVICWATCH_ADMIN_EMAIL").ok()?;
    let password = env::var("CIVICWATCH_ADMIN_PASSWORD").ok()?;
    Some(AdminSeed {
        name: env::var("CIVICWATCH_ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
        email,
        password,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("CIVICWATCH_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let config = ServerConfig {
        bind_addr: env::var("CIVICWATCH_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
        database_path: PathBuf::from(
            env::var("CIVICWATCH_DB_PATH").unwrap_or_else(|_| "data/civicwatch.sqlite".to_string()),
        ),
        uploads_dir: PathBuf::from(
            env::var("CIVICWATCH_UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
        ),
        jwt_secret: env::var("CIVICWATCH_JWT_SECRET").unwrap_or_default(),
        token_ttl: Duration::from_secs(env_u64("CIVICWATCH_TOKEN_TTL_SECS", 24 * 60 * 60)),
        max_upload_bytes: env_usize("CIVICWATCH_MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
        cors_allowed_origins: env_list("CIVICWATCH_CORS_ALLOWED_ORIGINS"),
        admin_seed: admin_seed_from_env(),
    };
    validate_startup_config(&config)?;

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create database directory: {e}"))?;
        }
    }
    let store = Arc::new(
        Store::open(&config.database_path).map_err(|e| format!("cannot open store: {e}"))?,
    );
    let images = Arc::new(
        civicwatch_server::uploads::ImageStore::new(config.uploads_dir.clone())
            .map_err(|e| format!("cannot prepare uploads directory: {e}"))?,
    );

    if let Some(seed) = &config.admin_seed {
        let password_hash = auth::hash_password(&seed.password)
            .map_err(|e| format!("cannot hash admin password: {e}"))?;
        match store
            .ensure_admin_user(&seed.name, &seed.email, &password_hash)
            .await
        {
            Ok(admin) => info!(email = %admin.email, "admin account ready"),
            Err(e) => error!("admin seeding failed: {e}"),
        }
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(store, images, config);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("bind failed on {bind_addr}: {e}"))?;
    info!("civicwatch-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, draining");
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
