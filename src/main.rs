use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use perfomix_server::api_router::configure_api_routes;
use perfomix_server::config::AppConfig;
use perfomix_server::notifications::reminders::ReminderScheduler;
use perfomix_server::notifications::Notifier;
use perfomix_server::security::jwt::JwtManager;
use perfomix_server::shared::state::AppState;
use perfomix_server::shared::utils::create_conn;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env().expect("Failed to load config from env");

    let pool = match create_conn() {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("Database pool creation failed: {}", e),
            ));
        }
    };

    {
        let mut conn = pool.get().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("Database connection failed: {}", e),
            )
        })?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, format!("Migrations failed: {}", e))
        })?;
    }

    let jwt = JwtManager::from_secret(&config.auth.jwt_secret)
        .expect("JWT_SECRET rejected by token manager");
    let notifier = Notifier::new(pool.clone());
    let state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
        jwt: Arc::new(jwt),
        notifier,
    });

    match ReminderScheduler::new(state.clone()) {
        Ok(scheduler) => scheduler.spawn(),
        Err(e) => error!("Invalid reminder schedule, reminders disabled: {}", e),
    }

    let app = configure_api_routes(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
