use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;
use services::background_jobs::{self, JobConfig};

/// Origins must match an allowed entry exactly
fn origin_allowed(allowed_origins: &[String], origin: &str) -> bool {
    allowed_origins.iter().any(|allowed| allowed == origin)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().expect("Failed to load configuration");

    log::info!("Starting server at {}:{}", config.host, config.port);

    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to create database pool");

    db::migrate(&pool).await.expect("Failed to run migrations");
    log::info!("Database migrations completed");

    let job_config = JobConfig {
        check_interval_secs: config.overdue_check_interval_secs,
        reminder_window: config.reminder_window(),
    };
    let pool_for_scheduler = Arc::new(pool.clone());
    tokio::spawn(async move {
        background_jobs::start_scheduler(pool_for_scheduler, job_config).await;
    });

    // 5 failed login attempts per 15 minutes
    let login_rate_limiter = Arc::new(middleware::RateLimiter::new(5, 15 * 60));

    let app_state = web::Data::new(models::AppState {
        db: pool,
        config: config.clone(),
        login_rate_limiter,
    });

    let allowed_origins = config.cors_origins.clone();

    HttpServer::new(move || {
        let allowed_origins = allowed_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_allowed(&allowed_origins, origin_str)
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
