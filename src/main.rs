use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use dotenvy::dotenv;

mod aggregation;
mod api;
mod cache;
mod clock;
mod config;
mod data_client;
mod db;
mod docs;
mod error;
mod model;
mod repository;
mod routes;
mod utils;

use cache::QueryCache;
use clock::{Clock, SystemClock};
use config::{Config, DataBackend};
use data_client::{DataClient, MemoryDataClient, MySqlDataClient};
use db::init_db;
use repository::{AttendanceRepository, EmployeeRepository};

use crate::docs::ApiDoc;
use crate::utils::query_warmup;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn data_client(config: &Config) -> io::Result<Arc<dyn DataClient>> {
    match config.data_backend {
        DataBackend::Mysql => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| io::Error::other("DATABASE_URL must be set"))?;
            let pool = init_db(url).await.map_err(|e| {
                error!(error = %e, "Failed to connect to database");
                io::Error::other(e.to_string())
            })?;
            Ok(Arc::new(MySqlDataClient::new(pool)))
        }
        DataBackend::Memory => {
            warn!("Using the in-memory data backend, nothing survives a restart");
            Ok(Arc::new(MemoryDataClient::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    let config = Config::from_env().map_err(io::Error::other)?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(backend = %config.data_backend, "Server starting...");

    let client = data_client(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = QueryCache::new(
        clock.clone(),
        Duration::from_secs(config.query_stale_secs),
        config.query_cache_capacity,
    );
    let employees = EmployeeRepository::new(client.clone(), cache.clone());
    let attendance = AttendanceRepository::new(client, cache.clone(), clock);

    {
        let employees = employees.clone();
        let attendance = attendance.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) =
                query_warmup::warmup_dashboard_queries(&cache, &employees, &attendance).await
            {
                warn!(error = %e, "Failed to warm up query cache");
            }
        });
    }

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS/CSS assets match too
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(employees.clone()))
            .app_data(Data::new(attendance.clone()))
            .service(health)
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
