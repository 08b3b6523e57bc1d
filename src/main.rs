use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod ledger;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;
use docs::ApiDoc;
use routes::Limiters;

#[get("/")]
async fn index() -> impl Responder {
    "Workday ledger is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .with_context(|| format!("invalid LOG_LEVEL {:?}", config.log_level))?,
        )
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    info!(
        addr = %config.server_addr,
        tz = %config.schedule.time_zone,
        weekly_off = %config.schedule.weekly_off,
        "Server starting"
    );

    let pool = init_db(&config.database_url).await?;
    let limiters = Data::new(Limiters::from_config(&config)?);
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let config = config.clone();
        let limiters = limiters.clone();
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
