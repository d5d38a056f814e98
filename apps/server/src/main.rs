#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use egress::{Config, EgressContext};
use tracing::info;

mod error;
mod routes;

use error::{ApiError, AppError};
use logger::init_tracing;

/// Optional path to the config file
const CONFIG_PATH_ENV: &str = "EGRESS_CONFIG";

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_config(env::var(CONFIG_PATH_ENV).ok())?;
    info!("{config}");

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let context = web::Data::new(EgressContext::from_config(&config)?);
    let sweeper = context.start_retention();

    let result = run_server(addr, context).await;
    sweeper.abort();
    result
}

async fn run_server(addr: SocketAddr, context: web::Data<EgressContext>) -> Result<(), AppError> {
    info!("Listening on {addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(context.clone())
            .app_data(json_config())
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

/// Malformed bodies answer with the API's own error shape
pub(crate) fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}
