//! HTTP entry point wiring the `chain-core` pipeline to the outside world
//! (SPEC_FULL.md §6 [AMBIENT]). Framework, configuration and index-client
//! concerns live here; `chain-core` itself stays dependency-free of all of
//! them (spec.md §1).

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use chain_core::facade::IndexFacade;
use dotenv::dotenv;

mod api;
mod config;
mod http_facade;

use config::ServerConfig;
use http_facade::HttpIndexFacade;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = ServerConfig::from_env();
    log::info!(
        "starting process-chain server on {}:{}, index backend {}",
        config.bind_addr,
        config.bind_port,
        config.index_base_url
    );

    let facade: Arc<dyn IndexFacade> = Arc::new(HttpIndexFacade::new(config.index_base_url.clone(), config.request_timeout));
    let facade_data = web::Data::from(facade);
    let config_data = web::Data::new(config.clone());

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(Cors::permissive())
            .app_data(facade_data.clone())
            .app_data(config_data.clone())
            .service(api::health_check)
            .service(api::batch_generate)
            .service(api::merge_chain)
    })
    .bind((config.bind_addr.as_str(), config.bind_port))?
    .run()
    .await
}
