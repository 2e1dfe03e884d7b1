use actix_cors::Cors;
use actix_web::{
    middleware::Logger,
    web::{self, QueryConfig},
    App, HttpServer,
};
use log::info;

use modpack_index::config::{Config, LogConfig};
use modpack_index::types::api;
use modpack_index::{cli, endpoints, logging, AppData};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&LogConfig::from_env()?)?;

    if cli::maybe_cli().await? {
        return anyhow::Ok(());
    }

    let config = Config::from_env()?;
    let app_data = web::Data::new(AppData::new(&config)?);
    let addr = config.addr().to_string();
    let port = config.port();
    info!(
        "Serving modpacks from {}",
        config.storage().root().display()
    );

    info!("Starting server on {}:{}", addr, port);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .app_data(QueryConfig::default().error_handler(api::query_error_handler))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"])
                    .allow_any_header()
                    .supports_credentials()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(endpoints::configure)
    })
    .bind((addr.as_str(), port))?;

    if config.debug() {
        info!("Running in debug mode, using 1 thread.");
        server.workers(1).run().await?;
    } else {
        server.run().await?;
    }

    anyhow::Ok(())
}
