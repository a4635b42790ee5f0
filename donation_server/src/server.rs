use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use donation_engine::{events::BroadcastGateway, DonationFlowApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    connection_worker::start_connection_worker,
    errors::ServerError,
    routes::{health, DonationStreamRoute, DonationsRoute, PaymentCompletedRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_settings(&config.database_url, config.pool_settings())
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = BroadcastGateway::new(config.viewer_buffer);
    let api = DonationFlowApi::initialize(db.clone(), gateway)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let _worker = start_connection_worker(db, config.connection_check_interval);
    let srv = create_server_instance(config, web::Data::new(api))?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Every worker shares the same `api`, so that every request sees the same donation counts and viewers.
pub fn create_server_instance(
    config: ServerConfig,
    api: web::Data<DonationFlowApi<SqliteDatabase>>,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dcs::access_log"))
            .app_data(api.clone())
            .service(health)
            .service(DonationsRoute::<SqliteDatabase>::new())
            .service(PaymentCompletedRoute::<SqliteDatabase>::new())
            .service(DonationStreamRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
