use actix_web::{web, App, HttpServer};
use backend::config::ServerConfig;
use backend::routes::configure_routes;
use backend::state::AppState;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = ServerConfig::from_env().map_err(|e| {
        log::error!("Invalid server configuration: {}", e);
        std::io::Error::other(e)
    })?;

    let state = web::Data::new(AppState::load(&config));
    if !state.is_model_loaded() {
        log::warn!("Serving without a model; /predict will reject every request");
    }

    let bind_address = config.bind_address();
    log::info!("Server running on http://{}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
