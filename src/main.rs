use log::info;
use tower_http::cors::CorsLayer;

use consultation_service::integration;
use consultation_service::state::AppState;

#[tokio::main]
async fn main() {
    let config = integration::Config::default();

    let state = match AppState::init(&config).await {
        Ok(state) => state,
        Err(e) => panic!("Failed to initialize application state: {e}"),
    };

    let app = consultation_service::app(state).layer(
        CorsLayer::new()
            .allow_origin(config.env.allow_origin())
            .allow_methods(config.env.allow_methods())
            .allow_headers(config.env.allow_headers()),
    );

    let addr = config.env.addr();
    info!("Listening on {addr}");

    match config.env.ssl_config() {
        Some(ssl_config) => {
            axum_server::bind_openssl(addr, ssl_config)
                .serve(app.into_make_service())
                .await
        }
        None => axum_server::bind(addr).serve(app.into_make_service()).await,
    }
    .expect("Failed to start server");
}
