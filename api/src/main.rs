use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use db::protocol::StatusProtocol;
use db::store::{PgPipelineStore, PipelineStore, StoreConfig};

mod app_state;
mod routes;
mod utils;

use app_state::AppState;
use routes::api::v0::{pipelines, status_updates, triggers};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let filter_layer = EnvFilter::from_default_env();
    let fmt_layer = fmt::layer().with_target(false).with_line_number(true);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections = std::env::var("MAX_CONNECTIONS")
        .unwrap_or("10".to_string())
        .parse::<u32>()
        .expect("MAX_CONNECTIONS must be a number");

    let store = PgPipelineStore::connect(&StoreConfig {
        database_url,
        max_connections,
    })
    .await
    .expect("Failed to connect to Postgres");

    store.migrate().await.expect("Failed to run migrations");

    let nats_url = std::env::var("NATS_URL").expect("NATS_URL must be set");
    let nats_client = async_nats::connect(nats_url)
        .await
        .expect("Failed to connect to NATS");

    let store: Arc<dyn PipelineStore> = Arc::new(store);
    let state = AppState {
        protocol: StatusProtocol::new(store.clone()),
        store,
        nats: nats_client,
    };

    let app = Router::new()
        .route(
            "/api/pipelines",
            get(pipelines::list).post(pipelines::create),
        )
        .route(
            "/api/pipelines/:id",
            get(pipelines::details).delete(pipelines::remove),
        )
        .route("/api/pipelines/:id/stages", get(pipelines::stages))
        .route("/api/status-update", post(status_updates::update))
        .route("/api/trigger/:id", post(triggers::trigger))
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or("8000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
