use std::sync::Arc;

use dotenvy::dotenv;
use futures::StreamExt;
use tokio::signal::ctrl_c;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use db::dtos;
use db::protocol::StatusProtocol;
use db::store::{PgPipelineStore, StoreConfig};
use orchestrator::{FlowRunner, ProtocolReporter};

mod bodies;
mod config;
mod record;

use config::DataConfig;

#[tokio::main]
async fn main() -> Result<(), async_nats::Error> {
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

    let store = Arc::new(
        PgPipelineStore::connect(&StoreConfig {
            database_url,
            max_connections,
        })
        .await
        .expect("Failed to connect to Postgres"),
    );

    let nats_url = std::env::var("NATS_URL").expect("NATS_URL must be set");
    let nats_client = async_nats::connect(nats_url)
        .await
        .expect("Failed to connect to NATS");

    let data_config = DataConfig::from_env();
    let reporter = Arc::new(
        ProtocolReporter::new(StatusProtocol::new(store.clone()))
            .with_events(nats_client.clone()),
    );

    let mut run_subscriber = nats_client.subscribe(dtos::RUN_SUBJECT).await?;

    tokio::spawn(async move {
        while let Some(message) = run_subscriber.next().await {
            let payload =
                match serde_json::from_slice::<dtos::PipelineRunPayload>(&message.payload) {
                    Ok(payload) => payload,
                    Err(error) => {
                        error!("Failed to deserialize message payload: {error:?}");
                        continue;
                    }
                };

            info!("Received run request for pipeline {}", payload.pipeline_id);

            let runner = FlowRunner::new(
                store.clone(),
                reporter.clone(),
                bodies::default_bodies(&data_config),
            );

            // One sequential task per pipeline run; runs are independent.
            tokio::spawn(async move {
                if let Err(error) = runner.run(payload.pipeline_id, payload.record_count).await {
                    error!(
                        "Flow for pipeline {} terminated: {error}",
                        payload.pipeline_id
                    );
                }
            });
        }
    });

    ctrl_c().await?;

    Ok(())
}
