//! Fetch one JSON document through the pipeline and log every stage
//!
//! Run with: RUST_LOG=debug cargo run --example rest_get -- https://httpbin.org get

use std::env;

use network_sdk::config::TransportConfig;
use network_sdk::services::{ApiCall, HttpTransport, JsonApi};
use network_sdk::{NetworkController, Session, StandardLogHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "https://httpbin.org".to_string());
    let path = args.next().unwrap_or_else(|| "get".to_string());

    let transport = HttpTransport::from_config(&TransportConfig::from_env()?)?;
    let api = JsonApi::<(), serde_json::Value>::new(&base_url)?
        .session(Session::named("example", transport));

    let controller = NetworkController::builder()
        .label("rest_get")
        .log_handler(StandardLogHandler::new())
        .logging(|events| {
            events.on_any(|event| log::trace!("{} for {}", event.stage, event.info.id()));
        })
        .build();

    let document = controller.send_labeled(&api, ApiCall::get(path), "fetch").await?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    Ok(())
}
