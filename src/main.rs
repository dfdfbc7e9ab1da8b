use std::sync::Arc;
use anyhow::Context;
use futures_util::future::join_all;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

use crpt_document_client::config::Config;
use crpt_document_client::document::{Document, Product};
use crpt_document_client::{DocumentApiClient, Throttle};

const DEMO_REQUESTS: usize = 30;

fn demo_document() -> Document {
    let product = Product {
        certificate_document: "Document".into(),
        certificate_document_date: "2020-01-23".into(),
        certificate_document_number: "12345".into(),
        owner_inn: "OwnerINN".into(),
        producer_inn: "ProducerINN".into(),
        production_date: "2020-01-23".into(),
        tnved_code: "Code".into(),
        uit_code: "UIT123".into(),
        uitu_code: "UITU123".into(),
    };

    Document {
        doc_status: "Status".into(),
        import_request: true,
        owner_inn: "OwnerINN".into(),
        participant_inn: "ParticipantINN".into(),
        producer_inn: "ProducerINN".into(),
        production_date: "2020-01-23".into(),
        production_type: "Type".into(),
        reg_date: "2020-01-23".into(),
        reg_number: "RegNumber123".into(),
        ..Document::new("DocID123", "LP_INTRODUCE_GOODS")
    }
    .with_description("ParticipantINN")
    .with_product(product)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let token = config.token.clone().context("CRPT_TOKEN must be set")?;

    info!("Starting document registration demo against {}", config.api_url);
    info!("Rate: {} requests per {}ms", config.request_limit, config.window_ms);

    let client = DocumentApiClient::new(&config.api_url, config.http_settings())?;
    let throttle = Throttle::with_json(config.throttle_config()?, Arc::new(client))?;

    let document = demo_document();
    let mut handles = Vec::with_capacity(DEMO_REQUESTS);
    for _ in 0..DEMO_REQUESTS {
        handles.push(throttle.submit(document.clone(), token.as_str())?);
    }

    for result in join_all(handles).await {
        match result {
            Ok(response) => info!("Response: {}", response.body),
            Err(e) => error!("Error: {}", e),
        }
    }

    let report = throttle.shutdown(config.shutdown_timeout()).await;
    info!("Shut down. Drained: {}, outstanding: {}", report.drained, report.outstanding);

    Ok(())
}
